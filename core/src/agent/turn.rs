//! Turn orchestration
//!
//! Drives one full user turn: optional deterministic short-circuits, a first
//! model call, directive resolution, gated execution, and on success a second
//! model call that turns raw tool output into a human reply.
//!
//! The flow is single-path per turn: at most two sequential provider calls
//! and at most one device dispatch. Policy and configuration snapshots are
//! re-read at turn entry so edits land on the next turn, never mid-turn.
//! Nothing here is retried; retries belong to the caller.

use std::sync::Arc;

use super::directive::Directive;
use super::dispatch::ActionDispatcher;
use super::events::{AgentTurnResult, ExecutionStatus, ToolExecutionEvent};
use super::infer::{find_url, is_page_read_intent, IntentInferencer, TOOL_WEB_READ};
use super::normalize::normalize_payload;
use super::parser::{scrub_internal_markers, DirectiveParser};
use super::policy::{GateDecision, PolicyGate};
use crate::config::{ConfigStore, SecurityConfig, ToolCapability};
use crate::executor::ActionExecutor;
use crate::llm::{ChatMessage, ChatProvider};
use crate::tools::web::fetch_page_text;

/// Health of the external runtime supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeHealth {
    Nominal,
    /// Inbound channel delivery cannot be guaranteed.
    Degraded,
}

/// External supervisor boundary.
pub trait RuntimeSupervisor: Send + Sync {
    fn health(&self) -> RuntimeHealth;
}

/// Supervisor stub for deployments without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NominalSupervisor;

impl RuntimeSupervisor for NominalSupervisor {
    fn health(&self) -> RuntimeHealth {
        RuntimeHealth::Nominal
    }
}

const SUMMARY_SYSTEM_PROMPT: &str = "You are a phone assistant. You receive the raw result of a \
device action that already ran. Answer the user's request naturally in one or two sentences. \
Never dump raw structured data.";

const DEGRADED_REPLY: &str = "I can't promise inbound-channel automation right now: the runtime \
is in a degraded state and incoming messages may not be delivered. Please try again once the \
connection recovers.";

const MISSING_BODY_REPLY: &str = "What should the message say? Give me the text and I'll send it.";

pub struct TurnOrchestrator {
    provider: Arc<dyn ChatProvider>,
    config: Arc<dyn ConfigStore>,
    supervisor: Arc<dyn RuntimeSupervisor>,
    dispatcher: ActionDispatcher,
    parser: DirectiveParser,
    inferencer: IntentInferencer,
    gate: PolicyGate,
}

impl TurnOrchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        executor: Arc<dyn ActionExecutor>,
        config: Arc<dyn ConfigStore>,
        supervisor: Arc<dyn RuntimeSupervisor>,
    ) -> Self {
        Self {
            provider,
            config,
            supervisor,
            dispatcher: ActionDispatcher::new(executor),
            parser: DirectiveParser::new(),
            inferencer: IntentInferencer::new(),
            gate: PolicyGate::new(),
        }
    }

    /// Run one full user turn.
    ///
    /// Always produces a well-formed result; a provider failure becomes an
    /// explanatory reply with no tool events rather than a panic or retry.
    pub async fn run_agent_turn(&self, prompt: &str) -> AgentTurnResult {
        // Fresh snapshots every turn.
        let capabilities = self.config.capabilities();
        let security = self.config.security();
        let integrations = self.config.integrations();

        if self.supervisor.health() == RuntimeHealth::Degraded && is_inbound_channel_intent(prompt)
        {
            tracing::info!("turn short-circuited: degraded runtime, inbound intent");
            return AgentTurnResult::text_only(DEGRADED_REPLY);
        }

        if integrations.telegram.is_fully_configured()
            && is_messaging_send_intent(prompt)
            && extract_message_body(prompt).is_none()
        {
            return AgentTurnResult::text_only(MISSING_BODY_REPLY);
        }

        if security.prefer_standard_web_tool && is_page_read_intent(prompt) {
            if let Some(url) = find_url(prompt) {
                return self.web_read_turn(prompt, url).await;
            }
        }

        // Deterministic shortcut: cheaper and safer than a model round-trip
        // for well-understood intents.
        if let Some(directive) = self
            .inferencer
            .infer(prompt, &capabilities)
            .filter(|d| d.tool.as_str() != TOOL_WEB_READ)
        {
            tracing::debug!(tool = %directive.tool, "deterministic shortcut, skipping model call");
            return self
                .execute_and_reply(prompt, directive, &capabilities, &security)
                .await;
        }

        let messages = [
            ChatMessage::system(directive_system_prompt(&capabilities)),
            ChatMessage::user(prompt),
        ];
        let reply = match self.provider.complete(&messages).await {
            Ok(reply) => reply,
            Err(error) => return provider_failure_result(&error.to_string()),
        };

        let directive = match self.parser.parse(&reply) {
            Some(parsed) => Some(
                self.inferencer
                    .override_directive(prompt, parsed, &capabilities),
            ),
            None => self
                .inferencer
                .infer(prompt, &capabilities)
                .filter(|d| d.tool.as_str() != TOOL_WEB_READ),
        };

        match directive {
            Some(directive) => {
                self.execute_and_reply(prompt, directive, &capabilities, &security)
                    .await
            }
            None => AgentTurnResult::text_only(scrub_internal_markers(&reply)),
        }
    }

    /// Diagnostics entry point: parser, gate, normalizer and dispatcher only,
    /// no model calls.
    pub async fn run_tool_probe(&self, raw: &str) -> AgentTurnResult {
        let capabilities = self.config.capabilities();
        let security = self.config.security();

        let Some(directive) = self.parser.parse(raw) else {
            return AgentTurnResult::text_only("no directive recognized in input");
        };

        let event = self
            .gated_dispatch(&directive, &capabilities, &security)
            .await;
        AgentTurnResult::with_event(event.detail.clone(), event)
    }

    async fn gated_dispatch(
        &self,
        directive: &Directive,
        capabilities: &[ToolCapability],
        security: &SecurityConfig,
    ) -> ToolExecutionEvent {
        match self.gate.check(directive, capabilities, security) {
            GateDecision::Blocked(event) => event,
            GateDecision::Proceed => {
                let payload = normalize_payload(&directive.tool, &directive.arguments);
                self.dispatcher.dispatch(&directive.tool, &payload).await
            }
        }
    }

    async fn execute_and_reply(
        &self,
        prompt: &str,
        directive: Directive,
        capabilities: &[ToolCapability],
        security: &SecurityConfig,
    ) -> AgentTurnResult {
        let event = self
            .gated_dispatch(&directive, capabilities, security)
            .await;

        if event.status != ExecutionStatus::Executed {
            let text = format!("I couldn't run {}: {}", event.tool, event.detail);
            return AgentTurnResult::with_event(text, event);
        }

        let serialized = event
            .output
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_else(|| "(no output)".to_string());
        let messages = [
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "The user asked: {prompt}\nThe action {} returned: {serialized}\nAnswer the user.",
                event.tool
            )),
        ];

        match self.provider.complete(&messages).await {
            Ok(summary) => {
                AgentTurnResult::with_event(scrub_internal_markers(&summary), event)
            }
            Err(error) => {
                // The action already ran; report it even though the summary
                // call failed.
                let mut result = provider_failure_result(&error.to_string());
                result.tool_events.push(event);
                result
            }
        }
    }

    async fn web_read_turn(&self, prompt: &str, url: &str) -> AgentTurnResult {
        tracing::debug!(url, "standard web read path");
        let page_text = match fetch_page_text(url).await {
            Ok(text) => text,
            Err(error) => {
                let event = ToolExecutionEvent::failed(TOOL_WEB_READ, error.to_string());
                let text = format!("I couldn't read {url}: {error}");
                return AgentTurnResult::with_event(text, event);
            }
        };

        let messages = [
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "The user asked: {prompt}\nPage content of {url}:\n{page_text}\nAnswer the user."
            )),
        ];

        match self.provider.complete(&messages).await {
            Ok(summary) => {
                let event = ToolExecutionEvent::executed(
                    TOOL_WEB_READ,
                    format!("read {url}"),
                    Some(serde_json::json!({ "url": url, "chars": page_text.chars().count() })),
                );
                AgentTurnResult::with_event(scrub_internal_markers(&summary), event)
            }
            Err(error) => provider_failure_result(&error.to_string()),
        }
    }
}

fn provider_failure_result(detail: &str) -> AgentTurnResult {
    AgentTurnResult::text_only(format!(
        "A provider error stopped this request: {detail}. Check the connection or provider \
settings and try again."
    ))
}

/// System prompt for the first model call: the directive wire format plus
/// the currently enabled tools.
fn directive_system_prompt(capabilities: &[ToolCapability]) -> String {
    let mut tools: Vec<&str> = capabilities
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.id.as_str())
        .collect();
    tools.sort_unstable();

    format!(
        "You are a phone assistant that can run device tools. To run a tool, reply with exactly \
one JSON object: {{\"type\":\"tool_call\",\"tool\":\"<id>\",\"arguments\":{{...}}}}. \
Available tools: {}. If no tool is needed, answer in plain text.",
        tools.join(", ")
    )
}

fn is_inbound_channel_intent(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    lower.contains("when a message arrives")
        || lower.contains("when i get a message")
        || lower.contains("auto-reply")
        || lower.contains("auto reply")
        || lower.contains("incoming message")
        || (lower.contains("reply") && lower.contains("telegram"))
}

fn is_messaging_send_intent(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    lower.contains("telegram") && (lower.contains("send") || lower.contains("message"))
}

/// Message body: text after the first `:`, or the first quoted span.
fn extract_message_body(prompt: &str) -> Option<String> {
    if let Some(idx) = prompt.find(':') {
        let body = prompt[idx + 1..].trim();
        if !body.is_empty() {
            return Some(body.to_string());
        }
    }
    let mut parts = prompt.split('"');
    parts.next();
    parts
        .next()
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConfigDocument, IntegrationSettings, MessagingIntegration, StaticConfigStore,
        ToolCapability,
    };
    use crate::llm::ProviderError;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        replies: Mutex<Vec<Result<String, ProviderError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ProviderError::EmptyReply);
            }
            replies.remove(0)
        }
    }

    #[derive(Default)]
    struct SpyExecutor {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl SpyExecutor {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_call(&self) -> Option<(String, Map<String, Value>)> {
            self.calls.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl ActionExecutor for SpyExecutor {
        async fn execute(&self, action: &str, payload: &Map<String, Value>) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((action.to_string(), payload.clone()));
            Ok(serde_json::json!({"ok": true, "action": action}))
        }
    }

    struct DegradedSupervisor;

    impl RuntimeSupervisor for DegradedSupervisor {
        fn health(&self) -> RuntimeHealth {
            RuntimeHealth::Degraded
        }
    }

    fn capability(id: &str) -> ToolCapability {
        ToolCapability {
            id: id.to_string(),
            title: id.to_string(),
            detail: String::new(),
            enabled: true,
        }
    }

    fn store(tools: &[&str], security: SecurityConfig) -> Arc<StaticConfigStore> {
        Arc::new(StaticConfigStore::new(ConfigDocument {
            tools: tools.iter().map(|id| capability(id)).collect(),
            security,
            integrations: IntegrationSettings::default(),
        }))
    }

    fn permissive() -> SecurityConfig {
        SecurityConfig {
            require_approval: false,
            high_risk_actions: true,
            prefer_standard_web_tool: false,
            ..SecurityConfig::default()
        }
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        executor: Arc<SpyExecutor>,
        config: Arc<StaticConfigStore>,
    ) -> TurnOrchestrator {
        TurnOrchestrator::new(provider, executor, config, Arc::new(NominalSupervisor))
    }

    #[tokio::test]
    async fn provider_failure_is_terminal_with_no_events() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Transport(
            "connection refused".into(),
        ))]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&[], permissive()),
        );

        let result = orch.run_agent_turn("what is the weather like?").await;

        assert!(result.tool_events.is_empty());
        assert!(result.assistant_text.contains("provider error"));
        assert_eq!(executor.call_count(), 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn deterministic_call_intent_skips_first_model_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("Calling now.".into())]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&["android_device.calls.start"], permissive()),
        );

        let result = orch.run_agent_turn("call +1 555-123-4567").await;

        // Only the summary call reached the provider.
        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.assistant_text, "Calling now.");
        assert_eq!(result.tool_events.len(), 1);
        assert_eq!(result.tool_events[0].status, ExecutionStatus::Executed);
        assert!(result.tool_events[0].output.is_some());

        let (action, payload) = executor.last_call().unwrap();
        assert_eq!(action, "place_call");
        assert_eq!(payload["to"], "+15551234567");
    }

    #[tokio::test]
    async fn high_risk_directive_is_blocked_before_the_executor() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let executor = Arc::new(SpyExecutor::default());
        let security = SecurityConfig {
            require_approval: false,
            high_risk_actions: false,
            prefer_standard_web_tool: false,
            ..SecurityConfig::default()
        };
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&["android_device.calls.start"], security),
        );

        let result = orch.run_agent_turn("call +1 555-123-4567").await;

        assert_eq!(result.tool_events.len(), 1);
        assert_eq!(result.tool_events[0].status, ExecutionStatus::Blocked);
        assert_eq!(executor.call_count(), 0);
        // Blocked turns get no summary call either.
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn parsed_directive_from_model_reply_is_executed_and_summarized() {
        let reply = "Let me check.\n```json\n{\"type\":\"tool_call\",\"tool\":\"android_device.sensors.light\",\"arguments\":{}}\n```";
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(reply.into()),
            Ok("It is fairly bright around you.".into()),
        ]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&["android_device.sensors.light"], permissive()),
        );

        let result = orch.run_agent_turn("how bright is it in here?").await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(result.assistant_text, "It is fairly bright around you.");
        assert_eq!(result.tool_events.len(), 1);
        assert_eq!(result.tool_events[0].status, ExecutionStatus::Executed);

        let (action, payload) = executor.last_call().unwrap();
        assert_eq!(action, "sensor_read");
        assert_eq!(payload["sensor"], "light");
    }

    #[tokio::test]
    async fn plain_model_reply_passes_through_scrubbed() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "Just a thought.<system-reminder>hidden</system-reminder>".into(),
        )]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&[], permissive()),
        );

        let result = orch.run_agent_turn("tell me something").await;

        assert_eq!(result.assistant_text, "Just a thought.");
        assert!(result.tool_events.is_empty());
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn parsed_directive_survives_when_no_override_rule_matches() {
        let reply = r#"{"type":"tool_call","tool":"android_device.calls.log","arguments":{}}"#;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(reply.into()),
            Ok("Your last call was yesterday evening.".into()),
        ]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(
                &["android_device.calls.start", "android_device.calls.log"],
                permissive(),
            ),
        );

        // No call keyword and no number in the prompt, so neither the
        // deterministic shortcut nor the override cascade fires; the parsed
        // directive is dispatched as-is.
        let result = orch.run_agent_turn("who did I talk to recently?").await;

        let (action, _) = executor.last_call().unwrap();
        assert_eq!(action, "read_call_log");
        assert_eq!(result.tool_events[0].status, ExecutionStatus::Executed);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn degraded_runtime_short_circuits_inbound_intent() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = TurnOrchestrator::new(
            provider.clone(),
            executor.clone(),
            store(&[], permissive()),
            Arc::new(DegradedSupervisor),
        );

        let result = orch
            .run_agent_turn("reply on telegram when a message arrives")
            .await;

        assert!(result.tool_events.is_empty());
        assert!(result.assistant_text.contains("degraded"));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn configured_messaging_send_without_body_asks_for_content() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let executor = Arc::new(SpyExecutor::default());
        let config = Arc::new(StaticConfigStore::new(ConfigDocument {
            tools: vec![],
            security: permissive(),
            integrations: IntegrationSettings {
                telegram: MessagingIntegration {
                    enabled: true,
                    bot_token_set: true,
                    chat_id_set: true,
                },
            },
        }));
        let orch = orchestrator(provider.clone(), executor.clone(), config);

        let result = orch.run_agent_turn("send a telegram message to Ana").await;

        assert!(result.tool_events.is_empty());
        assert!(result.assistant_text.contains("What should the message say"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn web_read_failure_records_synthetic_failed_event() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let executor = Arc::new(SpyExecutor::default());
        let security = SecurityConfig {
            prefer_standard_web_tool: true,
            ..permissive()
        };
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&[], security),
        );

        // Nothing listens on discard; the fetch fails fast and the native
        // dispatcher is never involved.
        let result = orch
            .run_agent_turn("read http://127.0.0.1:9/page and summarize it")
            .await;

        assert_eq!(result.tool_events.len(), 1);
        assert_eq!(result.tool_events[0].tool, TOOL_WEB_READ);
        assert_eq!(result.tool_events[0].status, ExecutionStatus::Failed);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn embedded_read_substring_does_not_trigger_web_path() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("All good.".into())]));
        let executor = Arc::new(SpyExecutor::default());
        let security = SecurityConfig {
            prefer_standard_web_tool: true,
            ..permissive()
        };
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&[], security),
        );

        // "already" must not count as a read intent, so this goes to the
        // model instead of fetching the URL.
        let result = orch
            .run_agent_turn("is the rollout already live? status page: http://127.0.0.1:9/page")
            .await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.assistant_text, "All good.");
        assert!(result.tool_events.is_empty());
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn probe_runs_pipeline_without_model_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&["android_device.battery.status"], permissive()),
        );

        let raw = r#"{"type":"tool_call","tool":"android_device.battery.status","arguments":{}}"#;
        let result = orch.run_tool_probe(raw).await;

        assert_eq!(provider.call_count(), 0);
        assert_eq!(result.tool_events.len(), 1);
        assert_eq!(result.tool_events[0].status, ExecutionStatus::Executed);
    }

    #[tokio::test]
    async fn probe_reports_unparseable_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let executor = Arc::new(SpyExecutor::default());
        let orch = orchestrator(
            provider.clone(),
            executor.clone(),
            store(&[], permissive()),
        );

        let result = orch.run_tool_probe("nothing to see here").await;

        assert!(result.tool_events.is_empty());
        assert!(result.assistant_text.contains("no directive recognized"));
    }
}
