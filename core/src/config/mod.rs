//! Configuration types and the read-only configuration store boundary
//!
//! The pipeline never persists configuration. It reads a fresh snapshot of
//! tool enablement, security flags and integration state at the start of
//! every turn so concurrent edits are picked up on the next turn, never
//! mid-turn.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One model-facing tool the user can enable or disable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCapability {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Per-turn security snapshot. Defaults are the safe ones: approval
/// required, high-risk actions off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub require_approval: bool,
    pub high_risk_actions: bool,
    pub incoming_call_hooks: bool,
    pub include_caller_number: bool,
    pub prefer_standard_web_tool: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_approval: true,
            high_risk_actions: false,
            incoming_call_hooks: false,
            include_caller_number: false,
            prefer_standard_web_tool: true,
        }
    }
}

/// State of one outbound messaging integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingIntegration {
    pub enabled: bool,
    pub bot_token_set: bool,
    pub chat_id_set: bool,
}

impl MessagingIntegration {
    /// Enabled and with every credential present.
    pub fn is_fully_configured(&self) -> bool {
        self.enabled && self.bot_token_set && self.chat_id_set
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    pub telegram: MessagingIntegration,
}

/// Read-only configuration accessors. No write path exists in this core.
pub trait ConfigStore: Send + Sync {
    fn capabilities(&self) -> Vec<ToolCapability>;
    fn security(&self) -> SecurityConfig;
    fn integrations(&self) -> IntegrationSettings;
}

/// Full on-disk configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub tools: Vec<ToolCapability>,
    pub security: SecurityConfig,
    pub integrations: IntegrationSettings,
}

/// Fixed in-memory store, used by tests and one-shot CLI runs.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    pub document: ConfigDocument,
}

impl StaticConfigStore {
    pub fn new(document: ConfigDocument) -> Self {
        Self { document }
    }
}

impl ConfigStore for StaticConfigStore {
    fn capabilities(&self) -> Vec<ToolCapability> {
        self.document.tools.clone()
    }

    fn security(&self) -> SecurityConfig {
        self.document.security.clone()
    }

    fn integrations(&self) -> IntegrationSettings {
        self.document.integrations.clone()
    }
}

/// YAML-file-backed store. The file is re-read on every accessor call so a
/// turn always sees the user's latest settings; unreadable or malformed
/// files degrade to defaults with a warning rather than failing the turn.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> ConfigDocument {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_yml::from_str::<ConfigDocument>(&raw) {
                Ok(doc) => doc,
                Err(error) => {
                    tracing::warn!(path = %self.path.display(), %error, "malformed config, using defaults");
                    ConfigDocument::default()
                }
            },
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "unreadable config, using defaults");
                ConfigDocument::default()
            }
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn capabilities(&self) -> Vec<ToolCapability> {
        self.read().tools
    }

    fn security(&self) -> SecurityConfig {
        self.read().security
    }

    fn integrations(&self) -> IntegrationSettings {
        self.read().integrations
    }
}

/// Seed capability list: every registered tool, with only the benign
/// read-only ones enabled out of the box.
pub fn default_capabilities() -> Vec<ToolCapability> {
    const ENABLED_BY_DEFAULT: &[&str] = &[
        "android_device.battery.status",
        "android_device.device.info",
        "android_device.sensors.accelerometer",
        "android_device.sensors.gyroscope",
        "android_device.sensors.light",
        "standard.web_read",
    ];

    let mut capabilities: Vec<ToolCapability> = crate::agent::dispatch::registered_tools()
        .iter()
        .map(|(id, action)| ToolCapability {
            id: id.to_string(),
            title: id.rsplit('.').next().unwrap_or(id).replace('_', " "),
            detail: format!("native action {action}"),
            enabled: ENABLED_BY_DEFAULT.contains(id),
        })
        .collect();

    // Orchestrator-synthesized, so it has no registry entry but is still a
    // tool the user can toggle.
    capabilities.push(ToolCapability {
        id: "standard.web_read".to_string(),
        title: "web read".to_string(),
        detail: "orchestrated page read".to_string(),
        enabled: true,
    });

    capabilities
}
