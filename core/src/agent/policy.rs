//! Security policy gate
//!
//! Decides whether a resolved directive may execute given per-tool
//! enablement and the global risk flags. Checks run in order and the first
//! failing rule blocks. Approval is all-or-nothing: there is no interactive
//! per-call prompt in this design, so `require_approval` simply blocks the
//! high-risk set.

use super::directive::Directive;
use super::events::ToolExecutionEvent;
use crate::config::{SecurityConfig, ToolCapability};

/// Tools that touch telephony, messaging, personal data or on-device
/// automation. Membership is fixed; user configuration can only widen or
/// narrow what the flags allow, not the set itself.
pub const HIGH_RISK_TOOLS: &[&str] = &[
    "android_device.calls.start",
    "android_device.calls.log",
    "android_device.sms.send",
    "android_device.sms.inbox",
    "android_device.contacts.read",
    "android_device.calendar.read",
    "android_device.notifications.read",
    "android_device.ui.auto",
    "android_device.browser.open",
];

pub fn is_high_risk(tool: &str) -> bool {
    HIGH_RISK_TOOLS.contains(&tool)
}

/// Outcome of the gate check.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Proceed,
    Blocked(ToolExecutionEvent),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyGate;

impl PolicyGate {
    pub fn new() -> Self {
        Self
    }

    pub fn check(
        &self,
        directive: &Directive,
        capabilities: &[ToolCapability],
        security: &SecurityConfig,
    ) -> GateDecision {
        let tool = directive.tool.as_str();

        let known_and_enabled = capabilities.iter().any(|c| c.id == tool && c.enabled);
        if !known_and_enabled {
            tracing::info!(tool, "directive blocked: disabled by policy");
            return GateDecision::Blocked(ToolExecutionEvent::blocked(tool, "disabled by policy"));
        }

        if is_high_risk(tool) {
            if !security.high_risk_actions {
                tracing::info!(tool, "directive blocked: high-risk actions disabled");
                return GateDecision::Blocked(ToolExecutionEvent::blocked(
                    tool,
                    "high-risk actions are disabled in security settings",
                ));
            }
            if security.require_approval {
                tracing::info!(tool, "directive blocked: approval required");
                return GateDecision::Blocked(ToolExecutionEvent::blocked(
                    tool,
                    "approval is required for high-risk actions; disable require_approval to run them",
                ));
            }
        }

        GateDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::directive::ToolId;
    use crate::agent::events::ExecutionStatus;

    fn capability(id: &str, enabled: bool) -> ToolCapability {
        ToolCapability {
            id: id.to_string(),
            title: id.to_string(),
            detail: String::new(),
            enabled,
        }
    }

    fn directive(id: &str) -> Directive {
        Directive::bare(ToolId::parse(id).unwrap())
    }

    fn permissive() -> SecurityConfig {
        SecurityConfig {
            require_approval: false,
            high_risk_actions: true,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn unknown_tool_is_blocked_as_disabled() {
        let gate = PolicyGate::new();
        let decision = gate.check(
            &directive("android_device.battery.status"),
            &[],
            &permissive(),
        );
        match decision {
            GateDecision::Blocked(event) => {
                assert_eq!(event.status, ExecutionStatus::Blocked);
                assert_eq!(event.detail, "disabled by policy");
            }
            GateDecision::Proceed => panic!("unknown tool must not proceed"),
        }
    }

    #[test]
    fn disabled_tool_is_blocked() {
        let gate = PolicyGate::new();
        let caps = vec![capability("android_device.battery.status", false)];
        assert!(matches!(
            gate.check(
                &directive("android_device.battery.status"),
                &caps,
                &permissive()
            ),
            GateDecision::Blocked(_)
        ));
    }

    #[test]
    fn high_risk_flag_blocks_every_high_risk_tool() {
        let gate = PolicyGate::new();
        let security = SecurityConfig {
            require_approval: false,
            high_risk_actions: false,
            ..SecurityConfig::default()
        };
        for tool in HIGH_RISK_TOOLS {
            let caps = vec![capability(tool, true)];
            assert!(
                matches!(
                    gate.check(&directive(tool), &caps, &security),
                    GateDecision::Blocked(_)
                ),
                "{tool} must be blocked while high_risk_actions is off"
            );
        }
    }

    #[test]
    fn approval_flag_blocks_high_risk_even_when_allowed() {
        let gate = PolicyGate::new();
        let security = SecurityConfig {
            require_approval: true,
            high_risk_actions: true,
            ..SecurityConfig::default()
        };
        let caps = vec![capability("android_device.calls.start", true)];
        assert!(matches!(
            gate.check(&directive("android_device.calls.start"), &caps, &security),
            GateDecision::Blocked(_)
        ));
    }

    #[test]
    fn benign_enabled_tool_proceeds_under_default_security() {
        let gate = PolicyGate::new();
        let caps = vec![capability("android_device.sensors.light", true)];
        assert_eq!(
            gate.check(
                &directive("android_device.sensors.light"),
                &caps,
                &SecurityConfig::default()
            ),
            GateDecision::Proceed
        );
    }

    #[test]
    fn fully_permissive_config_lets_high_risk_through() {
        let gate = PolicyGate::new();
        let caps = vec![capability("android_device.sms.send", true)];
        assert_eq!(
            gate.check(&directive("android_device.sms.send"), &caps, &permissive()),
            GateDecision::Proceed
        );
    }
}
