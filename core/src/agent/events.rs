//! Execution events - terminal records of one dispatch attempt
//!
//! Events are immutable once created and serializable so callers can log
//! them as audit/activity entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The native executor ran the action and returned
    Executed,
    /// The security policy refused the directive before dispatch
    Blocked,
    /// The dispatch was attempted (or rejected at the dispatch layer) and failed
    Failed,
}

/// Terminal record of one tool dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionEvent {
    /// Model-facing tool id the directive named
    pub tool: String,
    pub status: ExecutionStatus,
    /// Human-readable outcome description
    pub detail: String,
    /// Raw executor result, present only on `Executed` with a non-null value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// When the attempt finished
    pub at: DateTime<Utc>,
}

impl ToolExecutionEvent {
    pub fn executed(
        tool: impl Into<String>,
        detail: impl Into<String>,
        output: Option<Value>,
    ) -> Self {
        Self {
            tool: tool.into(),
            status: ExecutionStatus::Executed,
            detail: detail.into(),
            output,
            at: Utc::now(),
        }
    }

    pub fn blocked(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status: ExecutionStatus::Blocked,
            detail: detail.into(),
            output: None,
            at: Utc::now(),
        }
    }

    pub fn failed(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status: ExecutionStatus::Failed,
            detail: detail.into(),
            output: None,
            at: Utc::now(),
        }
    }
}

/// Externally visible outcome of one orchestrated turn.
///
/// `tool_events` carries 0 or 1 entries in the current protocol (one tool
/// call per turn), but callers must iterate rather than index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTurnResult {
    pub assistant_text: String,
    pub tool_events: Vec<ToolExecutionEvent>,
}

impl AgentTurnResult {
    /// A plain conversational reply with no tool activity.
    pub fn text_only(assistant_text: impl Into<String>) -> Self {
        Self {
            assistant_text: assistant_text.into(),
            tool_events: Vec::new(),
        }
    }

    pub fn with_event(assistant_text: impl Into<String>, event: ToolExecutionEvent) -> Self {
        Self {
            assistant_text: assistant_text.into(),
            tool_events: vec![event],
        }
    }
}
