//! Directive types - the resolved form of a model tool call
//!
//! A `Directive` is the single well-typed unit that flows through the
//! pipeline: produced by the parser or the intent inferencer, consumed once
//! by the policy gate, normalizer and dispatcher. It is never mutated after
//! creation; normalization produces a fresh payload instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Namespace prefix for tools that run in a backend runtime, not on-device.
pub const INTEGRATION_PREFIX: &str = "integration.";

/// Error validating a tool identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// Empty tool id
    #[error("tool id is empty")]
    EmptyToolId,

    /// Tool id contains a malformed segment
    #[error("malformed tool id: {0}")]
    MalformedToolId(String),
}

/// A validated, dot-namespaced tool identifier (e.g. `android_device.calls.start`).
///
/// The id is an open string on the wire but validated at the boundary so
/// unmapped or garbage tools are caught before execution, not during it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    /// Parse and validate a raw tool id.
    ///
    /// Segments are lowercase ASCII letters, digits and underscores,
    /// separated by single dots. At least one segment is required.
    pub fn parse(raw: &str) -> Result<Self, DirectiveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DirectiveError::EmptyToolId);
        }
        let valid = trimmed.split('.').all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        });
        if !valid {
            return Err(DirectiveError::MalformedToolId(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First dot-separated segment (e.g. `android_device`).
    pub fn namespace(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Trailing dot-separated segment (e.g. `start`).
    pub fn leaf(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Whether this tool belongs to the backend integration runtime.
    pub fn is_integration(&self) -> bool {
        self.0.starts_with(INTEGRATION_PREFIX)
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved tool-call directive.
///
/// `arguments` is always a plain JSON object - never an array, never null.
/// The parser and inferencer enforce that invariant at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub tool: ToolId,
    pub arguments: Map<String, Value>,
}

impl Directive {
    /// Create a directive with an empty argument map.
    pub fn bare(tool: ToolId) -> Self {
        Self {
            tool,
            arguments: Map::new(),
        }
    }

    pub fn new(tool: ToolId, arguments: Map<String, Value>) -> Self {
        Self { tool, arguments }
    }
}
