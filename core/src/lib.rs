//! handsfree-core - assistant directive protocol and execution pipeline
//!
//! The core behind a mobile assistant client: a remote chat model returns
//! free-form text, and some of that text expresses an intent to perform a
//! device action. This crate recognizes that intent even in malformed
//! output, resolves it into a single typed directive, gates it against the
//! user's security policy, dispatches it to a native action executor, and
//! folds the result back into a natural-language reply.
//!
//! External collaborators are traits: [`llm::ChatProvider`],
//! [`executor::ActionExecutor`], [`config::ConfigStore`] and
//! [`agent::RuntimeSupervisor`]. Everything else - screens, storage,
//! project CRUD - lives outside this crate.

pub mod agent;
pub mod config;
pub mod executor;
pub mod llm;
pub mod tools;

// Re-exports for convenience
pub use agent::{AgentTurnResult, Directive, ToolExecutionEvent, TurnOrchestrator};
pub use config::{ConfigStore, SecurityConfig, ToolCapability};
