//! Chat provider boundary
//!
//! The pipeline sends an ordered list of role-tagged messages and gets plain
//! reply text back. Provider-specific response shapes are the adapter's
//! problem; nothing beyond final text crosses this boundary.

pub mod chat;
pub mod client;

pub use chat::{ChatMessage, MessageRole};
pub use client::{OpenAiCompatibleClient, ProviderConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Chat completion failure. The only error that aborts a turn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Request never completed (DNS, connect, timeout)
    #[error("provider transport error: {0}")]
    Transport(String),

    /// Credentials rejected (401/403)
    #[error("provider rejected credentials: {0}")]
    Auth(String),

    /// Provider answered with a non-success status
    #[error("provider error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Reply body did not contain usable text
    #[error("provider returned an empty or malformed reply")]
    EmptyReply,
}

/// Chat completion provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one ordered message list, get the reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
