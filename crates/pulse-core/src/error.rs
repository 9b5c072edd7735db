//! Domain errors shared by contract implementations

use thiserror::Error;

use crate::ids::ConversationId;

/// Errors surfaced by collaborator contracts
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
