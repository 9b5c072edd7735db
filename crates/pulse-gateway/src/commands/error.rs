//! Command error types

use thiserror::Error;

use pulse_cache::SubscriberError;
use pulse_core::{ConversationId, CoreError, Frame};

/// Why a client command was rejected or failed
#[derive(Debug, Error)]
pub enum CommandError {
    /// Payload did not parse into a known command
    #[error("Malformed command: {0}")]
    Malformed(String),

    /// Issuer is not a participant of the conversation
    #[error("Not a participant of conversation {0}")]
    NotParticipant(ConversationId),

    /// Membership lookup failed
    #[error("Membership lookup failed: {0}")]
    Membership(#[from] CoreError),

    /// Fabric subscription change failed
    #[error("Fabric subscription failed: {0}")]
    Fabric(#[from] SubscriberError),

    /// Internal failure while handling the command
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Stable machine-readable code for the error frame
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "INVALID_INPUT",
            Self::NotParticipant(_) => "NOT_PARTICIPANT",
            Self::Membership(_) => "DATABASE_ERROR",
            Self::Fabric(_) => "CACHE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Render as an error frame for the issuing connection
    ///
    /// Client-caused rejections carry their message; server-side
    /// failures keep the detail in the logs and send a generic line.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        match self {
            Self::Malformed(_) | Self::NotParticipant(_) => {
                Frame::error(self.code(), self.to_string())
            }
            Self::Membership(_) | Self::Fabric(_) | Self::Internal(_) => {
                Frame::error(self.code(), "Temporary failure, retry shortly")
            }
        }
    }
}

/// Result type for command handling
pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CommandError::Malformed("x".into()).code(), "INVALID_INPUT");
        assert_eq!(
            CommandError::NotParticipant(ConversationId::generate()).code(),
            "NOT_PARTICIPANT"
        );
        assert_eq!(CommandError::Internal("x".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_rejections_carry_their_message() {
        let frame = CommandError::Malformed("missing field `type`".into()).to_frame();
        match frame {
            Frame::Error { code, message } => {
                assert_eq!(code, "INVALID_INPUT");
                assert!(message.contains("missing field"));
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[test]
    fn test_server_failures_are_redacted() {
        let frame = CommandError::Internal("pool exhausted on shard 3".into()).to_frame();
        match frame {
            Frame::Error { code, message } => {
                assert_eq!(code, "INTERNAL_ERROR");
                assert!(!message.contains("shard"));
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }
}
