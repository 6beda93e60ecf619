use shared::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot connect without an identity")]
    MissingIdentity,

    #[error("connection manager is shutting down")]
    ShuttingDown,

    #[error("server rejected the connection: {reason}")]
    Rejected {
        reason: String,
        message: Option<String>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    /// Decode and encode failures alike.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failure reported by a router handler. Dispatch logs it and moves on.
#[derive(Debug, Error)]
#[error("{context}: {reason}")]
pub struct HandlerError {
    pub context: &'static str,
    pub reason: String,
}

impl HandlerError {
    pub fn new(context: &'static str, reason: impl Into<String>) -> Self {
        Self {
            context,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_convert_transparently() {
        let error: SyncError = shared::decode(r#"{"type":"warp_drive"}"#).unwrap_err().into();
        assert!(matches!(error, SyncError::Protocol(ProtocolError::UnknownType(_))));
        assert_eq!(error.to_string(), "unknown message type `warp_drive`");
    }
}
