//! Error types for the admin API client.
//!
//! # Design
//! Every non-2xx response lands in `ApiError::Http`, whose display text is the
//! best human-readable message the server offered (see
//! `client::resolve_error_message`). The status code stays available for
//! callers that branch on it. Shape problems in list envelopes are never
//! errors; they are absorbed by the pagination normalizer.

use thiserror::Error;

/// Errors surfaced by request building, response parsing and the host
/// transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The host could not complete the round-trip (DNS, TCP, TLS, I/O).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The configured request timeout elapsed.
    #[error("request timed out")]
    Timeout,
}

impl ApiError {
    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors produced while decoding Engine.IO / Socket.IO frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown engine.io packet type {0:?}")]
    UnknownEnginePacket(char),

    #[error("unknown socket.io packet type {0:?}")]
    UnknownSocketPacket(char),

    #[error("binary socket.io packets are not supported")]
    BinaryUnsupported,

    #[error("malformed packet: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_server_message_verbatim() {
        let err = ApiError::Http {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn non_http_errors_have_no_status() {
        assert_eq!(ApiError::Timeout.status(), None);
        assert_eq!(ApiError::Transport("refused".into()).status(), None);
    }
}
