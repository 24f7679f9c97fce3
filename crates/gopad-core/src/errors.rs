use std::time::Duration;

/// Failure reported by an external format / compile / publish service.
///
/// Collaborator failures never end a session; the dispatcher turns them into
/// an `error` envelope or a log line.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The response could not be decoded or lacked a required field.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The service understood the request and refused it (e.g. a syntax error).
    #[error("{0}")]
    Rejected(String),
    /// The call exceeded the configured bound.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl CollaboratorError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Rejected(_) => "rejected",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// A frame that could not be turned into (or out of) an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Inbound text was not a valid envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Outbound envelope failed to serialize.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}
