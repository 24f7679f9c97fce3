//! Server-side error types.

use gopad_core::{ConnectionId, EnvelopeError};
use thiserror::Error;

/// Registry misuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection already has a registry entry.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

/// Failure delivering one envelope to one connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,
    /// The connection's outbound queue is full.
    #[error("outbound queue full")]
    Full,
    /// The envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] EnvelopeError),
}
