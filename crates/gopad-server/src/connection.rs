//! Connection handle: the send side of one WebSocket client.
//!
//! Writes go through a bounded channel drained by a single writer task, so
//! envelopes composed concurrently for the same socket never interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gopad_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::errors::SendError;

/// Represents a connected WebSocket client.
pub struct ClientConnection {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Wrap an outbound channel under a fresh connection id.
    pub fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// New connection plus the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(tx)), rx)
    }

    /// Transport identity.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue an encoded frame without waiting.
    ///
    /// A full or closed queue is a failed delivery and bumps the drop counter.
    pub fn send(&self, frame: Arc<String>) -> Result<(), SendError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                match e {
                    TrySendError::Full(_) => Err(SendError::Full),
                    TrySendError::Closed(_) => Err(SendError::Closed),
                }
            }
        }
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}
