//! `/health` endpoint: liveness plus a presence summary of the editing room.

use std::time::Instant;

use serde::Serialize;

use crate::registry::ClientRegistry;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` while the relay is serving.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Number of registered participants.
    pub connections: usize,
    /// Display names of registered participants, in join order.
    pub participants: Vec<String>,
    /// Frames dropped on full outbound queues, summed over current participants.
    pub dropped_frames: u64,
}

/// Summarize the room from one registry snapshot.
pub fn health_check(start_time: Instant, registry: &ClientRegistry) -> HealthResponse {
    let mut clients = registry.all();
    clients.sort_by_key(|c| c.id);
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections: clients.len(),
        dropped_frames: clients.iter().map(|c| c.connection.drop_count()).sum(),
        participants: clients.into_iter().map(|c| c.display_name.clone()).collect(),
    }
}
