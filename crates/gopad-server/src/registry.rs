//! Client registry: the authoritative set of connected participants.
//!
//! One mutex guards the map. It is held only for the map operation itself;
//! callers get `Arc<Client>` snapshots and do their network writes after the
//! lock is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gopad_core::{ClientId, ConnectionId};
use parking_lot::Mutex;
use tracing::debug;

use crate::connection::ClientConnection;
use crate::errors::RegistryError;

/// One connected participant.
#[derive(Debug)]
pub struct Client {
    /// Registry-assigned id, unique for the life of the process.
    pub id: ClientId,
    /// Name shown in chat and presence messages.
    pub display_name: String,
    /// Send side of the participant's socket.
    pub connection: Arc<ClientConnection>,
}

/// Registry of all connected clients.
pub struct ClientRegistry {
    clients: Mutex<HashMap<ConnectionId, Arc<Client>>>,
    next_seq: AtomicU64,
    name_prefix: String,
}

impl ClientRegistry {
    /// Empty registry naming participants `<prefix><id>`.
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            name_prefix: name_prefix.into(),
        }
    }

    /// Add a connection under a fresh id.
    ///
    /// Ids come from a monotonically increasing sequence and are never
    /// reused, so churn cannot produce collisions.
    pub fn register(&self, connection: Arc<ClientConnection>) -> Result<Arc<Client>, RegistryError> {
        self.register_with(connection, |_, _| {})
    }

    /// Like [`register`](Self::register), but runs `admit` with the new
    /// client and the participant count (including it) before the client is
    /// visible to `all` or `lookup`.
    ///
    /// `admit` runs under the registry lock, so it must not block or touch
    /// the registry. Queueing a frame on the new connection is fine: sends
    /// never wait.
    pub fn register_with<F>(&self, connection: Arc<ClientConnection>, admit: F) -> Result<Arc<Client>, RegistryError>
    where
        F: FnOnce(&Client, usize),
    {
        let mut clients = self.clients.lock();
        if clients.contains_key(connection.id()) {
            return Err(RegistryError::AlreadyRegistered(connection.id().clone()));
        }
        let id = ClientId::from_seq(self.next_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let client = Arc::new(Client {
            id,
            display_name: display_name(&self.name_prefix, id),
            connection,
        });
        admit(&client, clients.len() + 1);
        let _ = clients.insert(client.connection.id().clone(), Arc::clone(&client));
        debug!(client_id = %id, registered = clients.len(), "client registered");
        Ok(client)
    }

    /// Remove the entry for `connection`, if any.
    pub fn unregister(&self, connection: &ConnectionId) -> Option<Arc<Client>> {
        let removed = self.clients.lock().remove(connection);
        if let Some(client) = &removed {
            debug!(client_id = %client.id, "client unregistered");
        }
        removed
    }

    /// Current entry for `connection`.
    pub fn lookup(&self, connection: &ConnectionId) -> Option<Arc<Client>> {
        self.clients.lock().get(connection).cloned()
    }

    /// Snapshot of every registered client.
    pub fn all(&self) -> Vec<Arc<Client>> {
        self.clients.lock().values().cloned().collect()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

/// `<prefix><id>`, with the id zero-padded to at least two digits.
fn display_name(prefix: &str, id: ClientId) -> String {
    format!("{prefix}{:02}", id.seq())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn conn() -> Arc<ClientConnection> {
        ClientConnection::channel(8).0
    }

    #[test]
    fn register_assigns_name_from_prefix() {
        let registry = ClientRegistry::new("U-");
        let client = registry.register(conn()).unwrap();
        assert_eq!(client.id.to_string(), "1");
        assert_eq!(client.display_name, "U-01");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn admit_runs_before_client_is_visible() {
        let registry = ClientRegistry::new("U-");
        let _ = registry.register(conn()).unwrap();
        let mut seen = None;
        let client = registry
            .register_with(conn(), |client, count| {
                seen = Some((client.display_name.clone(), count));
            })
            .unwrap();
        assert_eq!(seen, Some(("U-02".to_string(), 2)));
        assert!(registry.lookup(client.connection.id()).is_some());
    }

    #[test]
    fn admit_is_skipped_for_duplicates() {
        let registry = ClientRegistry::new("U-");
        let c = conn();
        let _ = registry.register(Arc::clone(&c)).unwrap();
        let mut called = false;
        assert!(registry.register_with(c, |_, _| called = true).is_err());
        assert!(!called);
    }

    #[test]
    fn wide_ids_are_not_truncated() {
        assert_eq!(display_name("U-", ClientId::from_seq(123)), "U-123");
    }

    #[test]
    fn same_connection_twice_is_rejected() {
        let registry = ClientRegistry::new("U-");
        let c = conn();
        let _ = registry.register(Arc::clone(&c)).unwrap();
        let err = registry.register(Arc::clone(&c)).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(c.id().clone()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ClientRegistry::new("U-");
        let c = conn();
        let _ = registry.register(Arc::clone(&c)).unwrap();
        assert!(registry.unregister(c.id()).is_some());
        assert!(registry.unregister(c.id()).is_none());
        assert!(registry.unregister(&ConnectionId::new()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_after_unregister_is_none() {
        let registry = ClientRegistry::new("U-");
        let c = conn();
        let client = registry.register(Arc::clone(&c)).unwrap();
        assert_eq!(registry.lookup(c.id()).unwrap().id, client.id);
        let _ = registry.unregister(c.id());
        assert!(registry.lookup(c.id()).is_none());
    }

    #[test]
    fn ids_survive_churn_without_collision() {
        // Size-derived ids would hand the newcomer "2" again here.
        let registry = ClientRegistry::new("U-");
        let a = conn();
        let b = conn();
        let _ = registry.register(Arc::clone(&a)).unwrap();
        let second = registry.register(Arc::clone(&b)).unwrap();
        let _ = registry.unregister(a.id());
        let third = registry.register(conn()).unwrap();
        assert_ne!(second.id, third.id);
        let ids: HashSet<_> = registry.all().iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), registry.len());
    }

    #[test]
    fn size_tracks_registers_minus_unregisters() {
        let registry = ClientRegistry::new("U-");
        let conns: Vec<_> = (0..10).map(|_| conn()).collect();
        for (i, c) in conns.iter().enumerate() {
            let _ = registry.register(Arc::clone(c)).unwrap();
            assert_eq!(registry.len(), i + 1);
        }
        for (i, c) in conns.iter().take(4).enumerate() {
            let _ = registry.unregister(c.id());
            assert_eq!(registry.all().len(), 10 - i - 1);
        }
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let registry = ClientRegistry::new("U-");
        let a = conn();
        let _ = registry.register(Arc::clone(&a)).unwrap();
        let snapshot = registry.all();
        let _ = registry.unregister(a.id());
        let _ = registry.register(conn()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].connection.id(), a.id());
    }

    #[test]
    fn concurrent_register_unregister_keeps_ids_unique() {
        let registry = Arc::new(ClientRegistry::new("U-"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..200 {
                        let c = conn();
                        let client = registry.register(Arc::clone(&c)).unwrap();
                        if i % 2 == 0 {
                            let _ = registry.unregister(c.id());
                        } else {
                            kept.push(client.id);
                        }
                        let _ = registry.all();
                    }
                    kept
                })
            })
            .collect();

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all_ids.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(registry.len(), 8 * 100);
        assert_eq!(all_ids.len(), registry.len());
    }
}
