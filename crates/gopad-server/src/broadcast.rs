//! Envelope fan-out to registered clients.
//!
//! Delivery is best-effort: each recipient is attempted independently and a
//! failed write is logged against that recipient only. A failing recipient
//! stays registered; only its own session loop can unregister it.

use std::sync::Arc;

use gopad_core::Envelope;
use tracing::{debug, warn};

use crate::errors::SendError;
use crate::registry::{Client, ClientRegistry};

/// Who an outbound envelope is addressed to, relative to its sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Only the sender.
    Sender,
    /// Every registered client except the sender.
    Others,
    /// The sender and every other registered client.
    Everyone,
}

/// An envelope plus its addressing.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    /// Recipients.
    pub audience: Audience,
    /// Payload.
    pub envelope: Envelope,
}

impl Outbound {
    /// Address `envelope` to `audience`.
    pub fn new(audience: Audience, envelope: Envelope) -> Self {
        Self { audience, envelope }
    }
}

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients a write was attempted for.
    pub attempted: usize,
    /// Attempts that failed.
    pub failed: usize,
}

impl Delivery {
    /// Attempts that succeeded.
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed
    }

    fn record(&mut self, ok: bool) {
        self.attempted += 1;
        if !ok {
            self.failed += 1;
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            attempted: self.attempted + other.attempted,
            failed: self.failed + other.failed,
        }
    }
}

/// Delivers envelopes to one, the others, or all registered clients.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    /// Broadcaster over `registry`.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Write to exactly one client.
    pub fn send_to(&self, client: &Client, envelope: &Envelope) -> Result<(), SendError> {
        let frame = Arc::new(envelope.encode()?);
        write(client, &frame, envelope)
    }

    /// Write to every registered client except `sender`.
    pub fn send_to_others(&self, sender: &Client, envelope: &Envelope) -> Delivery {
        let Some(frame) = encode(envelope) else {
            return Delivery::default();
        };
        self.fan_out(sender, &frame, envelope)
    }

    /// Write to `sender`, then to everyone else.
    pub fn send_to_all(&self, sender: &Client, envelope: &Envelope) -> Delivery {
        let Some(frame) = encode(envelope) else {
            return Delivery::default();
        };
        let mut own = Delivery::default();
        own.record(write(sender, &frame, envelope).is_ok());
        own.merge(self.fan_out(sender, &frame, envelope))
    }

    /// Deliver according to the outbound's audience.
    pub fn deliver(&self, sender: &Client, outbound: &Outbound) -> Delivery {
        match outbound.audience {
            Audience::Sender => {
                let mut delivery = Delivery::default();
                delivery.record(self.send_to(sender, &outbound.envelope).is_ok());
                delivery
            }
            Audience::Others => self.send_to_others(sender, &outbound.envelope),
            Audience::Everyone => self.send_to_all(sender, &outbound.envelope),
        }
    }

    fn fan_out(&self, sender: &Client, frame: &Arc<String>, envelope: &Envelope) -> Delivery {
        let sender_conn = sender.connection.id();
        let mut delivery = Delivery::default();
        for client in self.registry.all() {
            if client.connection.id() == sender_conn {
                continue;
            }
            delivery.record(write(&client, frame, envelope).is_ok());
        }
        debug!(
            kind = %envelope.kind,
            sender = %sender.id,
            recipients = delivery.attempted,
            failed = delivery.failed,
            "broadcast to others"
        );
        delivery
    }
}

fn write(client: &Client, frame: &Arc<String>, envelope: &Envelope) -> Result<(), SendError> {
    client.connection.send(Arc::clone(frame)).inspect_err(|e| {
        warn!(client_id = %client.id, kind = %envelope.kind, error = %e, "failed to send envelope to client");
    })
}

fn encode(envelope: &Envelope) -> Option<Arc<String>> {
    match envelope.encode() {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(kind = %envelope.kind, error = %e, "failed to serialize envelope");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ClientConnection;
    use gopad_core::Kind;
    use tokio::sync::mpsc;

    fn setup(n: usize) -> (Broadcaster, Vec<Arc<Client>>, Vec<mpsc::Receiver<Arc<String>>>) {
        let registry = Arc::new(ClientRegistry::new("U-"));
        let mut clients = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..n {
            let (conn, rx) = ClientConnection::channel(16);
            clients.push(registry.register(conn).unwrap());
            receivers.push(rx);
        }
        (Broadcaster::new(registry), clients, receivers)
    }

    fn recv(rx: &mut mpsc::Receiver<Arc<String>>) -> Option<Envelope> {
        rx.try_recv().ok().map(|f| Envelope::decode(&f).unwrap())
    }

    #[test]
    fn send_to_reaches_only_target() {
        let (bc, clients, mut rxs) = setup(3);
        bc.send_to(&clients[1], &Envelope::new(Kind::Info, "hi")).unwrap();
        assert!(recv(&mut rxs[0]).is_none());
        assert_eq!(recv(&mut rxs[1]).unwrap().body, "hi");
        assert!(recv(&mut rxs[2]).is_none());
    }

    #[test]
    fn send_to_others_skips_sender() {
        let (bc, clients, mut rxs) = setup(4);
        let delivery = bc.send_to_others(&clients[0], &Envelope::new(Kind::Update, "p"));
        assert_eq!(delivery, Delivery { attempted: 3, failed: 0 });
        assert!(recv(&mut rxs[0]).is_none());
        for rx in &mut rxs[1..] {
            assert_eq!(recv(rx).unwrap().kind, Kind::Update);
        }
    }

    #[test]
    fn send_to_all_attempts_every_client() {
        let (bc, clients, mut rxs) = setup(5);
        let delivery = bc.send_to_all(&clients[2], &Envelope::new(Kind::Chat, "x"));
        assert_eq!(delivery.attempted, 5);
        assert_eq!(delivery.delivered(), 5);
        for rx in &mut rxs {
            assert!(recv(rx).is_some());
        }
    }

    #[test]
    fn single_client_others_is_empty() {
        let (bc, clients, mut rxs) = setup(1);
        assert_eq!(bc.send_to_others(&clients[0], &Envelope::new(Kind::Update, "")).attempted, 0);
        assert!(recv(&mut rxs[0]).is_none());
    }

    #[test]
    fn failed_recipient_does_not_stop_the_rest() {
        let (bc, clients, mut rxs) = setup(4);
        // Close the second client's writer.
        let closed = rxs.remove(1);
        drop(closed);

        let delivery = bc.send_to_all(&clients[0], &Envelope::new(Kind::Code, "src"));
        assert_eq!(delivery, Delivery { attempted: 4, failed: 1 });
        assert!(recv(&mut rxs[0]).is_some());
        assert!(recv(&mut rxs[1]).is_some());
        assert!(recv(&mut rxs[2]).is_some());
    }

    #[test]
    fn failed_recipient_stays_registered() {
        let registry = Arc::new(ClientRegistry::new("U-"));
        let (a, _ra) = ClientConnection::channel(4);
        let (b, rb) = ClientConnection::channel(4);
        let sender = registry.register(a).unwrap();
        let _ = registry.register(b).unwrap();
        drop(rb);

        let bc = Broadcaster::new(Arc::clone(&registry));
        let delivery = bc.send_to_others(&sender, &Envelope::new(Kind::Chat, "x"));
        assert_eq!(delivery.failed, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn deliver_routes_by_audience() {
        let (bc, clients, mut rxs) = setup(3);
        let out = Outbound::new(Audience::Sender, Envelope::new(Kind::Info, "welcome"));
        assert_eq!(bc.deliver(&clients[0], &out).attempted, 1);
        assert!(recv(&mut rxs[0]).is_some());
        assert!(recv(&mut rxs[1]).is_none());

        let out = Outbound::new(Audience::Others, Envelope::new(Kind::Info, "joined"));
        assert_eq!(bc.deliver(&clients[0], &out).attempted, 2);
        assert!(recv(&mut rxs[0]).is_none());

        let out = Outbound::new(Audience::Everyone, Envelope::new(Kind::Gist, "url"));
        assert_eq!(bc.deliver(&clients[0], &out).attempted, 3);
    }

    #[test]
    fn unregistered_sender_still_reaches_everyone_else() {
        let registry = Arc::new(ClientRegistry::new("U-"));
        let (a, _ra) = ClientConnection::channel(4);
        let (b, mut rb) = ClientConnection::channel(4);
        let gone = registry.register(Arc::clone(&a)).unwrap();
        let _ = registry.register(b).unwrap();
        let _ = registry.unregister(a.id());

        let bc = Broadcaster::new(registry);
        let delivery = bc.send_to_others(&gone, &Envelope::new(Kind::Leave, "1"));
        assert_eq!(delivery.attempted, 1);
        assert_eq!(recv(&mut rb).unwrap().kind, Kind::Leave);
    }
}
