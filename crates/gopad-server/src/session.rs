//! Session lifecycle: one connection from registration to unregistration.
//!
//! `Connecting -> Registered -> Active -> Disconnected`. Once a client is
//! registered it is unregistered exactly once, whether the session ends via
//! [`Session::leave`] or by being dropped.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use gopad_core::{Envelope, EnvelopeError, Kind};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::broadcast::{Broadcaster, Outbound};
use crate::connection::ClientConnection;
use crate::dispatch::Dispatcher;
use crate::errors::RegistryError;
use crate::registry::{Client, ClientRegistry};

/// Interval between server-initiated Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Shared handles every session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Participant registry.
    pub registry: Arc<ClientRegistry>,
    /// Fan-out over `registry`.
    pub broadcaster: Broadcaster,
    /// Inbound envelope handling.
    pub dispatcher: Arc<Dispatcher>,
    /// Outbound queue capacity per connection.
    pub send_queue: usize,
}

impl SessionContext {
    /// Context over `registry` and `dispatcher`.
    pub fn new(registry: Arc<ClientRegistry>, dispatcher: Arc<Dispatcher>, send_queue: usize) -> Self {
        Self {
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            registry,
            dispatcher,
            send_queue,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, not yet in the registry.
    Connecting,
    /// In the registry, not yet announced.
    Registered,
    /// Announced and receiving.
    Active,
    /// Unregistered and departure announced. Terminal.
    Disconnected,
}

/// How long a finished session waits for its writer to flush and close.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// One participant's session.
pub struct Session {
    ctx: SessionContext,
    client: Option<Arc<Client>>,
    state: SessionState,
}

impl Session {
    /// A session for a freshly accepted transport, not yet registered.
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            client: None,
            state: SessionState::Connecting,
        }
    }

    /// Register `connection` and announce it: welcome to the newcomer,
    /// `joined` to everyone else.
    ///
    /// The welcome is queued before the client becomes visible to other
    /// sessions, so it is always the newcomer's first frame.
    pub fn join(&mut self, connection: Arc<ClientConnection>) -> Result<Arc<Client>, RegistryError> {
        if let Some(existing) = &self.client {
            return Err(RegistryError::AlreadyRegistered(existing.connection.id().clone()));
        }
        let broadcaster = &self.ctx.broadcaster;
        let client = self.ctx.registry.register_with(connection, |client, participants| {
            let _ = broadcaster.send_to(client, &welcome(client, participants));
        })?;
        self.client = Some(Arc::clone(&client));
        self.state = SessionState::Registered;

        let joined = Envelope::new(Kind::Info, format!("{} joined", client.display_name))
            .with_arg(client.id.to_string())
            .with_arg(client.display_name.clone());
        let _ = self.ctx.broadcaster.send_to_others(&client, &joined);
        self.state = SessionState::Active;
        info!(client_id = %client.id, name = %client.display_name, "client joined");
        Ok(client)
    }

    /// The registered client, until the session disconnects.
    pub fn client(&self) -> Option<&Arc<Client>> {
        self.client.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one inbound text frame.
    ///
    /// A malformed frame is returned as an error; the caller ends the session.
    /// Frames arriving outside `Active` are parsed and dropped.
    pub async fn receive(&mut self, text: &str) -> Result<(), EnvelopeError> {
        let envelope = Envelope::decode(text)?;
        let (SessionState::Active, Some(client)) = (self.state, self.client.clone()) else {
            debug!(state = ?self.state, kind = %envelope.kind, "frame outside active session dropped");
            return Ok(());
        };
        let outbound = self.ctx.dispatcher.dispatch(&client, envelope).await;
        self.deliver(&client, &outbound);
        Ok(())
    }

    fn deliver(&self, client: &Client, outbound: &[Outbound]) {
        for out in outbound {
            let delivery = self.ctx.broadcaster.deliver(client, out);
            if delivery.failed > 0 {
                debug!(
                    kind = %out.envelope.kind,
                    attempted = delivery.attempted,
                    failed = delivery.failed,
                    "partial delivery"
                );
            }
        }
    }

    /// Unregister and announce departure.
    pub fn leave(mut self) {
        self.depart();
    }

    fn depart(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let _ = self.ctx.registry.unregister(client.connection.id());
        let alone = self.ctx.registry.len() <= 1;
        let leave = Envelope::new(Kind::Leave, client.id.to_string()).with_arg(alone);
        let _ = self.ctx.broadcaster.send_to_others(&client, &leave);
        self.state = SessionState::Disconnected;
        info!(
            client_id = %client.id,
            alone,
            dropped_frames = client.connection.drop_count(),
            "client left"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.depart();
    }
}

/// `Welcome <name>` with `[id, name, participants]`.
fn welcome(client: &Client, participants: usize) -> Envelope {
    Envelope::new(Kind::Info, format!("Welcome {}", client.display_name))
        .with_arg(client.id.to_string())
        .with_arg(client.display_name.clone())
        .with_arg(participants)
}

/// Drive one upgraded WebSocket until the peer goes away.
///
/// A single writer task drains the connection's queue onto the socket and
/// sends periodic pings. The receive loop ends on Close, a transport error,
/// or a malformed envelope. Once the last handle to the connection is gone
/// the writer sends a Close frame and exits.
#[instrument(name = "session", skip_all, fields(client_id))]
pub async fn run_ws_session(ws: WebSocket, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (connection, mut send_rx) = ClientConnection::channel(ctx.send_queue);

    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut session = Session::new(ctx);
    debug!(state = ?session.state(), "connection accepted");
    let client = match session.join(connection) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to register connection");
            finish_writer(writer).await;
            return;
        }
    };
    let _ = tracing::Span::current().record("client_id", tracing::field::display(client.id));

    while let Some(frame) = ws_rx.next().await {
        let text = match frame {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    info!(len = data.len(), "non-UTF-8 binary frame, closing");
                    break;
                }
            },
            Ok(Message::Close(_)) => {
                debug!("client sent close frame");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                debug!(error = %e, "receive failed");
                break;
            }
        };

        if let Err(e) = session.receive(&text).await {
            info!(error = %e, "malformed envelope, closing");
            break;
        }
    }

    session.leave();
    drop(client);
    finish_writer(writer).await;
}

/// Wait for the writer to close the socket, aborting it after the grace period.
async fn finish_writer(mut writer: JoinHandle<()>) {
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        debug!("writer still busy after grace period, aborting");
        writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gopad_services::mock::{MockCompiler, MockFormatter, MockPublisher};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    fn context() -> SessionContext {
        let registry = Arc::new(ClientRegistry::new("U-"));
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::new(MockFormatter::ok("formatted")),
            Arc::new(MockCompiler::printing("out\n")),
            Arc::new(MockPublisher::ok("https://gist.github.com/x")),
        );
        SessionContext::new(registry, Arc::new(dispatcher), 16)
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(Envelope::decode(&frame).unwrap());
        }
        out
    }

    fn connect(ctx: &SessionContext) -> (Session, mpsc::Receiver<Arc<String>>) {
        let (conn, rx) = ClientConnection::channel(16);
        let mut session = Session::new(ctx.clone());
        let _ = session.join(conn).unwrap();
        (session, rx)
    }

    #[test]
    fn new_session_starts_connecting() {
        let session = Session::new(context());
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.client().is_none());
    }

    #[test]
    fn join_welcomes_newcomer_and_announces_to_others() {
        let ctx = context();
        let (first, mut rx1) = connect(&ctx);
        assert_eq!(first.state(), SessionState::Active);
        assert_eq!(
            drain(&mut rx1),
            vec![
                Envelope::new(Kind::Info, "Welcome U-01")
                    .with_arg("1")
                    .with_arg("U-01")
                    .with_arg(1)
            ]
        );

        let (_second, mut rx2) = connect(&ctx);
        let welcome = drain(&mut rx2);
        assert_eq!(welcome.len(), 1);
        assert_eq!(welcome[0].body, "Welcome U-02");
        assert_eq!(welcome[0].args[2], json!(2));
        assert_eq!(
            drain(&mut rx1),
            vec![Envelope::new(Kind::Info, "U-02 joined").with_arg("2").with_arg("U-02")]
        );
    }

    #[test]
    fn same_connection_cannot_join_twice() {
        let ctx = context();
        let (conn, _rx) = ClientConnection::channel(4);
        let mut first = Session::new(ctx.clone());
        let _ = first.join(Arc::clone(&conn)).unwrap();
        let mut second = Session::new(ctx.clone());
        assert!(matches!(
            second.join(conn),
            Err(RegistryError::AlreadyRegistered(_))
        ));
        assert_eq!(second.state(), SessionState::Connecting);

        let (other, _rx2) = ClientConnection::channel(4);
        assert!(matches!(
            first.join(other),
            Err(RegistryError::AlreadyRegistered(_))
        ));
        assert_eq!(ctx.registry.len(), 1);
    }

    #[test]
    fn leave_unregisters_and_notifies_others() {
        let ctx = context();
        let (first, _rx1) = connect(&ctx);
        let (second, mut rx2) = connect(&ctx);
        let (_third, mut rx3) = connect(&ctx);
        let _ = drain(&mut rx2);
        let _ = drain(&mut rx3);

        first.leave();
        assert_eq!(ctx.registry.len(), 2);
        assert_eq!(drain(&mut rx2), vec![Envelope::new(Kind::Leave, "1").with_arg(false)]);
        assert_eq!(drain(&mut rx3).len(), 1);

        second.leave();
        assert_eq!(drain(&mut rx3), vec![Envelope::new(Kind::Leave, "2").with_arg(true)]);
    }

    #[test]
    fn drop_unregisters_exactly_once() {
        let ctx = context();
        let (first, _rx1) = connect(&ctx);
        let (_second, mut rx2) = connect(&ctx);
        let _ = drain(&mut rx2);

        drop(first);
        assert_eq!(ctx.registry.len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[test]
    fn last_participant_leaving_sends_nothing() {
        let ctx = context();
        let (only, _rx) = connect(&ctx);
        only.leave();
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn receive_dispatches_and_delivers() {
        let ctx = context();
        let (mut first, mut rx1) = connect(&ctx);
        let (_second, mut rx2) = connect(&ctx);
        let _ = drain(&mut rx1);
        let _ = drain(&mut rx2);

        first.receive(r#"{"Kind":"format","Body":"src"}"#).await.unwrap();
        assert_eq!(drain(&mut rx1), vec![Envelope::new(Kind::Code, "formatted")]);
        assert_eq!(drain(&mut rx2), vec![Envelope::new(Kind::Code, "formatted")]);

        first.receive(r#"{"Kind":"update","Body":"patch"}"#).await.unwrap();
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(
            drain(&mut rx2),
            vec![Envelope::new(Kind::Update, "patch").with_arg("U-01")]
        );
    }

    #[tokio::test]
    async fn malformed_frame_is_an_error() {
        let ctx = context();
        let (mut session, _rx) = connect(&ctx);
        assert!(session.receive("not json").await.is_err());
        assert!(session.receive(r#"{"Kind":"shout","Body":"x"}"#).await.is_err());
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn welcome_is_first_frame_while_others_broadcast() {
        let ctx = context();
        let (chatter, _chatter_rx) = connect(&ctx);
        let sender = Arc::clone(chatter.client().unwrap());
        let stop = Arc::new(AtomicBool::new(false));
        let noise = {
            let broadcaster = ctx.broadcaster.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let _ = broadcaster.send_to_others(&sender, &Envelope::new(Kind::Chat, "noise"));
                }
            })
        };

        for _ in 0..2000 {
            let (session, mut rx) = connect(&ctx);
            let first = Envelope::decode(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(first.kind, Kind::Info);
            assert!(first.body.starts_with("Welcome "), "{}", first.body);
            session.leave();
        }

        stop.store(true, Ordering::Relaxed);
        noise.join().unwrap();
    }

    #[test]
    fn leave_moves_to_disconnected() {
        let ctx = context();
        let (mut session, _rx) = connect(&ctx);
        session.depart();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.client().is_none());
    }

    #[tokio::test]
    async fn frames_after_departure_are_dropped() {
        let ctx = context();
        let (mut gone, _rx) = connect(&ctx);
        let (_other, mut rx2) = connect(&ctx);
        gone.depart();
        let _ = drain(&mut rx2);
        gone.receive(r#"{"Kind":"chat","Body":"late"}"#).await.unwrap();
        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn outbound_only_kind_is_ignored() {
        let ctx = context();
        let (mut session, mut rx) = connect(&ctx);
        let _ = drain(&mut rx);
        session.receive(r#"{"Kind":"gist","Body":"x"}"#).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }
}
