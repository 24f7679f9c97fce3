//! `GopadServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::health::{self, HealthResponse};
use crate::registry::ClientRegistry;
use crate::session::{SessionContext, run_ws_session};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-session handles.
    pub sessions: SessionContext,
    /// When the server started.
    pub start_time: Instant,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
}

/// The relay server.
pub struct GopadServer {
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl GopadServer {
    /// Server over an injected registry and dispatcher.
    pub fn new(config: ServerConfig, registry: Arc<ClientRegistry>, dispatcher: Dispatcher) -> Self {
        let dispatcher = dispatcher.with_collaborator_timeout(config.collaborator_timeout);
        Self {
            config,
            registry,
            dispatcher: Arc::new(dispatcher),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            sessions: SessionContext::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.dispatcher),
                self.config.send_queue,
            ),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .nest_service("/static", self.static_service())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    fn static_service(&self) -> Router {
        let cache_control = format!("public, max-age={}", self.config.cache_max_age_secs());
        let cache_control = HeaderValue::from_str(&cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=86400"));
        let service = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                cache_control,
            ))
            .layer(CompressionLayer::new())
            .service(ServeDir::new(&self.config.static_dir));
        Router::new().fallback_service(service)
    }

    /// Bind and serve until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        info!(%addr, static_dir = %self.config.static_dir.display(), "listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Registry shared by every session.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /
async fn index_handler() -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/static/")]).into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, &state.sessions.registry))
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, state.sessions))
}
