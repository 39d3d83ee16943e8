//! Axum HTTP/WebSocket server: one router per listener, one shared hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::hub::MessageRouter;
use crate::hub::expiry::start_expiry_task;
use crate::metrics::RELAY_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionConfig, run_ws_session};

/// Shared state handed to Axum handlers on one listener.
#[derive(Clone)]
pub struct AppState {
    /// The shared hub.
    pub router: Arc<MessageRouter>,
    /// Name of the listener serving this state.
    pub origin: Arc<str>,
    /// Per-session limits.
    pub session: SessionConfig,
    /// Upgrade cap across all listeners.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Server start time for uptime.
    pub start_time: Instant,
    /// Stop signal.
    pub shutdown: CancellationToken,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// A bound listener.
#[derive(Clone, Debug)]
pub struct BoundListener {
    /// Listener name from the settings.
    pub name: String,
    /// Actual bound address (resolves port 0).
    pub addr: SocketAddr,
}

/// The relay server.
pub struct TetherServer {
    config: ServerConfig,
    router: Arc<MessageRouter>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics_handle: Option<PrometheusHandle>,
    start_time: Instant,
}

impl TetherServer {
    /// Create a server around an existing hub.
    pub fn new(config: ServerConfig, router: Arc<MessageRouter>) -> Self {
        Self {
            config,
            router,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics_handle: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// The shared hub.
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Build the Axum router for the listener named `origin`.
    pub fn build_router(&self, origin: &str) -> Router {
        let state = AppState {
            router: Arc::clone(&self.router),
            origin: Arc::from(origin),
            session: self.config.session(),
            max_connections: self.config.max_connections,
            max_message_size: self.config.max_message_size,
            start_time: self.start_time,
            shutdown: self.shutdown.token(),
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind every configured listener and start serving.
    ///
    /// Server tasks (and the expiry task, when a TTL is set) are tracked by
    /// the shutdown coordinator. Every listener is bound before any starts
    /// serving, so a bind failure leaves nothing running.
    pub async fn listen(&self) -> Result<Vec<BoundListener>, ServerError> {
        if self.config.listeners.is_empty() {
            return Err(ServerError::NoListeners);
        }

        let mut sockets = Vec::with_capacity(self.config.listeners.len());
        for listener in &self.config.listeners {
            let addr = listener.bind_addr();
            let bind_error = |source| ServerError::Bind {
                name: listener.name.clone(),
                addr: addr.clone(),
                source,
            };
            let socket = TcpListener::bind(&addr).await.map_err(bind_error)?;
            let local_addr = socket.local_addr().map_err(bind_error)?;
            sockets.push((listener.name.clone(), socket, local_addr));
        }

        let mut bound = Vec::with_capacity(sockets.len());
        for (name, socket, addr) in sockets {
            let app = self.build_router(&name);
            let token = self.shutdown.token();
            info!(listener = %name, %addr, "relay listener started");

            let task_name = name.clone();
            self.shutdown.track(tokio::spawn(async move {
                let serve = axum::serve(socket, app).with_graceful_shutdown(token.cancelled_owned());
                if let Err(e) = serve.await {
                    error!(listener = %task_name, error = %e, "listener failed");
                }
            }));
            bound.push(BoundListener { name, addr });
        }

        if let Some(ttl) = self.config.correlation_ttl {
            info!(ttl_secs = ttl.as_secs(), "pending request expiry enabled");
            self.shutdown.track(start_expiry_task(
                Arc::clone(&self.router),
                ttl,
                self.config.sweep_interval,
                self.shutdown.token(),
            ));
        }

        Ok(bound)
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    if state.router.connection_count() >= state.max_connections {
        counter!(RELAY_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        warn!(
            listener = %state.origin,
            max_connections = state.max_connections,
            "connection limit reached, refusing upgrade"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let AppState {
        router,
        origin,
        session,
        max_message_size,
        shutdown,
        ..
    } = state;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, origin, router, session, shutdown))
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.router.connection_count(),
        state.router.pending_requests(),
    ))
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics_handle {
        Some(handle) => crate::metrics::render(&handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
