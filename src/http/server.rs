//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the secret handler
//! - Wire up middleware (request ID, tracing, Basic auth)
//! - Serve over self-signed TLS (axum-server) or plain HTTP
//! - Map bridge outcomes to HTTP responses

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::bridge::{Bridge, BridgeError, OutcomeKind, ResponseOutcome};
use crate::config::ResponseConfig;
use crate::http::auth::{require_basic_auth, ClientPassword};
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::observability::metrics;

/// How long in-flight requests get to finish on graceful shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Bridge,
    pub responses: ResponseConfig,
}

/// HTTP front end for the bridge.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server in front of `bridge`.
    pub fn new(bridge: Bridge, password: ClientPassword, responses: ResponseConfig) -> Self {
        let state = AppState { bridge, responses };
        Self {
            router: Self::build_router(state, password),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, password: ClientPassword) -> Router {
        Router::new()
            .route("/{name}", get(secret_handler))
            .route_layer(middleware::from_fn_with_state(password, require_basic_auth))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// The fully layered router, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Starting HTTP service");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP service stopped");
        Ok(())
    }

    /// Serve HTTPS on `listener` until `shutdown` fires.
    pub async fn run_tls(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Starting HTTPS service");

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS service stopped");
        Ok(())
    }
}

/// Looks up one secret in the legacy store.
async fn secret_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);

    let (label, status, body) = match state.bridge.fetch_secret(&name).await {
        Ok(outcome) => {
            match outcome.kind() {
                OutcomeKind::Empty => {
                    tracing::warn!(request_id = %request_id, peer = %peer, name = %name, "Got nothing")
                }
                OutcomeKind::Single => {
                    tracing::info!(request_id = %request_id, peer = %peer, name = %name, "Retrieved password")
                }
                OutcomeKind::Ambiguous => tracing::warn!(
                    request_id = %request_id,
                    peer = %peer,
                    name = %name,
                    lines = outcome.lines().len(),
                    "Ambiguous reply"
                ),
            }
            let (status, body) = outcome_response(&outcome, state.responses.expose_ambiguous);
            (outcome.kind().as_str(), status, body)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, peer = %peer, name = %name, error = %e, "Query failed");
            let (status, body) = error_response(&e);
            ("error", status, body)
        }
    };

    metrics::record_request(label, status.as_u16(), start);
    (status, body).into_response()
}

/// Map a classified reply to a status and body.
pub fn outcome_response(outcome: &ResponseOutcome, expose_ambiguous: bool) -> (StatusCode, String) {
    match outcome.kind() {
        OutcomeKind::Empty => (StatusCode::INTERNAL_SERVER_ERROR, "Got nothing\n".to_string()),
        OutcomeKind::Single => (
            StatusCode::OK,
            outcome.secret().unwrap_or_default().to_string(),
        ),
        OutcomeKind::Ambiguous if expose_ambiguous => (StatusCode::BAD_REQUEST, outcome.joined()),
        OutcomeKind::Ambiguous => (
            StatusCode::BAD_REQUEST,
            format!("Ambiguous result: {} lines\n", outcome.lines().len()),
        ),
    }
}

/// Map a bridge failure to a status and body.
pub fn error_response(error: &BridgeError) -> (StatusCode, String) {
    let status = match error {
        BridgeError::EmptyName | BridgeError::InvalidName => StatusCode::BAD_REQUEST,
        BridgeError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::DrainTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BridgeError::Fatal(_) | BridgeError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, format!("Error: {}\n", error))
}
