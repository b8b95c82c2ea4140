//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Handler execution
//!
//! # Graceful Shutdown
//!
//! On SIGTERM or CTRL+C the server stops accepting connections and waits for
//! in-flight callbacks (and their listener dispatch) to finish.

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{handlers, AppState};

/// Default path Dropbox Sign posts callbacks to.
pub const DEFAULT_CALLBACK_PATH: &str = "/dropbox-sign/callback";

/// Routing options taken from [`Config`](crate::Config).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Path the callback handler is mounted on.
    pub callback_path: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { callback_path: DEFAULT_CALLBACK_PATH.to_string(), request_timeout: Duration::from_secs(30) }
    }
}

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use signhook_api::{create_router, AppState, CallbackVerifier, RouterConfig};
/// use signhook_core::{ListenerRegistry, RealClock, StaticSecretResolver};
///
/// let verifier = CallbackVerifier::new(
///     Arc::new(StaticSecretResolver::new("api-key")),
///     ListenerRegistry::new(),
/// );
/// let state = AppState::new(Arc::new(verifier), Arc::new(RealClock::new()));
/// let app = create_router(state, &RouterConfig::default());
/// ```
pub fn create_router(state: AppState, config: &RouterConfig) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check));

    let callback_routes =
        Router::new().route(&config.callback_path, post(handlers::signature_callback));

    Router::new()
        .merge(health_routes)
        .merge(callback_routes)
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
async fn inject_request_id(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(
    state: AppState,
    config: &RouterConfig,
    addr: SocketAddr,
) -> Result<(), std::io::Error> {
    let app = create_router(state, config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!(callback_path = %config.callback_path, "HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Draining in-flight callbacks");
}
