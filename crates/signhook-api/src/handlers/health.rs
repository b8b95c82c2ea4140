//! Health check handlers for service monitoring.
//!
//! `/health` reports whether callbacks can currently be authenticated (a
//! usable secret is configured); `/live` only shows the process is serving.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use signhook_core::Clock;
use tracing::{debug, instrument, warn};

use crate::{AppState, CallbackVerifier};

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Callbacks can be verified.
    Healthy,
    /// Serving, but signed callbacks will be rejected.
    Degraded,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Whether the callback secret resolves.
    pub secret: ComponentHealth,
    /// Number of registered callback listeners.
    pub listeners: usize,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional message if the component is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is unavailable
    Down,
}

/// Health service that encapsulates the clock for testable health checks.
pub struct HealthService {
    clock: Arc<dyn Clock>,
}

impl HealthService {
    /// Creates a new health service with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Checks that the callback secret can be resolved.
    pub async fn health_check(&self, verifier: &CallbackVerifier) -> HealthResponse {
        debug!("Performing health check");

        let timestamp = DateTime::<Utc>::from(self.clock.now_system());
        let start_time = self.clock.now();

        let secret_available = verifier.secret_available().await;
        let duration = start_time.elapsed();

        let secret = if secret_available {
            ComponentHealth {
                status: ComponentStatus::Up,
                message: None,
                response_time_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            warn!("No callback secret configured; signed callbacks will be rejected");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some("no API secret configured".to_string()),
                response_time_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            }
        };

        let status = match secret.status {
            ComponentStatus::Up => HealthStatus::Healthy,
            ComponentStatus::Down => HealthStatus::Degraded,
        };

        HealthResponse {
            status,
            timestamp,
            checks: HealthChecks { secret, listeners: verifier.listener_count() },
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check endpoint handler.
///
/// Degraded still answers 200: test pings keep working without a secret and
/// the process should not be restarted over configuration.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Response {
    let health_service = HealthService::new(app_state.clock.clone());
    let response = health_service.health_check(&app_state.verifier).await;

    debug!(
        status = ?response.status,
        secret_status = ?response.checks.secret.status,
        "Health check completed"
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Liveness check endpoint.
#[instrument(name = "liveness_check", skip(app_state))]
pub async fn liveness_check(State(app_state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(app_state.clock.now_system()),
        "service": "signhook"
    });

    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use signhook_core::{ListenerRegistry, StaticSecretResolver, TestClock};

    use super::*;

    #[tokio::test]
    async fn healthy_with_secret() {
        let verifier =
            CallbackVerifier::new(Arc::new(StaticSecretResolver::new("k")), ListenerRegistry::new());
        let service = HealthService::new(Arc::new(TestClock::at_unix(1_700_000_000)));

        let response = service.health_check(&verifier).await;
        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.checks.secret.status, ComponentStatus::Up);
        assert_eq!(response.timestamp.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn degraded_without_secret() {
        let verifier =
            CallbackVerifier::new(Arc::new(StaticSecretResolver::unset()), ListenerRegistry::new());
        let service = HealthService::new(Arc::new(TestClock::new()));

        let response = service.health_check(&verifier).await;
        assert_eq!(response.status, HealthStatus::Degraded);
        assert!(response.checks.secret.message.is_some());
    }
}
