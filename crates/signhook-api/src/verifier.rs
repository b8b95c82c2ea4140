//! Callback verification and dispatch.
//!
//! Every inbound callback passes through the same gates, in order:
//!
//! 1. the `json` field must be present
//! 2. it must parse into a [`CallbackEvent`]
//! 3. `callback_test` probes are acknowledged immediately
//! 4. the event timestamp must fall inside the replay window
//! 5. `event_hash` must match the HMAC of the timestamp and event type
//!
//! Events that clear all five are handed to the listener registry. Rejections
//! are logged with enough context to investigate (never the hash or secret)
//! and answered with a bare 403, which makes the provider retry.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use signhook_core::{CallbackError, CallbackEvent, ListenerRegistry, SecretResolver};
use tracing::{debug, error, info};

use crate::crypto::{verify_event_hash, SignatureError};

/// Body the provider requires in response to every accepted callback,
/// including its connectivity probe.
pub const ACKNOWLEDGEMENT_BODY: &str = "Dropbox Sign API Event Received";

/// Maximum accepted event age. The provider retries failed deliveries for
/// roughly 20 hours.
pub const DEFAULT_REPLAY_WINDOW_SECS: i64 = 86_400;

/// Result of running the verification gates on one request.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// Authenticated event, ready for dispatch.
    Accepted(CallbackEvent),
    /// Provider connectivity probe.
    TestPing,
    /// No payload, or a payload that did not parse.
    RejectedMalformed,
    /// Timestamp older than the replay window.
    RejectedStale,
    /// Hash mismatch or no secret configured.
    RejectedBadSignature,
}

impl VerificationOutcome {
    /// Whether the provider should receive the acknowledgement.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted(_) | Self::TestPing)
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::TestPing => "test_ping",
            Self::RejectedMalformed => "malformed",
            Self::RejectedStale => "stale",
            Self::RejectedBadSignature => "bad_signature",
        }
    }

    /// HTTP response for this outcome.
    pub fn response(&self) -> CallbackResponse {
        if self.is_success() {
            CallbackResponse::acknowledged()
        } else {
            CallbackResponse::denied()
        }
    }
}

/// Status and body returned to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Plain-text body, present only on success.
    pub body: Option<&'static str>,
}

impl CallbackResponse {
    /// 200 with the acknowledgement body.
    pub const fn acknowledged() -> Self {
        Self { status: StatusCode::OK, body: Some(ACKNOWLEDGEMENT_BODY) }
    }

    /// 403 with no body.
    pub const fn denied() -> Self {
        Self { status: StatusCode::FORBIDDEN, body: None }
    }
}

impl IntoResponse for CallbackResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => {
                (self.status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
                    .into_response()
            },
            None => self.status.into_response(),
        }
    }
}

/// Verifies callbacks and fans accepted events out to listeners.
///
/// Holds no per-request state; one instance serves all requests concurrently.
#[derive(Debug)]
pub struct CallbackVerifier {
    secret_resolver: Arc<dyn SecretResolver>,
    listeners: ListenerRegistry,
    replay_window_secs: i64,
}

impl CallbackVerifier {
    /// Creates a verifier with the default 24 hour replay window.
    pub fn new(secret_resolver: Arc<dyn SecretResolver>, listeners: ListenerRegistry) -> Self {
        Self { secret_resolver, listeners, replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS }
    }

    /// Overrides the replay window.
    #[must_use]
    pub fn with_replay_window(mut self, secs: i64) -> Self {
        self.replay_window_secs = secs;
        self
    }

    /// Returns the configured replay window in seconds.
    pub fn replay_window_secs(&self) -> i64 {
        self.replay_window_secs
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the secret resolver currently yields a usable secret.
    pub async fn secret_available(&self) -> bool {
        self.secret_resolver.resolve_secret().await.is_some()
    }

    /// Handles one callback end to end: verify, dispatch, respond.
    ///
    /// `json_field` is the raw value of the `json` form field, if any;
    /// `now_unix` is the request time in unix seconds.
    pub async fn handle(&self, json_field: Option<&str>, now_unix: i64) -> CallbackResponse {
        let outcome = self.verify(json_field, now_unix).await;

        if let VerificationOutcome::Accepted(event) = &outcome {
            let report = self.listeners.dispatch(event).await;
            debug!(
                signature_request_id = event.signature_request_id().unwrap_or("none"),
                delivered = report.delivered,
                failed = report.failed,
                "callback dispatched"
            );
        }

        outcome.response()
    }

    /// Runs the verification gates without dispatching.
    pub async fn verify(&self, json_field: Option<&str>, now_unix: i64) -> VerificationOutcome {
        let event = match json_field.ok_or(CallbackError::MissingPayload).and_then(CallbackEvent::parse)
        {
            Ok(event) => event,
            Err(CallbackError::MissingPayload) => {
                error!(code = "E1001", "Dropbox Sign callback failed because no POST data was supplied");
                return VerificationOutcome::RejectedMalformed;
            },
            Err(e) => {
                error!(
                    code = e.code(),
                    error = %e,
                    "Dropbox Sign callback failed because the supplied POST data could not be parsed"
                );
                return VerificationOutcome::RejectedMalformed;
            },
        };

        if event.is_test_ping() {
            info!("Dropbox Sign callback test received");
            return VerificationOutcome::TestPing;
        }

        let signature_request_id = event.signature_request_id().unwrap_or("unknown");

        // Future timestamps have a negative age and always pass.
        let age = now_unix.saturating_sub(event.event_time());
        if age > self.replay_window_secs {
            error!(
                signature_request_id,
                event_time = event.event_time(),
                age_secs = age,
                replay_window_secs = self.replay_window_secs,
                "Dropbox Sign callback failed timestamp verification"
            );
            return VerificationOutcome::RejectedStale;
        }

        // Resolved per request so a rotated key applies immediately.
        let secret = self.secret_resolver.resolve_secret().await;
        let verified = match secret.as_deref() {
            Some(secret) => {
                verify_event_hash(event.signed_message().as_bytes(), event.event_hash(), secret)
            },
            None => Err(SignatureError::MissingSecret),
        };

        if let Err(e) = verified {
            error!(
                signature_request_id,
                reason = %e,
                "Dropbox Sign callback failed hash verification"
            );
            return VerificationOutcome::RejectedBadSignature;
        }

        info!(
            signature_request_id,
            event_type = event.event_type(),
            "Dropbox Sign callback received"
        );
        VerificationOutcome::Accepted(event)
    }
}

#[cfg(test)]
mod tests {
    use signhook_core::StaticSecretResolver;

    use super::*;
    use crate::crypto::generate_event_hash;

    const NOW: i64 = 1_700_000_000;

    fn verifier(secret: Option<&str>) -> CallbackVerifier {
        let resolver = match secret {
            Some(s) => StaticSecretResolver::new(s),
            None => StaticSecretResolver::unset(),
        };
        CallbackVerifier::new(Arc::new(resolver), ListenerRegistry::new())
    }

    fn signed_json(secret: &str, event_time: i64) -> String {
        let hash = generate_event_hash(
            format!("{event_time}signature_request_signed").as_bytes(),
            secret.as_bytes(),
        )
        .unwrap();
        serde_json::json!({
            "event": {
                "event_type": "signature_request_signed",
                "event_time": event_time.to_string(),
                "event_hash": hash,
            },
            "signature_request": { "signature_request_id": "sr_1" }
        })
        .to_string()
    }

    #[tokio::test]
    async fn accepts_fresh_signed_event() {
        let outcome = verifier(Some("k")).verify(Some(&signed_json("k", NOW)), NOW).await;
        assert!(matches!(outcome, VerificationOutcome::Accepted(ref e) if e.signature_request_id() == Some("sr_1")));
    }

    #[tokio::test]
    async fn missing_payload_is_malformed() {
        assert_eq!(verifier(Some("k")).verify(None, NOW).await, VerificationOutcome::RejectedMalformed);
    }

    #[tokio::test]
    async fn replay_window_override_applies() {
        let v = verifier(Some("k")).with_replay_window(60);
        assert_eq!(v.replay_window_secs(), 60);
        assert_eq!(
            v.verify(Some(&signed_json("k", NOW - 61)), NOW).await,
            VerificationOutcome::RejectedStale
        );
        assert!(v.verify(Some(&signed_json("k", NOW - 60)), NOW).await.is_success());
    }

    #[test]
    fn outcome_responses() {
        assert_eq!(VerificationOutcome::TestPing.response(), CallbackResponse::acknowledged());
        assert_eq!(VerificationOutcome::RejectedStale.response(), CallbackResponse::denied());
        assert_eq!(VerificationOutcome::RejectedBadSignature.label(), "bad_signature");
        assert_eq!(CallbackResponse::denied().body, None);
    }

    #[test]
    fn acknowledgement_is_exact() {
        assert_eq!(ACKNOWLEDGEMENT_BODY, "Dropbox Sign API Event Received");
    }
}
