//! Callback events and ordered listener dispatch.
//!
//! A verified callback fans out to every registered listener in the order the
//! listeners were registered at start-up.
//!
//! ```text
//!  ┌──────────────────┐  CallbackEvent   ┌──────────────────┐
//!  │ CallbackVerifier │ ───────────────▶ │ ListenerRegistry │
//!  │ (signhook-api)   │                  │ (ordered)        │
//!  └──────────────────┘                  └──────────────────┘
//!                                                 │ 1, 2, 3 ...
//!                                                 ▼
//!                                        ┌──────────────────┐
//!                                        │ CallbackListener │
//!                                        └──────────────────┘
//! ```
//!
//! The registry is owned by the verifier rather than held in a global table,
//! so tests build their own and nothing registered later can see an earlier
//! dispatch.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{CallbackError, ListenerError, Result};

/// Event type the provider sends when probing a newly configured callback URL.
pub const CALLBACK_TEST_EVENT: &str = "callback_test";

/// Event type sent once a signer has signed a request.
pub const SIGNATURE_REQUEST_SIGNED_EVENT: &str = "signature_request_signed";

/// A parsed inbound callback.
///
/// Constructed once per request and discarded after dispatch or rejection.
/// `event_hash` is whatever the sender claimed; it means nothing until the
/// verifier has checked it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEvent {
    event_type: String,
    event_time: i64,
    event_time_text: String,
    event_hash: String,
    signature_request_id: Option<String>,
    raw: Value,
}

impl CallbackEvent {
    /// Parses the value of the `json` form field.
    ///
    /// `event.event_type` is always required. Test pings need nothing else;
    /// every other event also needs `event.event_time`, `event.event_hash`
    /// and `signature_request.signature_request_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`CallbackError`] describing the first problem found.
    pub fn parse(json: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(json)?;
        Self::from_value(raw)
    }

    /// Builds an event from an already decoded payload.
    ///
    /// # Errors
    ///
    /// See [`CallbackEvent::parse`].
    pub fn from_value(raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(CallbackError::EmptyPayload);
        }

        let event_type = raw
            .pointer("/event/event_type")
            .and_then(Value::as_str)
            .ok_or(CallbackError::MissingField("event.event_type"))?
            .to_string();

        if event_type == CALLBACK_TEST_EVENT {
            // Probes are acknowledged without authentication, so whatever
            // they carry is kept only for logging.
            let (event_time, event_time_text) =
                raw.pointer("/event/event_time").and_then(|v| timestamp(v).ok()).unwrap_or_default();
            let event_hash = raw
                .pointer("/event/event_hash")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(Self {
                event_type,
                event_time,
                event_time_text,
                event_hash,
                signature_request_id: None,
                raw,
            });
        }

        let (event_time, event_time_text) = timestamp(
            raw.pointer("/event/event_time").ok_or(CallbackError::MissingField("event.event_time"))?,
        )?;

        let event_hash = raw
            .pointer("/event/event_hash")
            .and_then(Value::as_str)
            .ok_or(CallbackError::MissingField("event.event_hash"))?
            .to_string();

        let signature_request_id = raw
            .pointer("/signature_request/signature_request_id")
            .and_then(Value::as_str)
            .ok_or(CallbackError::MissingField("signature_request.signature_request_id"))?
            .to_string();

        Ok(Self {
            event_type,
            event_time,
            event_time_text,
            event_hash,
            signature_request_id: Some(signature_request_id),
            raw,
        })
    }

    /// Provider event type, e.g. `signature_request_signed`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Unix timestamp (seconds) asserted by the sender.
    pub fn event_time(&self) -> i64 {
        self.event_time
    }

    /// Timestamp exactly as it appears in the signed message.
    pub fn event_time_text(&self) -> &str {
        &self.event_time_text
    }

    /// Hex HMAC asserted by the sender.
    pub fn event_hash(&self) -> &str {
        &self.event_hash
    }

    /// Signature request the event concerns, absent for test pings.
    pub fn signature_request_id(&self) -> Option<&str> {
        self.signature_request_id.as_deref()
    }

    /// Whether this is the provider's connectivity probe.
    pub fn is_test_ping(&self) -> bool {
        self.event_type == CALLBACK_TEST_EVENT
    }

    /// The full decoded payload, including fields the verifier ignores.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Bytes covered by `event_hash`: the timestamp text followed by the
    /// event type.
    pub fn signed_message(&self) -> String {
        format!("{}{}", self.event_time_text, self.event_type)
    }
}

/// Reads `event.event_time`, which the provider sends either as a string or
/// as a bare integer.
fn timestamp(value: &Value) -> Result<(i64, String)> {
    match value {
        Value::String(text) => text
            .parse::<i64>()
            .map(|secs| (secs, text.clone()))
            .map_err(|_| CallbackError::InvalidTimestamp(text.clone())),
        Value::Number(number) => number
            .as_i64()
            .map(|secs| (secs, secs.to_string()))
            .ok_or_else(|| CallbackError::InvalidTimestamp(number.to_string())),
        _ => Err(CallbackError::MissingField("event.event_time")),
    }
}

/// Receives verified callbacks.
///
/// Listeners run inline with the request. Anything slow should be handed to a
/// queue owned by the listener instead of being awaited here.
#[async_trait::async_trait]
pub trait CallbackListener: Send + Sync + std::fmt::Debug {
    /// Name used in dispatch logs.
    fn name(&self) -> &str;

    /// Handles one verified event.
    ///
    /// Errors are logged by the registry and do not affect the response sent
    /// to the provider or the listeners that follow.
    async fn on_callback(&self, event: &CallbackEvent) -> std::result::Result<(), ListenerError>;
}

/// Outcome of fanning one event out to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

/// Append-only, ordered set of callback listeners.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn CallbackListener>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    /// Appends a listener. Invocation order is registration order.
    pub fn register(&mut self, listener: Arc<dyn CallbackListener>) {
        debug!(listener = listener.name(), position = self.listeners.len(), "listener registered");
        self.listeners.push(listener);
    }

    /// Builder form of [`ListenerRegistry::register`].
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn CallbackListener>) -> Self {
        self.register(listener);
        self
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invokes every listener once, sequentially, in registration order.
    ///
    /// A listener that errors or panics is logged and skipped; the remaining
    /// listeners still run.
    pub async fn dispatch(&self, event: &CallbackEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for listener in &self.listeners {
            let outcome = AssertUnwindSafe(listener.on_callback(event)).catch_unwind().await;

            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(
                        listener = listener.name(),
                        event_type = event.event_type(),
                        signature_request_id = event.signature_request_id().unwrap_or("none"),
                        error = %e,
                        "callback listener failed"
                    );
                },
                Err(_) => {
                    report.failed += 1;
                    error!(
                        listener = listener.name(),
                        event_type = event.event_type(),
                        signature_request_id = event.signature_request_id().unwrap_or("none"),
                        "callback listener panicked"
                    );
                },
            }
        }

        report
    }
}

/// Logs every signed signature request.
///
/// Registered by the service binary so a fresh deployment shows signing
/// activity in its logs without any custom listener.
#[derive(Debug, Default)]
pub struct SignedDocumentLogger;

impl SignedDocumentLogger {
    /// Creates the listener.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CallbackListener for SignedDocumentLogger {
    fn name(&self) -> &str {
        "signed-document-logger"
    }

    async fn on_callback(&self, event: &CallbackEvent) -> std::result::Result<(), ListenerError> {
        if event.event_type() == SIGNATURE_REQUEST_SIGNED_EVENT {
            info!(
                signature_request_id = event.signature_request_id().unwrap_or("unknown"),
                "signature request signed"
            );
        }
        Ok(())
    }
}
