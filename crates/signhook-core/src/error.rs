//! Error types for callback parsing, secret handling, and listener dispatch.
//!
//! Parsing failures carry codes so operators can correlate log lines without
//! the response body ever revealing why a callback was refused.

use thiserror::Error;

/// Result type alias using `CallbackError`.
pub type Result<T> = std::result::Result<T, CallbackError>;

/// Reasons an inbound callback payload could not be turned into an event.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The request carried no `json` field (E1001).
    #[error("[E1001] Missing payload: no json field supplied")]
    MissingPayload,

    /// The `json` field was not valid JSON (E1002).
    #[error("[E1002] Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The payload decoded to `null` or a non-object root (E1003).
    #[error("[E1003] Empty payload: decoded document is not a JSON object")]
    EmptyPayload,

    /// A required field was absent or had the wrong type (E1004).
    #[error("[E1004] Missing field: {0}")]
    MissingField(&'static str),

    /// `event.event_time` was present but not an integer timestamp (E1005).
    #[error("[E1005] Invalid timestamp: {0:?} is not a unix timestamp")]
    InvalidTimestamp(String),
}

impl CallbackError {
    /// Returns the error code (E1001-E1005).
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingPayload => "E1001",
            Self::InvalidJson(_) => "E1002",
            Self::EmptyPayload => "E1003",
            Self::MissingField(_) => "E1004",
            Self::InvalidTimestamp(_) => "E1005",
        }
    }
}

/// Failures sealing or opening an at-rest secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Master key has the wrong length.
    #[error("invalid master key: expected {expected} bytes, got {actual}")]
    InvalidKey {
        /// Required key length.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// Sealed value was not valid base64 or too short to hold a nonce.
    #[error("malformed sealed secret: {0}")]
    Malformed(String),

    /// AEAD encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// AEAD decryption failed (wrong key or tampered ciphertext).
    #[error("decryption failed")]
    Decryption,
}

/// Error returned by a callback listener.
///
/// Dispatch logs these and moves on to the next listener; they never reach
/// the provider.
#[derive(Debug, Error)]
#[error("listener {listener} failed: {message}")]
pub struct ListenerError {
    /// Name of the listener that failed.
    pub listener: String,
    /// Failure description.
    pub message: String,
}

impl ListenerError {
    /// Creates a listener error.
    pub fn new(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self { listener: listener.into(), message: message.into() }
    }
}
