//! Error types for Dropbox Sign API calls.
//!
//! Provider-side failures keep the provider's own error name and message so
//! they can be logged and surfaced to operators without re-reading the body.

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while talking to the Dropbox Sign API.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// No API key resolved; the client refuses to connect.
    #[error("could not connect to Dropbox Sign because no API key has been set")]
    MissingApiKey,

    /// Embedded requests need an API app client id.
    #[error("a client id must be set in order to create embedded signature requests")]
    MissingClientId,

    /// A resolved credential was not valid UTF-8.
    #[error("{credential} is not valid UTF-8")]
    InvalidCredential {
        /// Which credential failed to decode
        credential: &'static str,
    },

    /// A signature id that would not address a single signature.
    #[error("invalid signature id {signature_id:?}")]
    InvalidSignatureId {
        /// The rejected id
        signature_id: String,
    },

    /// The document to be signed could not be read.
    #[error("failed to read document {path}: {message}")]
    File {
        /// Path that was attempted
        path: String,
        /// I/O error message
        message: String,
    },

    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// The API answered with a non-success status.
    #[error("Dropbox Sign API error (HTTP {status}) {name}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error name, e.g. `bad_request`
        name: String,
        /// Provider error message
        message: String,
    },

    /// A success response did not have the expected shape.
    #[error("unexpected response body: {message}")]
    Decode {
        /// Decoder error message
        message: String,
    },

    /// The HTTP client could not be built.
    #[error("invalid client configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl ClientError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates an API error from the provider's error body.
    pub fn api(status: u16, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api { status, name: name.into(), message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Transport failures, rate limits and 5xx responses are retryable.
    /// Missing credentials, unreadable files and 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MissingApiKey
            | Self::MissingClientId
            | Self::InvalidCredential { .. }
            | Self::InvalidSignatureId { .. }
            | Self::File { .. }
            | Self::Decode { .. }
            | Self::Configuration { .. } => false,
        }
    }
}
