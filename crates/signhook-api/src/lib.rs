//! HTTP surface for Dropbox Sign callbacks.
//!
//! Exposes the [`CallbackVerifier`] that authenticates and dispatches
//! callbacks, the Axum router around it, and the service configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use signhook_core::Clock;

pub mod config;
pub mod crypto;
pub mod handlers;
pub mod server;
pub mod verifier;

pub use config::Config;
pub use server::{create_router, start_server, RouterConfig};
pub use verifier::{
    CallbackResponse, CallbackVerifier, VerificationOutcome, ACKNOWLEDGEMENT_BODY,
    DEFAULT_REPLAY_WINDOW_SECS,
};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Verifier and listener registry.
    pub verifier: Arc<CallbackVerifier>,
    /// Time source for the replay window and health timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates application state.
    pub fn new(verifier: Arc<CallbackVerifier>, clock: Arc<dyn Clock>) -> Self {
        Self { verifier, clock }
    }
}
