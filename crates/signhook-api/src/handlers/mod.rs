//! HTTP request handlers.
//!
//! - `callback` - Dropbox Sign event callbacks
//! - `health` - liveness and health probes
//!
//! Callback rejections never explain themselves in the response; the reason
//! is only in the server log.

pub mod callback;
pub mod health;

pub use callback::signature_callback;
pub use health::{health_check, liveness_check};
