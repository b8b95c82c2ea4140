//! Core domain types for Dropbox Sign callback handling.
//!
//! Provides the parsed callback event, the secret resolution capability used
//! to authenticate callbacks, and the ordered listener registry that verified
//! events fan out to. The HTTP surface and the verifier itself live in
//! `signhook-api`; everything here is transport-agnostic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod secret;
pub mod time;

pub use error::{CallbackError, ListenerError, Result, SecretError};
pub use events::{
    CallbackEvent, CallbackListener, DispatchReport, ListenerRegistry, SignedDocumentLogger,
    CALLBACK_TEST_EVENT, SIGNATURE_REQUEST_SIGNED_EVENT,
};
pub use secret::{
    open_secret, seal_secret, SealedSecretResolver, SecretBytes, SecretResolver,
    StaticSecretResolver, MASTER_KEY_LEN,
};
pub use time::{Clock, RealClock, TestClock};
