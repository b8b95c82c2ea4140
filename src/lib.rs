//! Dropbox Sign callback service.
//!
//! Wires configuration into the verifier, listener registry and signature
//! request client. The binary in `main.rs` adds tracing, the server loop and
//! the `seal` command operators use to produce sealed credentials.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::{Context, Result};
pub use signhook_api::Config;
use signhook_api::{AppState, CallbackVerifier};
use signhook_client::DropboxSignClient;
use signhook_core::{seal_secret, Clock, ListenerRegistry, SignedDocumentLogger};

/// Listeners every deployment runs.
pub fn default_listeners() -> ListenerRegistry {
    ListenerRegistry::new().with_listener(Arc::new(SignedDocumentLogger::new()))
}

/// Builds handler state from configuration.
///
/// # Errors
///
/// Fails when the master key is malformed.
pub fn build_state(
    config: &Config,
    listeners: ListenerRegistry,
    clock: Arc<dyn Clock>,
) -> Result<AppState> {
    let resolver = config.api_key_resolver().context("Failed to load API key")?;
    let verifier =
        CallbackVerifier::new(resolver, listeners).with_replay_window(config.replay_window_seconds);

    Ok(AppState::new(Arc::new(verifier), clock))
}

/// Builds the signature request client with the sealed credentials.
///
/// # Errors
///
/// Fails when no API key is configured or the credentials cannot be opened.
pub async fn build_client(config: &Config) -> Result<DropboxSignClient> {
    let api_key = config.api_key_resolver()?;
    let client_id = config.client_id_resolver()?;

    DropboxSignClient::from_resolvers(config.to_client_config(), api_key.as_ref(), client_id.as_ref())
        .await
        .context("Failed to create Dropbox Sign client")
}

/// Seals a plaintext credential with the configured master key.
///
/// The result is the value to store in `api_key` or `client_id`. Trailing
/// line endings from piped input are not part of the secret.
///
/// # Errors
///
/// Fails when no `encryption_key` is configured or the secret is empty.
pub fn seal_credential(config: &Config, plaintext: &str) -> Result<String> {
    let key = config
        .master_key()?
        .context("encryption_key (SIGNHOOK_ENCRYPTION_KEY) must be set to seal secrets")?;

    let plaintext = plaintext.trim_end_matches(['\r', '\n']);
    if plaintext.is_empty() {
        anyhow::bail!("refusing to seal an empty secret");
    }

    seal_secret(&key, plaintext.as_bytes()).context("Failed to seal secret")
}
