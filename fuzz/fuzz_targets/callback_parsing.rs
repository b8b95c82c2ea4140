#![no_main]

//! Fuzz target for callback payload handling.
//!
//! Feeds arbitrary `json` field values through parsing and the full
//! verification gates. Nothing may panic, and nothing unsigned may be
//! accepted.

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use signhook_api::{CallbackVerifier, VerificationOutcome};
use signhook_core::{CallbackEvent, ListenerRegistry, StaticSecretResolver};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(event) = CallbackEvent::parse(json) {
        let _ = event.signed_message();
    }

    let verifier = CallbackVerifier::new(
        Arc::new(StaticSecretResolver::new("fuzz-secret")),
        ListenerRegistry::new(),
    );
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };

    let outcome = runtime.block_on(verifier.verify(Some(json), 1_700_000_000));
    if let VerificationOutcome::Accepted(event) = outcome {
        // Only reachable with a correct HMAC under the fuzz secret.
        assert!(!event.event_hash().is_empty());
    }
});
