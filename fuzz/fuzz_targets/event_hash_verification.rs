#![no_main]

//! Fuzz target for event hash verification.
//!
//! Arbitrary secrets, messages and claimed hashes must never panic, and a
//! claimed hash equal to the computed one must always verify.

use libfuzzer_sys::fuzz_target;
use signhook_api::crypto::{generate_event_hash, verify_event_hash};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = usize::from(data[0]) % data.len();
    let (secret, message) = data[1..].split_at(split.min(data.len() - 1));
    let claimed = String::from_utf8_lossy(message);

    let _ = verify_event_hash(message, &claimed, secret);

    if let Ok(expected) = generate_event_hash(message, secret) {
        assert!(verify_event_hash(message, &expected, secret).is_ok());
    }
});
