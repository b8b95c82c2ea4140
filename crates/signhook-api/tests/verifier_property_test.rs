//! Property-based tests for the verification gates.
//!
//! Runs the verifier directly, without HTTP, over generated timestamps,
//! event types and hash mutations.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use proptest::{prelude::*, test_runner::Config as ProptestConfig};
use signhook_api::{CallbackVerifier, VerificationOutcome};
use signhook_core::ListenerRegistry;
use signhook_testing::{
    CallbackPayloadBuilder, StaticSecretResolver, TimeEncoding, TEST_API_KEY, TEST_EVENT_TIME,
};

/// Deterministic property test configuration for CI stability.
fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        fork: false,
        failure_persistence: None,
        source_file: None,
        ..ProptestConfig::default()
    }
}

fn verifier() -> CallbackVerifier {
    CallbackVerifier::new(Arc::new(StaticSecretResolver::new(TEST_API_KEY)), ListenerRegistry::new())
}

fn verify(json: &str, now: i64) -> VerificationOutcome {
    let verifier = verifier();
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(verifier.verify(Some(json), now))
}

fn hex_char(current: u8) -> impl Strategy<Value = u8> {
    prop::sample::select(b"0123456789abcdefABCDEF-z ".to_vec())
        .prop_filter("must change the character", move |c| *c != current)
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Acceptance depends only on age: inside the window (or in the future)
    /// passes, beyond it fails.
    #[test]
    fn window_decides_by_age(age in -200_000i64..200_000, integer_time in any::<bool>()) {
        let encoding = if integer_time { TimeEncoding::Integer } else { TimeEncoding::String };
        let payload = CallbackPayloadBuilder::new()
            .event_time(TEST_EVENT_TIME - age)
            .time_encoding(encoding)
            .build();

        let outcome = verify(&payload.json(), TEST_EVENT_TIME);
        if age > 86_400 {
            prop_assert_eq!(outcome, VerificationOutcome::RejectedStale);
        } else {
            prop_assert!(matches!(outcome, VerificationOutcome::Accepted(_)));
        }
    }

    /// Any event type verifies when hashed with the right key.
    #[test]
    fn any_event_type_verifies(event_type in "[a-z_]{1,40}") {
        prop_assume!(event_type != "callback_test");
        let payload = CallbackPayloadBuilder::new().event_type(event_type.clone()).build();

        match verify(&payload.json(), TEST_EVENT_TIME) {
            VerificationOutcome::Accepted(event) => prop_assert_eq!(event.event_type(), event_type.as_str()),
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }

    /// Changing any one character of the hash is always detected.
    #[test]
    fn single_character_mutation_rejected(
        (position, replacement) in (0usize..64).prop_flat_map(|i| {
            let hash = CallbackPayloadBuilder::new().build().event_hash().as_bytes()[i];
            (Just(i), hex_char(hash))
        })
    ) {
        let payload = CallbackPayloadBuilder::new().build();
        let mut hash = payload.event_hash().as_bytes().to_vec();
        hash[position] = replacement;
        let mutated = payload.with_event_hash(String::from_utf8(hash).unwrap());

        prop_assert_eq!(
            verify(&mutated.json(), TEST_EVENT_TIME),
            VerificationOutcome::RejectedBadSignature
        );
    }

    /// Hashes signed with any other key are rejected.
    #[test]
    fn foreign_key_rejected(key in "[ -~]{1,64}") {
        prop_assume!(key != TEST_API_KEY);
        let payload = CallbackPayloadBuilder::new().signed_with(key).build();

        prop_assert_eq!(
            verify(&payload.json(), TEST_EVENT_TIME),
            VerificationOutcome::RejectedBadSignature
        );
    }
}
