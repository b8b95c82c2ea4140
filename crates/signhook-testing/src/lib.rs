//! Test infrastructure for signhook.
//!
//! Provides signed callback fixtures, recording and misbehaving listeners,
//! and a secret resolver that counts lookups.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod listeners;

pub use fixtures::{
    form_body, sign, CallbackPayload, CallbackPayloadBuilder, TimeEncoding, MULTIPART_BOUNDARY,
    TEST_API_KEY, TEST_EVENT_TIME,
};
pub use listeners::{
    call_log, CallLog, CountingSecretResolver, FailingListener, PanickingListener,
    RecordingListener, SlowListener,
};
pub use signhook_core::{Clock, StaticSecretResolver, TestClock};
