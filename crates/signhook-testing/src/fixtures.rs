//! Callback payload builders.
//!
//! Produces provider-shaped event documents, signed the way Dropbox Sign
//! signs them, plus the form bodies they arrive in.

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

/// Default API key used to sign fixtures.
pub const TEST_API_KEY: &str = "test-api-key-0123456789abcdef";

/// Default event time (2023-11-14T22:13:20Z).
pub const TEST_EVENT_TIME: i64 = 1_700_000_000;

/// Multipart boundary used by [`CallbackPayload::multipart_body`].
pub const MULTIPART_BOUNDARY: &str = "signhook-test-boundary";

/// Computes `hex(HMAC_SHA256(key, message))`.
pub fn sign(key: &str, message: &str) -> String {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length")
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// How `event_time` is written into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEncoding {
    /// `"1700000000"`, as the provider sends it.
    String,
    /// `1700000000`.
    Integer,
}

/// Builder for callback event documents.
#[derive(Debug, Clone)]
pub struct CallbackPayloadBuilder {
    event_type: String,
    event_time: i64,
    time_encoding: TimeEncoding,
    signing_key: String,
    hash_override: Option<String>,
    signature_request_id: Option<String>,
}

impl CallbackPayloadBuilder {
    /// A `signature_request_signed` event at [`TEST_EVENT_TIME`] signed with
    /// [`TEST_API_KEY`].
    pub fn new() -> Self {
        Self {
            event_type: "signature_request_signed".to_string(),
            event_time: TEST_EVENT_TIME,
            time_encoding: TimeEncoding::String,
            signing_key: TEST_API_KEY.to_string(),
            hash_override: None,
            signature_request_id: Some("fa5c8a0b0f492d768749333ad6fcc214c111e967".to_string()),
        }
    }

    /// A `callback_test` probe.
    pub fn test_ping() -> Self {
        Self::new().event_type("callback_test").without_signature_request()
    }

    /// Sets the event type.
    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Sets the event time in unix seconds.
    #[must_use]
    pub fn event_time(mut self, secs: i64) -> Self {
        self.event_time = secs;
        self
    }

    /// Sets how the event time is encoded.
    #[must_use]
    pub fn time_encoding(mut self, encoding: TimeEncoding) -> Self {
        self.time_encoding = encoding;
        self
    }

    /// Signs with a different key.
    #[must_use]
    pub fn signed_with(mut self, key: impl Into<String>) -> Self {
        self.signing_key = key.into();
        self
    }

    /// Uses a literal hash instead of computing one.
    #[must_use]
    pub fn event_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash_override = Some(hash.into());
        self
    }

    /// Sets the signature request id.
    #[must_use]
    pub fn signature_request_id(mut self, id: impl Into<String>) -> Self {
        self.signature_request_id = Some(id.into());
        self
    }

    /// Omits the `signature_request` object.
    #[must_use]
    pub fn without_signature_request(mut self) -> Self {
        self.signature_request_id = None;
        self
    }

    /// Builds the payload.
    pub fn build(self) -> CallbackPayload {
        let time_text = self.event_time.to_string();
        let hash = self
            .hash_override
            .unwrap_or_else(|| sign(&self.signing_key, &format!("{time_text}{}", self.event_type)));

        let event_time = match self.time_encoding {
            TimeEncoding::String => Value::String(time_text),
            TimeEncoding::Integer => json!(self.event_time),
        };

        let mut document = json!({
            "event": {
                "event_type": self.event_type,
                "event_time": event_time,
                "event_hash": hash,
                "event_metadata": {
                    "related_signature_id": "78caf2a1d01cd39cea2bc1cbb340dac3",
                    "reported_for_account_id": "63522885f9261e2b04eea043933ee7313eb674fd"
                }
            }
        });

        if let Some(id) = self.signature_request_id {
            document["signature_request"] = json!({
                "signature_request_id": id,
                "title": "NDA with Acme Co.",
                "is_complete": true,
                "signatures": [{
                    "signature_id": "78caf2a1d01cd39cea2bc1cbb340dac3",
                    "signer_email_address": "jack@example.com",
                    "status_code": "signed"
                }]
            });
        }

        CallbackPayload { document }
    }
}

impl Default for CallbackPayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built callback document.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackPayload {
    /// The event document.
    pub document: Value,
}

impl CallbackPayload {
    /// The document as the `json` field value.
    pub fn json(&self) -> String {
        self.document.to_string()
    }

    /// The claimed `event_hash`.
    pub fn event_hash(&self) -> &str {
        self.document["event"]["event_hash"].as_str().unwrap_or_default()
    }

    /// Replaces the claimed `event_hash`.
    #[must_use]
    pub fn with_event_hash(mut self, hash: impl Into<String>) -> Self {
        self.document["event"]["event_hash"] = Value::String(hash.into());
        self
    }

    /// `application/x-www-form-urlencoded` body with the document in `json`.
    pub fn form_body(&self) -> String {
        form_body(&self.json())
    }

    /// `multipart/form-data` body using [`MULTIPART_BOUNDARY`].
    pub fn multipart_body(&self) -> String {
        format!(
            "--{MULTIPART_BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"json\"\r\n\r\n\
             {}\r\n\
             --{MULTIPART_BOUNDARY}--\r\n",
            self.json()
        )
    }
}

/// Urlencoded body carrying `value` in the `json` field.
pub fn form_body(value: &str) -> String {
    format!("json={}", urlencoding::encode(value))
}

#[cfg(test)]
mod tests {
    use signhook_core::CallbackEvent;

    use super::*;

    #[test]
    fn sign_matches_reference_vector() {
        assert_eq!(
            sign("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn built_payload_parses() {
        let payload = CallbackPayloadBuilder::new().event_time(42).build();
        let event = CallbackEvent::parse(&payload.json()).unwrap();

        assert_eq!(event.event_time(), 42);
        assert_eq!(event.event_hash(), sign(TEST_API_KEY, "42signature_request_signed"));
        assert_eq!(event.signature_request_id(), Some("fa5c8a0b0f492d768749333ad6fcc214c111e967"));
    }

    #[test]
    fn integer_time_encoding() {
        let payload = CallbackPayloadBuilder::new().time_encoding(TimeEncoding::Integer).build();
        assert!(payload.document["event"]["event_time"].is_i64());
    }

    #[test]
    fn test_ping_has_no_signature_request() {
        let payload = CallbackPayloadBuilder::test_ping().build();
        assert_eq!(payload.document["event"]["event_type"], "callback_test");
        assert!(payload.document.get("signature_request").is_none());
    }

    #[test]
    fn form_body_is_encoded() {
        assert_eq!(form_body(r#"{"a":1}"#), "json=%7B%22a%22%3A1%7D");
    }
}
