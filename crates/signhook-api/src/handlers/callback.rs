//! Dropbox Sign callback endpoint.
//!
//! The provider posts the event document as a form field named `json`, as
//! either `application/x-www-form-urlencoded` or `multipart/form-data`. Any
//! body the field cannot be read from is treated the same as a missing field.

use std::collections::HashMap;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Form,
};
use tracing::{debug, instrument};

use crate::AppState;

/// Form field carrying the event document.
pub const JSON_FIELD: &str = "json";

/// Handles a signature callback made by Dropbox Sign.
///
/// Responds `200 Dropbox Sign API Event Received` for verified events and
/// connectivity probes, and a bare `403` for everything else.
#[instrument(
    name = "signature_callback",
    skip_all,
    fields(content_type = request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("none"))
)]
pub async fn signature_callback(State(state): State<AppState>, request: Request) -> Response {
    let json_field = extract_json_field(request).await;
    let now = state.clock.now_unix();

    debug!(has_payload = json_field.is_some(), "callback body read");

    state.verifier.handle(json_field.as_deref(), now).await.into_response()
}

/// Reads the `json` field from a urlencoded or multipart body.
async fn extract_json_field(request: Request) -> Option<String> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &()).await.ok()?;
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some(JSON_FIELD) {
                return field.text().await.ok();
            }
        }
        None
    } else {
        let Form(mut fields) =
            Form::<HashMap<String, String>>::from_request(request, &()).await.ok()?;
        fields.remove(JSON_FIELD)
    }
}
