//! HTTP client for the Dropbox Sign signature request API.
//!
//! Handles request construction, credential handling, and mapping of
//! provider error bodies into [`ClientError`].

use std::{path::PathBuf, time::Duration};

use reqwest::{
    multipart::{Form, Part},
    RequestBuilder, Response, Url,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use signhook_core::{SecretBytes, SecretResolver};
use tracing::{info_span, Instrument};
use zeroize::Zeroizing;

use crate::error::{ClientError, Result};

/// Production API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.hellosign.com/v3";

/// Configuration for the Dropbox Sign client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, without trailing slash.
    pub api_base_url: String,
    /// Default timeout for HTTP requests.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Create requests in test mode (not legally binding, not billed).
    pub test_mode: bool,
    /// Addresses copied on every request.
    pub cc_emails: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("signhook/", env!("CARGO_PKG_VERSION")).to_string(),
            test_mode: false,
            cc_emails: Vec::new(),
        }
    }
}

/// How signers are asked to sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureMode {
    /// Dropbox Sign emails each signer a link.
    #[default]
    Email,
    /// Signing happens in an iframe on our site; needs a client id.
    Embedded,
}

/// One signer, in signing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    /// Signer email address.
    pub email_address: String,
    /// Signer display name.
    pub name: String,
}

impl Signer {
    /// Creates a signer.
    pub fn new(email_address: impl Into<String>, name: impl Into<String>) -> Self {
        Self { email_address: email_address.into(), name: name.into() }
    }
}

/// A signature request to create.
#[derive(Debug, Clone)]
pub struct SignatureRequest {
    /// Document title.
    pub title: Option<String>,
    /// Email subject.
    pub subject: Option<String>,
    /// Email message.
    pub message: Option<String>,
    /// Signers; order follows the vector.
    pub signers: Vec<Signer>,
    /// Local path of the document to sign.
    pub file: PathBuf,
    /// Email or embedded signing.
    pub mode: SignatureMode,
    /// Where to send signers afterwards. Only honored in email mode.
    pub signing_redirect_url: Option<String>,
}

impl SignatureRequest {
    /// Creates an email-mode request for `file` with no signers.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            title: None,
            subject: None,
            message: None,
            signers: Vec::new(),
            file: file.into(),
            mode: SignatureMode::Email,
            signing_redirect_url: None,
        }
    }

    /// Appends a signer.
    #[must_use]
    pub fn with_signer(mut self, email_address: impl Into<String>, name: impl Into<String>) -> Self {
        self.signers.push(Signer::new(email_address, name));
        self
    }

    /// Sets the signing mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SignatureMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A signer's slot on a created request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Identifier used to fetch an embedded sign URL.
    pub signature_id: String,
    /// Signer email address.
    pub signer_email_address: String,
    /// Signer display name.
    #[serde(default)]
    pub signer_name: Option<String>,
    /// Provider status, e.g. `awaiting_signature`.
    pub status_code: String,
}

/// Result of creating a signature request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequestCreated {
    /// Provider identifier of the request.
    pub signature_request_id: String,
    /// One entry per signer.
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

/// Short-lived URL for embedded signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedSignUrl {
    /// URL to load in the signing iframe.
    pub sign_url: String,
    /// Unix time the URL stops working.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct SignatureRequestEnvelope {
    signature_request: SignatureRequestCreated,
}

#[derive(Deserialize)]
struct EmbeddedEnvelope {
    embedded: EmbeddedSignUrl,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    error_name: String,
}

/// Client for the signature request and embedded APIs.
#[derive(Clone)]
pub struct DropboxSignClient {
    client: reqwest::Client,
    config: ClientConfig,
    base_url: Url,
    api_key: Zeroizing<String>,
    client_id: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for DropboxSignClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxSignClient")
            .field("config", &self.config)
            .field("api_key", &"[REDACTED]")
            .field("client_id", &self.client_id.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl DropboxSignClient {
    /// Creates a client from already-resolved credentials.
    ///
    /// # Errors
    ///
    /// `MissingApiKey` when `api_key` is `None`, `InvalidCredential` when a
    /// credential is not UTF-8, and `Configuration` if the base URL is not an
    /// absolute http(s) URL or the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        api_key: Option<SecretBytes>,
        client_id: Option<SecretBytes>,
    ) -> Result<Self> {
        let api_key = api_key.ok_or(ClientError::MissingApiKey)?;
        let api_key = credential(&api_key, "api_key")?;
        let client_id = client_id.map(|id| credential(&id, "client_id")).transpose()?;

        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ClientError::configuration(format!("invalid api_base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::configuration("api_base_url cannot carry a path"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config, base_url, api_key, client_id })
    }

    /// Creates a client, resolving both credentials first.
    pub async fn from_resolvers(
        config: ClientConfig,
        api_key: &dyn SecretResolver,
        client_id: &dyn SecretResolver,
    ) -> Result<Self> {
        Self::new(config, api_key.resolve_secret().await, client_id.resolve_secret().await)
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Creates a signature request in email or embedded mode.
    ///
    /// Text tags in the document are used to place fields and hidden from
    /// the signers.
    ///
    /// # Errors
    ///
    /// `MissingClientId` for embedded mode without a client id, `File` when
    /// the document cannot be read, and `Api`/`Network`/`Timeout` for
    /// provider and transport failures.
    pub async fn create_signature_request(
        &self,
        request: SignatureRequest,
    ) -> Result<SignatureRequestCreated> {
        let span = info_span!(
            "create_signature_request",
            mode = ?request.mode,
            title = request.title.as_deref().unwrap_or(""),
            file = %request.file.display(),
        );

        async move {
            tracing::debug!(signers = request.signers.len(), "Generating signature request");

            let endpoint = match request.mode {
                SignatureMode::Email => ["signature_request", "send"],
                SignatureMode::Embedded => ["signature_request", "create_embedded"],
            };
            let url = self.url(&endpoint)?;
            let form = self.build_form(request).await?;

            let http_request = self.client.post(url).multipart(form);
            let envelope: SignatureRequestEnvelope = self.send(http_request).await?;

            tracing::info!(
                signature_request_id = %envelope.signature_request.signature_request_id,
                "Signature request created"
            );
            Ok(envelope.signature_request)
        }
        .instrument(span)
        .await
    }

    /// Fetches the embedded signing URL for one signature.
    ///
    /// # Errors
    ///
    /// `InvalidSignatureId` for an empty or dot-segment id, and
    /// `Api`/`Network`/`Timeout` for provider and transport failures.
    pub async fn embedded_sign_url(&self, signature_id: &str) -> Result<EmbeddedSignUrl> {
        let span = info_span!("embedded_sign_url", signature_id);

        async move {
            if matches!(signature_id, "" | "." | "..") {
                return Err(ClientError::InvalidSignatureId {
                    signature_id: signature_id.to_string(),
                });
            }
            let http_request =
                self.client.get(self.url(&["embedded", "sign_url", signature_id])?);
            let envelope: EmbeddedEnvelope = self.send(http_request).await?;
            Ok(envelope.embedded)
        }
        .instrument(span)
        .await
    }

    async fn build_form(&self, request: SignatureRequest) -> Result<Form> {
        let mut form = Form::new();

        if request.mode == SignatureMode::Embedded {
            let client_id = self.client_id.as_ref().ok_or(ClientError::MissingClientId)?;
            form = form.text("client_id", client_id.as_str().to_owned());
        }

        for (name, value) in [
            ("title", request.title),
            ("subject", request.subject),
            ("message", request.message),
        ] {
            if let Some(value) = value {
                form = form.text(name, value);
            }
        }

        for (i, signer) in request.signers.into_iter().enumerate() {
            form = form
                .text(format!("signers[{i}][email_address]"), signer.email_address)
                .text(format!("signers[{i}][name]"), signer.name)
                .text(format!("signers[{i}][order]"), i.to_string());
        }

        if request.mode == SignatureMode::Email {
            if let Some(url) = request.signing_redirect_url {
                form = form.text("signing_redirect_url", url);
            }
        }

        form = form.text("use_text_tags", "1").text("hide_text_tags", "1");

        if self.config.test_mode {
            form = form.text("test_mode", "1");
        }

        for (i, email) in self.config.cc_emails.iter().enumerate() {
            form = form.text(format!("cc_email_addresses[{i}]"), email.clone());
        }

        let contents = tokio::fs::read(&request.file).await.map_err(|e| ClientError::File {
            path: request.file.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = request
            .file
            .file_name()
            .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned());

        Ok(form.part("file[0]", Part::bytes(contents).file_name(file_name)))
    }

    /// Appends `segments` to the base URL, percent-encoding each one so a
    /// `/` inside a segment cannot change the endpoint.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::configuration("api_base_url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .basic_auth(self.api_key.as_str(), None::<&str>)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Request failed: {}", e);
                if e.is_timeout() {
                    ClientError::timeout(self.config.timeout.as_secs())
                } else if e.is_connect() {
                    ClientError::network(format!("connection failed: {e}"))
                } else {
                    ClientError::network(e.to_string())
                }
            })?;

        parse_response(response).await
    }
}

/// Decodes a success body, or maps the provider's error body.
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| ClientError::network(e.to_string()))?;

    if status.is_success() {
        return serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Decode { message: e.to_string() });
    }

    let error = match serde_json::from_slice::<ApiErrorEnvelope>(&bytes) {
        Ok(envelope) => ClientError::api(
            status.as_u16(),
            envelope.error.error_name,
            envelope.error.error_msg,
        ),
        Err(_) => ClientError::api(
            status.as_u16(),
            "unknown",
            String::from_utf8_lossy(&bytes).chars().take(512).collect::<String>(),
        ),
    };

    tracing::error!(status = status.as_u16(), "Exception when calling Dropbox Sign API: {}", error);
    Err(error)
}

fn credential(secret: &SecretBytes, credential: &'static str) -> Result<Zeroizing<String>> {
    std::str::from_utf8(secret)
        .map(|s| Zeroizing::new(s.to_owned()))
        .map_err(|_| ClientError::InvalidCredential { credential })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_refuses_to_connect() {
        let err = DropboxSignClient::new(ClientConfig::default(), None, None).unwrap_err();
        assert!(matches!(err, ClientError::MissingApiKey));
    }

    #[test]
    fn non_utf8_credential_rejected() {
        let key = SecretBytes::new(vec![0xff, 0xfe]);
        let err = DropboxSignClient::new(ClientConfig::default(), Some(key), None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidCredential { credential: "api_key" }));
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = DropboxSignClient::new(
            ClientConfig::default(),
            Some(SecretBytes::new(b"super-secret-key".to_vec())),
            None,
        )
        .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config =
            ClientConfig { api_base_url: "http://localhost:1/v3/".into(), ..ClientConfig::default() };
        let client =
            DropboxSignClient::new(config, Some(SecretBytes::new(b"k".to_vec())), None).unwrap();
        assert_eq!(
            client.url(&["signature_request", "send"]).unwrap().as_str(),
            "http://localhost:1/v3/signature_request/send"
        );
    }

    #[test]
    fn url_segments_are_escaped() {
        let config =
            ClientConfig { api_base_url: "http://localhost:1/v3".into(), ..ClientConfig::default() };
        let client =
            DropboxSignClient::new(config, Some(SecretBytes::new(b"k".to_vec())), None).unwrap();

        let url = client.url(&["embedded", "sign_url", "abc/../../signature_request/cancel"]).unwrap();
        assert_eq!(url.path(), "/v3/embedded/sign_url/abc%2F..%2F..%2Fsignature_request%2Fcancel");
    }

    #[test]
    fn relative_base_url_rejected() {
        let config = ClientConfig { api_base_url: "api.hellosign.com".into(), ..ClientConfig::default() };
        let err = DropboxSignClient::new(config, Some(SecretBytes::new(b"k".to_vec())), None)
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration { .. }));
    }

    #[test]
    fn signature_request_builder() {
        let request = SignatureRequest::new("/tmp/doc.pdf")
            .with_signer("a@example.com", "A")
            .with_signer("b@example.com", "B")
            .with_mode(SignatureMode::Embedded);

        assert_eq!(request.signers[1], Signer::new("b@example.com", "B"));
        assert_eq!(request.mode, SignatureMode::Embedded);
    }
}
