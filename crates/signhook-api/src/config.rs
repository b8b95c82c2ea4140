//! Configuration management for the signhook service.

use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use signhook_client::ClientConfig;
use signhook_core::{SealedSecretResolver, SecretResolver, StaticSecretResolver, MASTER_KEY_LEN};
use zeroize::Zeroizing;

use crate::{server::RouterConfig, verifier::DEFAULT_REPLAY_WINDOW_SECS};

const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "SIGNHOOK_";

/// Service configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed with `SIGNHOOK_` (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Secrets (`api_key`, `client_id`) are stored sealed with the master
/// `encryption_key`; see [`signhook_core::seal_secret`].
///
/// # Example
///
/// ```no_run
/// use signhook_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("Callbacks accepted at {}", config.callback_path);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `SIGNHOOK_HOST`
    #[serde(default = "default_host")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `SIGNHOOK_PORT`
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `SIGNHOOK_REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Route the provider posts callbacks to.
    ///
    /// Environment variable: `SIGNHOOK_CALLBACK_PATH`
    #[serde(default = "default_callback_path")]
    pub callback_path: String,

    // Verification
    /// Maximum accepted event age in seconds.
    ///
    /// Environment variable: `SIGNHOOK_REPLAY_WINDOW_SECONDS`
    #[serde(default = "default_replay_window")]
    pub replay_window_seconds: i64,
    /// Base64 master key (32 bytes) that seals the secrets below.
    ///
    /// Environment variable: `SIGNHOOK_ENCRYPTION_KEY`
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// Sealed Dropbox Sign API key. Also the callback HMAC key.
    ///
    /// Environment variable: `SIGNHOOK_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sealed API app client id, needed for embedded signing.
    ///
    /// Environment variable: `SIGNHOOK_CLIENT_ID`
    #[serde(default)]
    pub client_id: Option<String>,

    // Signature requests
    /// Comma-separated addresses copied on every signature request.
    ///
    /// Environment variable: `SIGNHOOK_CC_EMAILS`
    #[serde(default)]
    pub cc_emails: Option<String>,
    /// Create signature requests in provider test mode.
    ///
    /// Environment variable: `SIGNHOOK_TEST_MODE`
    #[serde(default)]
    pub test_mode: bool,
    /// Dropbox Sign API base URL.
    ///
    /// Environment variable: `SIGNHOOK_API_BASE_URL`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Timeout for outbound API calls in seconds.
    ///
    /// Environment variable: `SIGNHOOK_API_TIMEOUT`
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,

    // Logging
    /// Log filter used when `RUST_LOG` is unset.
    ///
    /// Environment variable: `SIGNHOOK_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    pub fn load() -> Result<Self> {
        let config: Self = Self::figment().extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Layered configuration sources, lowest priority first.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Router settings derived from this configuration.
    pub fn to_router_config(&self) -> RouterConfig {
        RouterConfig {
            callback_path: self.callback_path.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }

    /// Signature request client settings.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.api_timeout),
            test_mode: self.test_mode,
            cc_emails: parse_cc_emails(self.cc_emails.as_deref()),
            ..ClientConfig::default()
        }
    }

    /// Decodes the master key, if configured.
    pub fn master_key(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let Some(encoded) = self.encryption_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let key = Zeroizing::new(
            STANDARD.decode(encoded.trim()).context("encryption_key is not valid base64")?,
        );
        if key.len() != MASTER_KEY_LEN {
            anyhow::bail!("encryption_key must decode to {MASTER_KEY_LEN} bytes, got {}", key.len());
        }
        Ok(Some(key))
    }

    /// Resolver for the sealed API key used to verify callbacks.
    pub fn api_key_resolver(&self) -> Result<Arc<dyn SecretResolver>> {
        self.sealed_resolver(self.api_key.clone())
    }

    /// Resolver for the sealed client id used by embedded requests.
    pub fn client_id_resolver(&self) -> Result<Arc<dyn SecretResolver>> {
        self.sealed_resolver(self.client_id.clone())
    }

    fn sealed_resolver(&self, sealed: Option<String>) -> Result<Arc<dyn SecretResolver>> {
        match self.master_key()? {
            Some(key) => Ok(Arc::new(
                SealedSecretResolver::new(&key, sealed).context("Invalid encryption_key")?,
            )),
            None => Ok(Arc::new(StaticSecretResolver::unset())),
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if !self.callback_path.starts_with('/') {
            anyhow::bail!("callback_path must start with '/'");
        }

        // The router treats these as captures or wildcards and panics on some forms.
        if self.callback_path.contains([':', '*', '{', '}']) {
            anyhow::bail!("callback_path must be a literal path without ':', '*', '{{' or '}}'");
        }

        if self.replay_window_seconds <= 0 {
            anyhow::bail!("replay_window_seconds must be greater than 0");
        }

        let master_key = self.master_key()?;
        let has_sealed = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if master_key.is_none() && (has_sealed(&self.api_key) || has_sealed(&self.client_id)) {
            anyhow::bail!("encryption_key is required when api_key or client_id is set");
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            anyhow::bail!("api_base_url must be an http(s) URL");
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "***" } else { "unset" };
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("callback_path", &self.callback_path)
            .field("replay_window_seconds", &self.replay_window_seconds)
            .field("encryption_key", &redact(&self.encryption_key))
            .field("api_key", &redact(&self.api_key))
            .field("client_id", &redact(&self.client_id))
            .field("cc_emails", &self.cc_emails)
            .field("test_mode", &self.test_mode)
            .field("api_base_url", &self.api_base_url)
            .field("api_timeout", &self.api_timeout)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            callback_path: default_callback_path(),
            replay_window_seconds: default_replay_window(),
            encryption_key: None,
            api_key: None,
            client_id: None,
            cc_emails: None,
            test_mode: false,
            api_base_url: default_api_base_url(),
            api_timeout: default_api_timeout(),
            rust_log: default_log_level(),
        }
    }
}

/// Splits the comma-separated cc list, dropping blanks.
fn parse_cc_emails(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    })
    .unwrap_or_default()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_callback_path() -> String {
    crate::server::DEFAULT_CALLBACK_PATH.to_string()
}

fn default_replay_window() -> i64 {
    DEFAULT_REPLAY_WINDOW_SECS
}

fn default_api_base_url() -> String {
    signhook_client::DEFAULT_API_BASE_URL.to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info,signhook=debug,tower_http=debug".to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use signhook_core::seal_secret;

    use super::*;

    const KEY: [u8; 32] = [7u8; 32];

    fn encoded_key() -> String {
        STANDARD.encode(KEY)
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.replay_window_seconds, 86_400);
        assert_eq!(config.callback_path, "/dropbox-sign/callback");
        assert_eq!(config.parse_server_addr().unwrap().port(), 8080);
    }

    #[test]
    fn file_and_environment_layers_apply_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                port = 9000
                callback_path = "/hooks/sign"
                test_mode = true
                "#,
            )?;
            jail.set_env("SIGNHOOK_PORT", "9100");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.port, 9100);
            assert_eq!(config.callback_path, "/hooks/sign");
            assert!(config.test_mode);
            Ok(())
        });
    }

    #[test]
    fn sealed_secret_without_master_key_is_rejected() {
        let config = Config { api_key: Some("c2VhbGVk".into()), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn master_key_must_be_32_bytes() {
        let config =
            Config { encryption_key: Some(STANDARD.encode([1u8; 16])), ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { encryption_key: Some("not base64!".into()), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config { port: 0, ..Config::default() }.validate().is_err());
        assert!(Config { callback_path: "callback".into(), ..Config::default() }
            .validate()
            .is_err());
        assert!(Config { replay_window_seconds: 0, ..Config::default() }.validate().is_err());
        assert!(Config { api_base_url: "ftp://x".into(), ..Config::default() }.validate().is_err());
    }

    #[test]
    fn callback_path_must_be_literal() {
        for path in ["/hooks/:id", "/hooks/*rest", "/hooks/{id}", "/hooks}"] {
            let config = Config { callback_path: path.into(), ..Config::default() };
            assert!(config.validate().is_err(), "{path} accepted");
        }

        Jail::expect_with(|jail| {
            jail.set_env("SIGNHOOK_CALLBACK_PATH", "/sign/:event");
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("callback_path"));
            Ok(())
        });
    }

    #[tokio::test]
    async fn api_key_resolver_opens_sealed_value() {
        let config = Config {
            encryption_key: Some(encoded_key()),
            api_key: Some(seal_secret(&KEY, b"live-api-key").unwrap()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let secret = config.api_key_resolver().unwrap().resolve_secret().await.unwrap();
        assert_eq!(secret.as_slice(), b"live-api-key");
        assert!(config.client_id_resolver().unwrap().resolve_secret().await.is_none());
    }

    #[tokio::test]
    async fn unconfigured_secret_resolves_to_none() {
        let resolver = Config::default().api_key_resolver().unwrap();
        assert!(resolver.resolve_secret().await.is_none());
    }

    #[test]
    fn cc_emails_are_split_and_trimmed() {
        assert_eq!(
            parse_cc_emails(Some(" a@example.com, ,b@example.com ,")),
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
        assert!(parse_cc_emails(None).is_empty());

        let config = Config { cc_emails: Some("legal@example.com".into()), ..Config::default() };
        assert_eq!(config.to_client_config().cc_emails, vec!["legal@example.com".to_string()]);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config {
            encryption_key: Some(encoded_key()),
            api_key: Some("sealed-value".into()),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sealed-value"));
        assert!(!rendered.contains(&encoded_key()));
    }
}
