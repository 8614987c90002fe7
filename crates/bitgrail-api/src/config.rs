//! Client configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::credentials::CredentialsConfig;
use crate::error::{ClientError, ClientResult};

/// True for a non-empty `[A-Za-z0-9_-]+` string, safe to splice into a URL
/// path without escaping or changing its shape.
pub(crate) fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// API version path segment (`/api/v{version}/...`).
///
/// Accepts either a string or an integer in config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion(String);

impl ApiVersion {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self("1".to_string())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApiVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ApiVersion {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for ApiVersion {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Exchange origin, without the `/api/...` path. Default: https://bitgrail.com
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API version segment. Default: "1".
    #[serde(default)]
    pub version: ApiVersion,
    /// Whole-request timeout (ms). Default: 10,000.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum redirects followed. Default: 10.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Skip TLS certificate verification. Default: false.
    /// Only for test endpoints with self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// User-Agent header. Default: "bitgrail-api/<version>".
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bump nonces past the clock when calls collide. Default: true.
    /// Set false to send raw wall-clock microseconds.
    #[serde(default = "default_strict_nonce")]
    pub strict_nonce: bool,
    /// Key sources. Required by `BitGrailClient::from_config`.
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

fn default_base_url() -> String {
    "https://bitgrail.com".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("bitgrail-api/{}", env!("CARGO_PKG_VERSION"))
}

fn default_strict_nonce() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: ApiVersion::default(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            accept_invalid_certs: false,
            user_agent: default_user_agent(),
            strict_nonce: default_strict_nonce(),
            credentials: None,
        }
    }
}

impl ClientConfig {
    /// Load from a TOML file and validate.
    pub fn from_file(path: &str) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    /// Returns `ClientError::Config` describing the first violation.
    pub fn validate(&self) -> ClientResult<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base_url {:?}: {e}", self.base_url)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ClientError::Config(
                "base_url must not carry a query or fragment".to_string(),
            ));
        }
        if !is_path_segment(self.version.as_str()) {
            return Err(ClientError::Config(format!(
                "version must match [A-Za-z0-9_-]+, got {:?}",
                self.version.as_str()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::Config("timeout_ms must be positive".to_string()));
        }

        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
