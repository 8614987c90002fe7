//! API key pair management.
//!
//! Security notes:
//! - The private key is held in `Zeroizing` memory and wiped on drop.
//! - `Debug` output redacts the private key.
//! - Never log private key material.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Source of a key string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// Load from environment variable.
    Env { var_name: String },
    /// Load from file (recommend 0600 permissions).
    File { path: PathBuf },
    /// Literal value, for tests and throwaway keys.
    Inline { value: String },
}

impl KeySource {
    /// Resolve the key string. Env and file values are whitespace-trimmed.
    ///
    /// # Errors
    /// Returns `KeyError` if the variable is missing or the file cannot be read.
    pub fn resolve(&self) -> Result<Zeroizing<String>, KeyError> {
        match self {
            KeySource::Env { var_name } => {
                let value = Zeroizing::new(
                    std::env::var(var_name)
                        .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
                );
                Ok(Zeroizing::new(value.trim().to_string()))
            }
            KeySource::File { path } => {
                let content = Zeroizing::new(std::fs::read_to_string(path)?);
                Ok(Zeroizing::new(content.trim().to_string()))
            }
            KeySource::Inline { value } => Ok(Zeroizing::new(value.clone())),
        }
    }
}

/// Key sources for both halves of the key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub public_key: KeySource,
    pub private_key: KeySource,
}

/// Public/private API key pair, immutable for the lifetime of a client.
///
/// Key format is not validated; the exchange rejects bad keys with 401.
#[derive(Clone)]
pub struct Credentials {
    public_key: String,
    private_key: Zeroizing<String>,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: Zeroizing::new(private_key.into()),
        }
    }

    /// Load both keys from their configured sources.
    ///
    /// # Errors
    /// Returns the first `KeyError` hit while resolving either source.
    pub fn load(config: &CredentialsConfig) -> Result<Self, KeyError> {
        let public_key = config.public_key.resolve()?;
        let private_key = config.private_key.resolve()?;
        Ok(Self {
            public_key: public_key.as_str().to_string(),
            private_key,
        })
    }

    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub(crate) fn private_key(&self) -> &[u8] {
        self.private_key.as_bytes()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
