//! HMAC-SHA512 request signing.
//!
//! The signature covers the exact form-encoded body that is transmitted;
//! headers, URL and method name are not part of the signed message.

use hmac::{Hmac, Mac};
use reqwest::header::HeaderValue;
use sha2::Sha512;

use crate::credentials::Credentials;
use crate::error::{ClientError, ClientResult};

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the public API key.
pub const KEY_HEADER: &str = "KEY";
/// Header carrying the hex-encoded HMAC-SHA512 of the body.
pub const SIGNATURE_HEADER: &str = "SIGNATURE";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Lowercase hex HMAC-SHA512 of `message` keyed with `secret`.
///
/// # Errors
/// Returns `ClientError::Signing` if the MAC cannot be keyed.
pub fn sign_body(secret: &[u8], message: &str) -> ClientResult<String> {
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|e| ClientError::Signing(format!("invalid HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Signs request bodies with a credential pair.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Sign an encoded body.
    ///
    /// # Errors
    /// See [`sign_body`].
    pub fn sign(&self, body: &str) -> ClientResult<String> {
        sign_body(self.credentials.private_key(), body)
    }

    /// Authentication and content headers for a signed body, in send order.
    ///
    /// # Errors
    /// See [`sign_body`]. Also returns `ClientError::Signing` when the public
    /// key is not a legal header value (e.g. contains control characters).
    pub fn headers(&self, body: &str) -> ClientResult<Vec<(String, String)>> {
        let public_key = self.credentials.public_key();
        HeaderValue::from_str(public_key).map_err(|e| {
            ClientError::Signing(format!("invalid value for header {KEY_HEADER}: {e}"))
        })?;

        let signature = self.sign(body)?;
        Ok(vec![
            (KEY_HEADER.to_string(), public_key.to_string()),
            (SIGNATURE_HEADER.to_string(), signature),
            (
                CONTENT_TYPE_HEADER.to_string(),
                FORM_CONTENT_TYPE.to_string(),
            ),
        ])
    }

    #[must_use]
    pub fn public_key(&self) -> &str {
        self.credentials.public_key()
    }
}
