//! Signed API client.
//!
//! Every call follows the same path:
//! 1. Copy caller params and stamp a fresh `nonce`
//! 2. Form-encode (the encoded string is both body and signed message)
//! 3. Sign with HMAC-SHA512 and attach `KEY` / `SIGNATURE` headers
//! 4. POST to `{base_url}/api/v{version}/{method}`
//! 5. Decode the body as JSON and classify the outcome
//!
//! Calls are single-shot. Retry policy belongs to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{is_path_segment, ApiVersion, ClientConfig};
use crate::credentials::Credentials;
use crate::encoding::{encode_form, params_from_value, Params};
use crate::error::{ClientError, ClientResult, NO_RESPONSE_STATUS};
use crate::nonce::{NonceManager, SystemClock};
use crate::signer::Signer;
use crate::transport::{DynHttpTransport, HttpRequest, ReqwestTransport};

/// Outcome of a single invocation.
///
/// Built fresh for every call. `decoded_body` is kept even for failed calls
/// for inspection, but only reaches the caller as a success value when
/// `error` is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Per-client sequence id, never transmitted.
    pub call_id: u64,
    pub method: String,
    pub nonce: u64,
    /// HTTP status, or 0 when no response was received.
    pub http_status: u16,
    pub error: Option<String>,
    pub raw_body: Option<String>,
    pub decoded_body: Option<Value>,
}

impl CallRecord {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into the caller-facing result.
    ///
    /// Success yields the decoded body (`Value::Null` when a 200 body is not
    /// JSON). Failures carry no body.
    pub fn into_result(self) -> ClientResult<Value> {
        match self.error {
            None => Ok(self.decoded_body.unwrap_or(Value::Null)),
            Some(message) if self.http_status == NO_RESPONSE_STATUS => {
                Err(ClientError::Transport { message })
            }
            Some(message) => Err(ClientError::Http {
                status: self.http_status,
                message,
            }),
        }
    }
}

/// Fixed messages for common HTTP failures.
#[must_use]
pub fn status_message(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("Bad Request"),
        401 => Some("Unauthorized"),
        403 => Some("Forbidden"),
        404 => Some("Not Found"),
        _ => None,
    }
}

/// Error message carried by an exchange response body, if any.
///
/// Looks at `error`, `message`, then `response.error` / `response.message`.
fn upstream_message(body: &Value) -> Option<String> {
    fn field(value: &Value) -> Option<String> {
        ["error", "message"].iter().find_map(|key| match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    }

    field(body).or_else(|| body.get("response").and_then(field))
}

/// Classify a received response into an error message, or `None` on success.
fn classify(status: u16, decoded: Option<&Value>) -> Option<String> {
    if status == 200 {
        return None;
    }
    if let Some(fixed) = status_message(status) {
        return Some(fixed.to_string());
    }
    Some(
        decoded
            .and_then(upstream_message)
            .unwrap_or_else(|| format!("HTTP error {status}")),
    )
}

/// Method names become a URL path segment; reject anything that would
/// change the path or need escaping.
fn validate_method(method: &str) -> ClientResult<()> {
    if is_path_segment(method) {
        Ok(())
    } else {
        Err(ClientError::InvalidMethod(method.to_string()))
    }
}

/// HMAC-authenticated BitGrail REST client.
///
/// Safe to share across tasks: each call works on its own [`CallRecord`].
/// The `last_*` accessors report whichever call finished most recently.
pub struct BitGrailClient {
    signer: Signer,
    transport: DynHttpTransport,
    nonces: NonceManager<SystemClock>,
    origin: String,
    version: ApiVersion,
    call_counter: AtomicU64,
    last_call: Mutex<Option<CallRecord>>,
}

impl BitGrailClient {
    /// Create a client against the default endpoint.
    ///
    /// No network activity; keys are not validated.
    pub fn new(credentials: Credentials, version: impl Into<ApiVersion>) -> ClientResult<Self> {
        let config = ClientConfig {
            version: version.into(),
            ..ClientConfig::default()
        };
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(credentials, &config, transport)
    }

    /// Create a client from config, loading keys from `config.credentials`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let sources = config.credentials.as_ref().ok_or_else(|| {
            ClientError::Config("credentials section is required".to_string())
        })?;
        let credentials = Credentials::load(sources)?;
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Self::with_transport(credentials, config, transport)
    }

    /// Create a client over an explicit transport.
    ///
    /// `config.credentials` is ignored.
    pub fn with_transport(
        credentials: Credentials,
        config: &ClientConfig,
        transport: DynHttpTransport,
    ) -> ClientResult<Self> {
        config.validate()?;

        info!(
            base_url = %config.origin(),
            version = %config.version,
            strict_nonce = config.strict_nonce,
            "BitGrail client created"
        );

        Ok(Self {
            signer: Signer::new(credentials),
            transport,
            nonces: NonceManager::with_system_clock(config.strict_nonce),
            origin: config.origin().to_string(),
            version: config.version.clone(),
            call_counter: AtomicU64::new(0),
            last_call: Mutex::new(None),
        })
    }

    /// Endpoint URL for a method.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidMethod` for names that are not a single
    /// `[A-Za-z0-9_-]+` path segment.
    pub fn endpoint(&self, method: &str) -> ClientResult<String> {
        validate_method(method)?;
        Ok(format!("{}/api/v{}/{}", self.origin, self.version, method))
    }

    #[must_use]
    pub fn version(&self) -> &ApiVersion {
        &self.version
    }

    /// Invoke an API method and return the decoded JSON body.
    ///
    /// # Errors
    /// - `ClientError::InvalidMethod` before any network activity
    /// - `ClientError::Transport` when no response was received
    /// - `ClientError::Http` for any non-200 status
    pub async fn invoke(&self, method: &str, params: Params) -> ClientResult<Value> {
        self.call(method, params).await?.into_result()
    }

    /// Invoke with params taken from any serializable object.
    ///
    /// # Errors
    /// As [`BitGrailClient::invoke`], plus `ClientError::Config` when `params`
    /// does not serialize to a JSON object.
    pub async fn invoke_with<P: Serialize + ?Sized>(
        &self,
        method: &str,
        params: &P,
    ) -> ClientResult<Value> {
        let value = serde_json::to_value(params)?;
        let params = params_from_value(value).ok_or_else(|| {
            ClientError::Config(format!("params for {method} must serialize to an object"))
        })?;
        self.invoke(method, params).await
    }

    /// Invoke an API method and return the full call record.
    ///
    /// Only programmer errors (invalid method name, signing failure) return
    /// `Err`; transport and HTTP failures are recorded in the `CallRecord`.
    pub async fn call(&self, method: &str, params: Params) -> ClientResult<CallRecord> {
        let url = self.endpoint(method)?;
        let call_id = self.call_counter.fetch_add(1, Ordering::Relaxed) + 1;

        let mut envelope = params;
        let nonce = self.nonces.next();
        envelope.insert("nonce".to_string(), Value::String(nonce.to_string()));

        let body = encode_form(&envelope);
        let headers = self.signer.headers(&body)?;

        debug!(call_id, method, nonce, body_len = body.len(), "Dispatching signed request");

        let request = HttpRequest { url, headers, body };

        let mut record = CallRecord {
            call_id,
            method: method.to_string(),
            nonce,
            http_status: NO_RESPONSE_STATUS,
            error: None,
            raw_body: None,
            decoded_body: None,
        };

        match self.transport.post(request).await {
            Err(e) => {
                let mut message = e.0;
                if message.is_empty() {
                    message = "transport failure".to_string();
                }
                warn!(call_id, method, error = %message, "Transport failure");
                record.error = Some(message);
            }
            Ok(response) if response.body_error.is_some() => {
                let message = response
                    .body_error
                    .unwrap_or_else(|| "failed to read response body".to_string());
                warn!(
                    call_id,
                    method,
                    status = response.status,
                    error = %message,
                    "Response body unreadable"
                );
                record.http_status = response.status;
                record.error = Some(message);
            }
            Ok(response) => {
                let raw = String::from_utf8_lossy(&response.body).into_owned();
                let decoded = match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!(call_id, method, error = %e, "Response body is not JSON");
                        None
                    }
                };

                record.http_status = response.status;
                record.error = classify(response.status, decoded.as_ref());
                record.raw_body = Some(raw);
                record.decoded_body = decoded;

                match &record.error {
                    None => debug!(call_id, method, status = response.status, "Call succeeded"),
                    Some(message) => warn!(
                        call_id,
                        method,
                        status = response.status,
                        error = %message,
                        "Call failed"
                    ),
                }
            }
        }

        *self.last_call.lock() = Some(record.clone());
        Ok(record)
    }

    /// Total invocations dispatched by this client.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.call_counter.load(Ordering::Relaxed)
    }

    /// Record of the most recent call.
    #[must_use]
    pub fn last_call(&self) -> Option<CallRecord> {
        self.last_call.lock().clone()
    }

    /// HTTP status of the most recent call (0 if no response was received).
    #[must_use]
    pub fn last_status(&self) -> Option<u16> {
        self.last_call.lock().as_ref().map(|r| r.http_status)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_call.lock().as_ref().and_then(|r| r.error.clone())
    }

    #[must_use]
    pub fn last_raw_response(&self) -> Option<String> {
        self.last_call
            .lock()
            .as_ref()
            .and_then(|r| r.raw_body.clone())
    }

    #[must_use]
    pub fn last_response(&self) -> Option<Value> {
        self.last_call
            .lock()
            .as_ref()
            .and_then(|r| r.decoded_body.clone())
    }

    #[must_use]
    pub fn last_method(&self) -> Option<String> {
        self.last_call.lock().as_ref().map(|r| r.method.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_messages() {
        assert_eq!(status_message(400), Some("Bad Request"));
        assert_eq!(status_message(401), Some("Unauthorized"));
        assert_eq!(status_message(403), Some("Forbidden"));
        assert_eq!(status_message(404), Some("Not Found"));
        assert_eq!(status_message(429), None);
    }

    #[test]
    fn test_classify_success_and_fixed_codes() {
        assert_eq!(classify(200, None), None);
        assert_eq!(
            classify(401, Some(&json!({"error": "bad key"}))),
            Some("Unauthorized".to_string())
        );
    }

    #[test]
    fn test_classify_prefers_upstream_message() {
        assert_eq!(
            classify(500, Some(&json!({"error": "Maintenance"}))),
            Some("Maintenance".to_string())
        );
        assert_eq!(
            classify(429, Some(&json!({"success": 0, "response": {"error": "Too fast"}}))),
            Some("Too fast".to_string())
        );
        assert_eq!(
            classify(502, Some(&json!({"message": "Bad gateway upstream"}))),
            Some("Bad gateway upstream".to_string())
        );
    }

    #[test]
    fn test_classify_generic_fallback() {
        assert_eq!(classify(503, None), Some("HTTP error 503".to_string()));
        assert_eq!(
            classify(500, Some(&json!({"error": ""}))),
            Some("HTTP error 500".to_string())
        );
        assert_eq!(classify(302, Some(&json!([1]))), Some("HTTP error 302".to_string()));
    }

    #[test]
    fn test_validate_method() {
        assert!(validate_method("buyorder").is_ok());
        assert!(validate_method("get_deposit-address2").is_ok());
        assert!(validate_method("").is_err());
        assert!(validate_method("buy order").is_err());
        assert!(validate_method("../admin").is_err());
        assert!(validate_method("balances?x=1").is_err());
    }

    #[test]
    fn test_record_into_result() {
        let base = CallRecord {
            call_id: 1,
            method: "balances".to_string(),
            nonce: 1,
            http_status: 200,
            error: None,
            raw_body: Some("not json".to_string()),
            decoded_body: None,
        };
        assert_eq!(base.clone().into_result().unwrap(), Value::Null);

        let transport = CallRecord {
            http_status: 0,
            error: Some("refused".to_string()),
            ..base.clone()
        };
        assert!(matches!(
            transport.into_result(),
            Err(ClientError::Transport { .. })
        ));

        let http = CallRecord {
            http_status: 403,
            error: Some("Forbidden".to_string()),
            decoded_body: Some(json!({"error": "nope"})),
            ..base
        };
        match http.into_result() {
            Err(ClientError::Http { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }
}
