//! HMAC-signed REST client for the BitGrail exchange API.
//!
//! # Key Components
//!
//! - [`BitGrailClient`]: builds, signs and dispatches one request per call
//! - [`encode_form`]: canonical form encoding (signed bytes == sent bytes)
//! - [`Signer`]: HMAC-SHA512 over the body, `KEY` / `SIGNATURE` headers
//! - [`NonceManager`]: microsecond nonces with a monotonic guard
//! - [`HttpTransport`]: network seam, with [`ReqwestTransport`] and
//!   [`MockTransport`]
//!
//! # Outcomes
//!
//! | Situation                 | Result                                   |
//! |---------------------------|------------------------------------------|
//! | HTTP 200                  | `Ok(decoded JSON)` (`Null` if not JSON)  |
//! | HTTP 400/401/403/404      | `ClientError::Http` with fixed message   |
//! | Other non-200             | `ClientError::Http` with exchange message or `HTTP error <code>` |
//! | No response               | `ClientError::Transport`, status 0       |
//! | Body cut off mid-read     | `ClientError::Http` with the real status |
//! | Bad method name           | `ClientError::InvalidMethod`, no request |

pub mod client;
pub mod config;
pub mod credentials;
pub mod encoding;
pub mod endpoints;
pub mod error;
pub mod nonce;
pub mod serde_utils;
pub mod signer;
pub mod transport;

pub use client::{status_message, BitGrailClient, CallRecord};
pub use config::{ApiVersion, ClientConfig};
pub use credentials::{Credentials, CredentialsConfig, KeyError, KeySource};
pub use encoding::{decode_form, encode_form, params_from_value, Params};
pub use endpoints::{OrderPlaced, OrderRequest};
pub use error::{ClientError, ClientResult, NO_RESPONSE_STATUS};
pub use nonce::{Clock, NonceManager, SystemClock};
pub use signer::{sign_body, Signer};
pub use transport::{
    DynHttpTransport, HttpRequest, HttpResponse, HttpTransport, MockTransport, ReqwestTransport,
    TransportError,
};
