//! Canonical form encoding of request parameters.
//!
//! The encoded string is both the signed message and the POST body, so the
//! output must be byte-stable:
//! - keys in insertion order (requires `serde_json/preserve_order`)
//! - unreserved RFC 3986 characters kept, everything else percent-encoded,
//!   space as `%20`
//! - nested arrays and objects expanded as `key%5Bsub%5D=value`
//! - booleans as `1`/`0`, nulls and empty containers omitted

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Ordered request parameters.
pub type Params = Map<String, Value>;

/// Characters left unescaped: `A-Z a-z 0-9 - _ . ~`.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const OPEN_BRACKET: &str = "%5B";
const CLOSE_BRACKET: &str = "%5D";

fn escape(input: &str) -> String {
    utf8_percent_encode(input, FORM_VALUE).to_string()
}

/// Render a scalar the way the exchange expects it on the wire.
///
/// Returns `None` for values that are omitted from the body.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn push_pair(pairs: &mut Vec<String>, escaped_key: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let key = format!("{escaped_key}{OPEN_BRACKET}{idx}{CLOSE_BRACKET}");
                push_pair(pairs, &key, item);
            }
        }
        Value::Object(fields) => {
            for (name, item) in fields {
                let key = format!("{escaped_key}{OPEN_BRACKET}{}{CLOSE_BRACKET}", escape(name));
                push_pair(pairs, &key, item);
            }
        }
        scalar => {
            if let Some(text) = scalar_text(scalar) {
                pairs.push(format!("{escaped_key}={}", escape(&text)));
            }
        }
    }
}

/// Encode parameters as an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn encode_form(params: &Params) -> String {
    let mut pairs = Vec::with_capacity(params.len());
    for (name, value) in params {
        push_pair(&mut pairs, &escape(name), value);
    }
    pairs.join("&")
}

/// Decode a form body into `(key, value)` pairs, in order.
///
/// Bracketed keys stay flat (`filters[0]`); no nesting is reconstructed.
/// A literal `+` is kept as `+`, matching the `%20` convention of
/// [`encode_form`].
#[must_use]
pub fn decode_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode_str(key).decode_utf8_lossy().into_owned(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            )
        })
        .collect()
}

/// Convert any JSON object into [`Params`].
///
/// Returns `None` when the value is not an object.
#[must_use]
pub fn params_from_value(value: Value) -> Option<Params> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => Some(Params::new()),
        _ => None,
    }
}
