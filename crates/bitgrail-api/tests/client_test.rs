//! Integration tests for the signed client against a scripted transport.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitgrail_api::{
    decode_form, sign_body, ApiVersion, BitGrailClient, ClientConfig, ClientError, Credentials,
    CredentialsConfig, DynHttpTransport, HttpRequest, KeySource, MockTransport, OrderRequest,
    Params,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

const PUBLIC_KEY: &str = "test-public-key";
const PRIVATE_KEY: &str = "test-private-key";

fn client_with(mock: &Arc<MockTransport>, config: &ClientConfig) -> BitGrailClient {
    let transport: DynHttpTransport = mock.clone();
    BitGrailClient::with_transport(Credentials::new(PUBLIC_KEY, PRIVATE_KEY), config, transport)
        .expect("client")
}

fn default_client(mock: &Arc<MockTransport>) -> BitGrailClient {
    client_with(mock, &ClientConfig::default())
}

fn params(value: Value) -> Params {
    bitgrail_api::params_from_value(value).expect("object params")
}

fn nonce_of(request: &HttpRequest) -> u64 {
    decode_form(&request.body)
        .into_iter()
        .find(|(k, _)| k == "nonce")
        .map(|(_, v)| v.parse().expect("numeric nonce"))
        .expect("nonce present")
}

#[tokio::test]
async fn test_signature_covers_transmitted_body() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    client
        .invoke(
            "buyorder",
            params(json!({"market": "BTC-XRB", "amount": 1000, "price": "0.00000900"})),
        )
        .await
        .unwrap();

    let request = mock.last_request().unwrap();
    let expected = sign_body(PRIVATE_KEY.as_bytes(), &request.body).unwrap();
    assert_eq!(request.header("SIGNATURE"), Some(expected.as_str()));
    assert_eq!(request.header("KEY"), Some(PUBLIC_KEY));
    assert_eq!(
        request.header("Content-Type"),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn test_body_layout_and_endpoint() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    client
        .invoke(
            "buyorder",
            params(json!({"market": "BTC-XRB", "amount": 1000, "price": "0.00000900"})),
        )
        .await
        .unwrap();

    let request = mock.last_request().unwrap();
    assert_eq!(request.url, "https://bitgrail.com/api/v1/buyorder");

    let nonce = nonce_of(&request);
    assert_eq!(
        request.body,
        format!("market=BTC-XRB&amount=1000&price=0.00000900&nonce={nonce}")
    );
}

#[tokio::test]
async fn test_nonce_is_wall_clock_microseconds() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    let before = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64;
    client.invoke("balances", Params::new()).await.unwrap();
    let after = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64;

    let request = mock.last_request().unwrap();
    let raw = request.body.strip_prefix("nonce=").unwrap();
    assert!(raw.chars().all(|c| c.is_ascii_digit()));

    let nonce: u64 = raw.parse().unwrap();
    assert!(nonce >= before && nonce <= after + 1);
}

#[tokio::test]
async fn test_nonce_strictly_increases() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    client.invoke("balances", Params::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    client.invoke("balances", Params::new()).await.unwrap();

    let requests = mock.requests();
    assert!(nonce_of(&requests[1]) > nonce_of(&requests[0]));
}

#[tokio::test]
async fn test_identical_params_give_different_signatures() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);
    let p = params(json!({"market": "BTC-XRB"}));

    client.invoke("openorders", p.clone()).await.unwrap();
    client.invoke("openorders", p).await.unwrap();

    let requests = mock.requests();
    assert_ne!(nonce_of(&requests[0]), nonce_of(&requests[1]));
    assert_ne!(
        requests[0].header("SIGNATURE"),
        requests[1].header("SIGNATURE")
    );
}

#[tokio::test]
async fn test_success_returns_decoded_body() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(200, r#"{"orderId":"123"}"#);
    let client = default_client(&mock);

    let body = client.invoke("buyorder", Params::new()).await.unwrap();

    assert_eq!(body["orderId"], "123");
    assert_eq!(client.last_status(), Some(200));
    assert_eq!(client.last_error(), None);
    assert_eq!(client.last_response(), Some(json!({"orderId": "123"})));
    assert_eq!(
        client.last_raw_response().as_deref(),
        Some(r#"{"orderId":"123"}"#)
    );
    assert_eq!(client.last_method().as_deref(), Some("buyorder"));
}

#[tokio::test]
async fn test_unauthorized_returns_fixed_message() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(401, r#"{"error":"invalid key"}"#);
    let client = default_client(&mock);

    let err = client.invoke("balances", Params::new()).await.unwrap_err();

    match err {
        ClientError::Http { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert_eq!(client.last_status(), Some(401));
    assert_eq!(client.last_error().as_deref(), Some("Unauthorized"));

    let record = client.last_call().unwrap();
    assert!(!record.is_success());
}

#[tokio::test]
async fn test_fixed_messages_for_common_codes() {
    let cases = [
        (400, "Bad Request"),
        (403, "Forbidden"),
        (404, "Not Found"),
    ];
    for (status, expected) in cases {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(status, "{}");
        let client = default_client(&mock);

        let err = client.invoke("balances", Params::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(status));
        assert_eq!(client.last_error().as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn test_other_status_uses_upstream_message() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(500, r#"{"success":0,"response":{"error":"Market closed"}}"#);
    mock.push_response(503, "<html>down</html>");
    let client = default_client(&mock);

    let err = client.invoke("buyorder", Params::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 500: Market closed");

    let err = client.invoke("buyorder", Params::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 503: HTTP error 503");
    assert_eq!(client.last_response(), None);
    assert_eq!(
        client.last_raw_response().as_deref(),
        Some("<html>down</html>")
    );
}

#[tokio::test]
async fn test_transport_failure_reports_status_zero() {
    let mock = Arc::new(MockTransport::new());
    mock.push_failure("error trying to connect: connection refused");
    let client = default_client(&mock);

    let err = client.invoke("balances", Params::new()).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), Some(0));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(client.last_status(), Some(0));
    assert!(!client.last_error().unwrap().is_empty());
    assert_eq!(client.last_raw_response(), None);
}

#[tokio::test]
async fn test_empty_transport_description_is_filled() {
    let mock = Arc::new(MockTransport::new());
    mock.push_failure("");
    let client = default_client(&mock);

    let err = client.invoke("balances", Params::new()).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(client.last_error().as_deref(), Some("transport failure"));
}

#[tokio::test]
async fn test_non_json_success_is_null() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(200, "OK");
    let client = default_client(&mock);

    let body = client.invoke("balances", Params::new()).await.unwrap();
    assert_eq!(body, Value::Null);
    assert_eq!(client.last_response(), None);
    assert_eq!(client.last_raw_response().as_deref(), Some("OK"));
}

#[tokio::test]
async fn test_caller_nonce_is_overwritten_in_place() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    client
        .invoke("buyorder", params(json!({"nonce": "1", "market": "BTC-XRB"})))
        .await
        .unwrap();

    let pairs = decode_form(&mock.last_request().unwrap().body);
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0, "nonce");
    assert_ne!(pairs[0].1, "1");
    assert_eq!(pairs[1], ("market".to_string(), "BTC-XRB".to_string()));
}

#[tokio::test]
async fn test_list_params_keep_bracketed_keys() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    client
        .invoke("lasttrades", params(json!({"filters": ["x", "y z"]})))
        .await
        .unwrap();

    let request = mock.last_request().unwrap();
    assert!(request.body.starts_with("filters%5B0%5D=x&filters%5B1%5D=y%20z&nonce="));

    let pairs = decode_form(&request.body);
    assert_eq!(pairs[0], ("filters[0]".to_string(), "x".to_string()));
    assert_eq!(pairs[1], ("filters[1]".to_string(), "y z".to_string()));
}

#[tokio::test]
async fn test_invalid_method_fails_before_dispatch() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    let err = client
        .invoke("buy order/../x", Params::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidMethod(_)));
    assert!(mock.requests().is_empty());
    assert_eq!(client.call_count(), 0);
    assert!(client.last_call().is_none());
}

#[tokio::test]
async fn test_version_and_base_url_shape_endpoint() {
    let mock = Arc::new(MockTransport::new());
    let config = ClientConfig {
        base_url: "https://staging.example.com/".to_string(),
        version: ApiVersion::from(2u32),
        ..ClientConfig::default()
    };
    let client = client_with(&mock, &config);

    client.invoke("balances", Params::new()).await.unwrap();

    assert_eq!(
        mock.last_request().unwrap().url,
        "https://staging.example.com/api/v2/balances"
    );
}

#[tokio::test]
async fn test_call_records_are_per_call() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(401, "{}");
    mock.push_response(200, r#"{"BTC":"0.5"}"#);
    let client = default_client(&mock);

    let first = client.call("balances", Params::new()).await.unwrap();
    let second = client.call("openorders", Params::new()).await.unwrap();

    assert_eq!(first.call_id, 1);
    assert_eq!(first.http_status, 401);
    assert_eq!(first.error.as_deref(), Some("Unauthorized"));

    assert_eq!(second.call_id, 2);
    assert_eq!(second.http_status, 200);
    assert!(second.error.is_none());
    assert!(second.nonce > first.nonce);

    assert_eq!(client.call_count(), 2);
    assert_eq!(client.last_call(), Some(second));
}

#[tokio::test]
async fn test_buy_order_wrapper() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(200, r#"{"orderId":"123"}"#);
    let client = default_client(&mock);

    let order = OrderRequest::new("BTC-XRB", dec!(1000), dec!(0.00000900));
    let placed = client.buy_order(&order).await.unwrap();

    assert_eq!(placed.order_id, "123");
    let request = mock.last_request().unwrap();
    assert_eq!(request.url, "https://bitgrail.com/api/v1/buyorder");
    assert!(request
        .body
        .starts_with("market=BTC-XRB&amount=1000&price=0.00000900&nonce="));
}

#[tokio::test]
async fn test_sell_order_wrapper_rejects_unexpected_shape() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(200, r#"{"success":1}"#);
    let client = default_client(&mock);

    let order = OrderRequest::new("BTC-XRB", dec!(5), dec!(0.0001));
    let err = client.sell_order(&order).await.unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
}

#[tokio::test]
async fn test_market_wrappers() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    client.cancel_order("42").await.unwrap();
    client.open_orders(None).await.unwrap();
    client.open_orders(Some("BTC-XRB")).await.unwrap();
    client.last_trades("BTC-XRB").await.unwrap();
    client.balances().await.unwrap();

    let requests = mock.requests();
    assert!(requests[0].url.ends_with("/cancelorder"));
    assert!(requests[0].body.starts_with("orderId=42&nonce="));
    assert!(requests[1].body.starts_with("nonce="));
    assert!(requests[2].body.starts_with("market=BTC-XRB&nonce="));
    assert!(requests[3].url.ends_with("/lasttrades"));
    assert!(requests[4].url.ends_with("/balances"));
}

#[tokio::test]
async fn test_invoke_with_rejects_non_object() {
    let mock = Arc::new(MockTransport::new());
    let client = default_client(&mock);

    let err = client.invoke_with("balances", &vec![1, 2]).await.unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
    assert!(mock.requests().is_empty());
}

#[test]
fn test_from_config_requires_credentials() {
    let err = BitGrailClient::from_config(&ClientConfig::default())
        .err()
        .expect("missing credentials must fail");
    assert!(matches!(err, ClientError::Config(_)));
}

#[test]
fn test_from_config_with_inline_credentials() {
    let config = ClientConfig {
        credentials: Some(CredentialsConfig {
            public_key: KeySource::Inline {
                value: PUBLIC_KEY.to_string(),
            },
            private_key: KeySource::Inline {
                value: PRIVATE_KEY.to_string(),
            },
        }),
        ..ClientConfig::default()
    };
    let client = BitGrailClient::from_config(&config).unwrap();
    assert_eq!(client.version().as_str(), "1");
    assert_eq!(
        client.endpoint("balances").unwrap(),
        "https://bitgrail.com/api/v1/balances"
    );
}

#[test]
fn test_new_defaults_to_version_one() {
    let client = BitGrailClient::new(Credentials::new("", ""), "1").unwrap();
    assert_eq!(
        client.endpoint("buyorder").unwrap(),
        "https://bitgrail.com/api/v1/buyorder"
    );
}

#[tokio::test]
async fn test_truncated_body_keeps_received_status() {
    let mock = Arc::new(MockTransport::new());
    mock.push_truncated(500, "failed to read response body: connection closed");
    let client = default_client(&mock);

    let err = client.invoke("balances", Params::new()).await.unwrap_err();

    match err {
        ClientError::Http { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("failed to read response body"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert_eq!(client.last_status(), Some(500));
    assert_eq!(client.last_raw_response(), None);
    assert_eq!(client.last_response(), None);
}

#[tokio::test]
async fn test_failed_call_keeps_decoded_body_for_inspection() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(401, r#"{"error":"invalid key"}"#);
    let client = default_client(&mock);

    let err = client.invoke("balances", Params::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    // The caller gets no body, but the record keeps it.
    assert_eq!(client.last_response(), Some(json!({"error": "invalid key"})));
    assert_eq!(
        client.last_raw_response().as_deref(),
        Some(r#"{"error":"invalid key"}"#)
    );
}

#[tokio::test]
async fn test_invalid_public_key_fails_before_dispatch() {
    let mock = Arc::new(MockTransport::new());
    let transport: DynHttpTransport = mock.clone();
    let client = BitGrailClient::with_transport(
        Credentials::new("pub\r\nX-Injected: 1", PRIVATE_KEY),
        &ClientConfig::default(),
        transport,
    )
    .unwrap();

    let err = client.invoke("balances", Params::new()).await.unwrap_err();

    assert!(matches!(err, ClientError::Signing(_)));
    assert_eq!(err.status(), None);
    assert!(mock.requests().is_empty());
}

#[test]
fn test_new_rejects_version_that_escapes_path() {
    let err = BitGrailClient::new(Credentials::new("", ""), "1/../../admin")
        .err()
        .expect("path-changing version must fail");
    assert!(matches!(err, ClientError::Config(_)));

    let mock = Arc::new(MockTransport::new());
    let transport: DynHttpTransport = mock.clone();
    let config = ClientConfig {
        version: ApiVersion::from("1?debug=1"),
        ..ClientConfig::default()
    };
    let result = BitGrailClient::with_transport(Credentials::new("", ""), &config, transport);
    assert!(matches!(result, Err(ClientError::Config(_))));
}
