//! Typed wrappers for documented endpoints.
//!
//! Thin conveniences over [`BitGrailClient::invoke`]; any other method can
//! still be called by name.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::BitGrailClient;
use crate::encoding::Params;
use crate::error::{ClientError, ClientResult};
use crate::serde_utils::string_or_number;

pub const BALANCES: &str = "balances";
pub const BUY_ORDER: &str = "buyorder";
pub const SELL_ORDER: &str = "sellorder";
pub const CANCEL_ORDER: &str = "cancelorder";
pub const OPEN_ORDERS: &str = "openorders";
pub const LAST_TRADES: &str = "lasttrades";

/// Limit order parameters.
///
/// Decimals serialize as strings so tiny prices keep their plain form
/// (`0.00000900`) instead of exponent notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    /// Market pair, e.g. "BTC-XRB".
    pub market: String,
    pub amount: Decimal,
    pub price: Decimal,
}

impl OrderRequest {
    pub fn new(market: impl Into<String>, amount: Decimal, price: Decimal) -> Self {
        Self {
            market: market.into(),
            amount,
            price,
        }
    }
}

/// Acknowledgement for a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderPlaced {
    #[serde(rename = "orderId", deserialize_with = "string_or_number")]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
struct CancelOrderParams<'a> {
    #[serde(rename = "orderId")]
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
struct MarketParams<'a> {
    market: &'a str,
}

/// Unwrap a `{"success":1,"response":{...}}` envelope when present.
fn payload(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("response").is_some_and(Value::is_object) => {
            map.remove("response").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn parse_order_placed(method: &str, body: Value) -> ClientResult<OrderPlaced> {
    serde_json::from_value(payload(body)).map_err(|e| ClientError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

impl BitGrailClient {
    /// Account balances.
    pub async fn balances(&self) -> ClientResult<Value> {
        self.invoke(BALANCES, Params::new()).await
    }

    /// Place a limit buy order.
    pub async fn buy_order(&self, order: &OrderRequest) -> ClientResult<OrderPlaced> {
        let body = self.invoke_with(BUY_ORDER, order).await?;
        parse_order_placed(BUY_ORDER, body)
    }

    /// Place a limit sell order.
    pub async fn sell_order(&self, order: &OrderRequest) -> ClientResult<OrderPlaced> {
        let body = self.invoke_with(SELL_ORDER, order).await?;
        parse_order_placed(SELL_ORDER, body)
    }

    pub async fn cancel_order(&self, order_id: &str) -> ClientResult<Value> {
        self.invoke_with(CANCEL_ORDER, &CancelOrderParams { order_id })
            .await
    }

    /// Open orders, optionally filtered to one market.
    pub async fn open_orders(&self, market: Option<&str>) -> ClientResult<Value> {
        match market {
            Some(market) => self.invoke_with(OPEN_ORDERS, &MarketParams { market }).await,
            None => self.invoke(OPEN_ORDERS, Params::new()).await,
        }
    }

    pub async fn last_trades(&self, market: &str) -> ClientResult<Value> {
        self.invoke_with(LAST_TRADES, &MarketParams { market }).await
    }
}
