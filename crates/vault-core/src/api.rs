//! Request and response bodies of the oracle's HTTP surface.
//!
//! Field names follow the wire format the web frontend already speaks
//! (`fee_sats`, `signedHex`, ...).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bytes::Sighash;
use crate::error::{ErrorKind, VaultError};
use crate::types::{ChainTip, VaultInfo};
use crate::witness::SpendWitness;

/// Default fee when a request omits `fee_sats`.
pub const DEFAULT_FEE_SATS: u64 = 1000;

/// `GET /vault`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultResponse {
    pub vault: VaultInfo,
}

/// `POST /vault/sighash`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SighashRequest {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_sats: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SighashResponse {
    pub sighash: Sighash,
}

/// `POST /vault` and `POST /vault/sign`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub sighash: Sighash,
}

/// Oracle signature over a client-supplied sighash, bound to a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSighash {
    /// Price observed at signing time (display form).
    pub price: Decimal,
    /// `PRICE` inside carries the same price in integer cents.
    pub witness: SpendWitness,
}

/// `POST /vault/tx`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTxRequest {
    pub to: String,
    pub witness: SpendWitness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_sats: Option<u64>,
}

/// Fully signed spend, ready for broadcast by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltTransaction {
    #[serde(rename = "signedHex")]
    pub signed_hex: String,
    /// Satoshis paid to `to`.
    pub amount: u64,
    /// Satoshis left to miners.
    pub fee: u64,
    pub to: String,
}

/// One order counter from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotal {
    pub key: Vec<String>,
    pub total: u64,
}

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub tip: ChainTip,
    pub orders: Vec<OrderTotal>,
}

/// Amount and price of a make/take order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerms {
    #[serde(default = "one")]
    pub amount: u64,
    #[serde(default = "one")]
    pub price: u64,
}

fn one() -> u64 {
    1
}

/// `POST /orders`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRequest {
    Make(OrderTerms),
    Take(OrderTerms),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderResponse {
    Made { price: u64, amount: u64, total: u64 },
    Took { price: u64, amount: u64, total: u64 },
}

/// Error body returned by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    pub kind: ErrorKind,
    /// Structured error, decodable back into [`VaultError`].
    pub cause: VaultError,
}

impl From<&VaultError> for ErrorBody {
    fn from(err: &VaultError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
            cause: err.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fee_is_optional() {
        let req: SighashRequest = serde_json::from_value(json!({ "to": "bcrt1dest" })).unwrap();
        assert_eq!(req.fee_sats, None);
    }

    #[test]
    fn test_built_transaction_field_names() {
        let built = BuiltTransaction {
            signed_hex: "00".into(),
            amount: 99_000,
            fee: 1_000,
            to: "bcrt1dest".into(),
        };
        let value = serde_json::to_value(&built).unwrap();
        assert_eq!(value["signedHex"], "00");
        assert_eq!(value["amount"], 99_000);
    }

    #[test]
    fn test_order_request_shape() {
        let req: OrderRequest = serde_json::from_value(json!({ "make": { "amount": 3 } })).unwrap();
        assert_eq!(req, OrderRequest::Make(OrderTerms { amount: 3, price: 1 }));
        assert!(serde_json::from_value::<OrderRequest>(json!({ "make": {}, "take": {} })).is_err());
    }
}
