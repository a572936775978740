use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use bitcoin::Network;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use vault_core::api::{BuiltTransaction, OrderResponse, SighashResponse, SignedSighash, StatusResponse, VaultResponse};
use vault_core::{Attestation, ErrorKind};
use vault_oracle::testing::{regtest_address, CountingCompiler, FakeExplorer, StaticPriceSource};
use vault_oracle::{OracleConfig, OracleKey, VaultCoordinator};

use super::*;
use crate::api::health::HealthResponse;

struct Node {
    server: TestServer,
    coordinator: Arc<VaultCoordinator>,
    explorer: Arc<FakeExplorer>,
}

fn node() -> Node {
    let explorer = Arc::new(FakeExplorer::new());
    let coordinator = Arc::new(VaultCoordinator::new(
        OracleConfig::default(),
        Arc::new(OracleKey::generate()),
        explorer.clone(),
        Arc::new(CountingCompiler::new(Network::Regtest)),
        Arc::new(StaticPriceSource::new("primary", Decimal::from_str("65000.50").unwrap())),
        Arc::new(StaticPriceSource::failing("fallback")),
    ));
    let server = TestServer::new(create_router(AppState::in_memory(coordinator.clone()))).unwrap();
    Node {
        server,
        coordinator,
        explorer,
    }
}

/// Node with a compiled covenant holding one 100 000 sat coin.
async fn funded_node() -> Node {
    let node = node();
    let covenant = node.coordinator.initialize().await.unwrap();
    node.explorer.fund(&covenant.address, Network::Regtest, 100_000);
    node
}

fn error_kind(body: &Value) -> ErrorKind {
    serde_json::from_value(body["kind"].clone()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let node = node();
    let response = node.server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.authority, node.coordinator.authority());
    assert!(!health.covenant_ready);
}

#[tokio::test]
async fn test_get_vault() {
    let node = funded_node().await;
    let response = node.server.get("/vault").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["vault"]["p2tr"].as_str().unwrap().starts_with("bcrt1p"));
    assert_eq!(body["vault"]["cmr"].as_str().unwrap().len(), 64);

    let vault: VaultResponse = response.json();
    assert_eq!(vault.vault.balance_sats, 100_000);
    assert_eq!(vault.vault.authority, node.coordinator.authority());
}

#[tokio::test]
async fn test_attestation_endpoint() {
    let node = node();
    let response = node.server.get("/attest").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["asset"], "BTC/USD");
    assert_eq!(body["witness"]["PRICE"]["type"], "u32");

    let attestation: Attestation = response.json();
    assert_eq!(attestation.witness.price_cents, 6_500_050);
    assert!(attestation.verify());
}

#[tokio::test]
async fn test_withdrawal_over_http() {
    let node = funded_node().await;
    let to = regtest_address(2);

    let response = node
        .server
        .post("/vault/sighash")
        .json(&json!({ "to": to, "fee_sats": 1000 }))
        .await;
    response.assert_status_ok();
    let SighashResponse { sighash } = response.json();

    let response = node.server.post("/vault/sign").json(&json!({ "sighash": sighash })).await;
    response.assert_status_ok();
    let signed: SignedSighash = response.json();
    assert_eq!(signed.witness.price_cents, 6_500_050);

    let response = node
        .server
        .post("/vault/tx")
        .json(&json!({ "to": to, "witness": signed.witness, "fee_sats": 1000 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["signedHex"].is_string());
    let built: BuiltTransaction = response.json();
    assert_eq!(built.amount, 99_000);
    assert_eq!(built.fee, 1_000);
    assert_eq!(built.to, to);
}

#[tokio::test]
async fn test_post_vault_is_sign_alias() {
    let node = node();
    let sighash = "ab".repeat(32);
    let response = node.server.post("/vault").json(&json!({ "sighash": sighash })).await;
    response.assert_status_ok();
    let signed: SignedSighash = response.json();
    assert_eq!(signed.price, Decimal::from_str("65000.50").unwrap());
}

#[tokio::test]
async fn test_spend_before_compile_is_unavailable() {
    let node = node();
    let response = node
        .server
        .post("/vault/sighash")
        .expect_failure()
        .json(&json!({ "to": regtest_address(2) }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_kind(&response.json()), ErrorKind::CovenantUninitialized);
}

#[tokio::test]
async fn test_insufficient_funds_is_bad_request() {
    let node = funded_node().await;
    let response = node
        .server
        .post("/vault/sighash")
        .expect_failure()
        .json(&json!({ "to": regtest_address(2), "fee_sats": 100_000 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(error_kind(&body), ErrorKind::InsufficientFunds);
    let cause: vault_core::VaultError = serde_json::from_value(body["cause"].clone()).unwrap();
    assert_eq!(
        cause,
        vault_core::VaultError::InsufficientFunds {
            value_sats: 100_000,
            fee_sats: 100_000
        }
    );
}

#[tokio::test]
async fn test_malformed_witness_rejected() {
    let node = funded_node().await;
    let response = node
        .server
        .post("/vault/tx")
        .expect_failure()
        .json(&json!({
            "to": regtest_address(2),
            "witness": { "SIG": { "type": "u32", "value": "1" }, "PRICE": { "type": "u32", "value": "1" } }
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(&response.json()), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_explorer_outage_is_bad_gateway() {
    let node = funded_node().await;
    node.explorer.set_failing(true);
    let response = node
        .server
        .post("/vault/sighash")
        .expect_failure()
        .json(&json!({ "to": regtest_address(2) }))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(error_kind(&response.json()), ErrorKind::UpstreamUnavailable);
    assert_eq!(response.header("retry-after"), "5");

    let response = node.server.get("/vault").expect_failure().await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(error_kind(&response.json()), ErrorKind::UpstreamUnavailable);
}

#[tokio::test]
async fn test_orders_and_status() {
    let node = funded_node().await;

    let response = node
        .server
        .post("/orders")
        .json(&json!({ "make": { "amount": 2, "price": 100 } }))
        .await;
    response.assert_status_ok();
    node.server
        .post("/orders")
        .json(&json!({ "make": { "amount": 3, "price": 100 } }))
        .await
        .assert_status_ok();

    let response = node
        .server
        .post("/orders")
        .json(&json!({ "take": { "amount": 1, "price": 90 } }))
        .await;
    let took: OrderResponse = response.json();
    assert_eq!(took, OrderResponse::Took { price: 90, amount: 1, total: 1 });

    let response = node.server.get("/").await;
    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.status.tip.height, 1);

    let made = status
        .status
        .orders
        .iter()
        .find(|o| o.key == vec!["made".to_string(), "100".to_string()])
        .unwrap();
    assert_eq!(made.total, 5);
    assert!(status
        .status
        .orders
        .iter()
        .any(|o| o.key == vec!["took".to_string(), "90".to_string()]));
}
