//! 多端点回退集成测试
//! 真实 HTTP 传输 + 本地模拟节点

mod common;

use axum::http::StatusCode;
use common::*;
use ethers::types::U256;
use keyvault_core::{
    domain::errors::{CustodyError, RpcError},
    service::gas_estimator::FeeSuggestion,
    AppState,
};
use serde_json::json;

fn balance_reply(payload: &serde_json::Value) -> MockReply {
    MockReply::Json(json!({
        "jsonrpc": "2.0",
        "id": payload["id"].clone(),
        "result": "0xde0b6b3a7640000"
    }))
}

#[tokio::test]
async fn test_balance_falls_back_to_third_endpoint() {
    let a = spawn_mock_node(|_| MockReply::Status(StatusCode::SERVICE_UNAVAILABLE)).await;
    let b = spawn_mock_node(|_| MockReply::Status(StatusCode::BAD_GATEWAY)).await;
    let c = spawn_mock_node(balance_reply).await;

    let state = AppState::new(test_config(&a.url, &[b.url.as_str(), c.url.as_str()]), None).unwrap();
    let balance = state
        .custody
        .get_balance(1, TEST_MNEMONIC_ADDRESS)
        .await
        .unwrap();

    assert_eq!(balance, U256::exp10(18));
    assert_eq!(a.hits(), 1);
    assert_eq!(b.hits(), 1);
    assert_eq!(c.hits(), 1);
}

#[tokio::test]
async fn test_primary_success_skips_backups() {
    let a = spawn_mock_node(balance_reply).await;
    let b = spawn_mock_node(balance_reply).await;

    let state = AppState::new(test_config(&a.url, &[b.url.as_str()]), None).unwrap();
    state
        .custody
        .get_balance(1, TEST_MNEMONIC_ADDRESS)
        .await
        .unwrap();

    assert_eq!(a.hits(), 1);
    assert_eq!(b.hits(), 0);
}

#[tokio::test]
async fn test_refused_connections_exhaust_all_providers() {
    let a = closed_endpoint().await;
    let b = spawn_mock_node(|_| MockReply::Status(StatusCode::INTERNAL_SERVER_ERROR)).await;

    let state = AppState::new(test_config(&a, &[b.url.as_str()]), None).unwrap();
    let err = state
        .custody
        .get_balance(1, TEST_MNEMONIC_ADDRESS)
        .await
        .unwrap_err();

    match err {
        CustodyError::Rpc(RpcError::AllProvidersExhausted {
            chain_id, attempts, ..
        }) => {
            assert_eq!(chain_id, 1);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(b.hits(), 1);
}

#[tokio::test]
async fn test_legacy_chain_fee_suggestion_over_http() {
    let node = spawn_mock_node(|payload| {
        let result = match payload["method"].as_str().unwrap_or_default() {
            // 不带 baseFeePerGas 的区块
            "eth_getBlockByNumber" => json!({ "number": "0x10" }),
            "eth_gasPrice" => json!("0x4a817c800"),
            other => panic!("unexpected method {}", other),
        };
        MockReply::Json(json!({ "jsonrpc": "2.0", "id": payload["id"].clone(), "result": result }))
    })
    .await;

    let state = AppState::new(test_config(&node.url, &[]), None).unwrap();
    let fee = state.custody.get_fee_suggestion(1).await.unwrap();

    assert_eq!(
        fee,
        FeeSuggestion::Legacy {
            gas_price: U256::from(20_000_000_000u64)
        }
    );
    assert_eq!(node.hits(), 2);
}

#[tokio::test]
async fn test_broadcast_rejection_over_http_is_not_retried() {
    let a = spawn_mock_node(|payload| {
        MockReply::Json(json!({
            "jsonrpc": "2.0",
            "id": payload["id"].clone(),
            "error": { "code": -32000, "message": "nonce too low" }
        }))
    })
    .await;
    let b = spawn_mock_node(balance_reply).await;

    let state = AppState::new(test_config(&a.url, &[b.url.as_str()]), None).unwrap();
    let err = state
        .custody
        .broadcast_raw(1, &[0x02, 0xf8, 0x6c])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CustodyError::Rpc(RpcError::RejectedByNode(ref message)) if message == "nonce too low"
    ));
    assert_eq!(a.hits(), 1);
    assert_eq!(b.hits(), 0);
}
