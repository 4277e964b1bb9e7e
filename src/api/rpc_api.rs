//! 链上读写 API：余额、gas、广播、代币余额、原始 JSON-RPC 透传

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use ethers::utils::format_units;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::response::{success_response, ApiResult},
    app_state::AppState,
    error::AppError,
    service::{
        blockchain_client::TokenBalanceEntry,
        gas_estimator::{FeeSuggestion, NATIVE_TRANSFER_GAS_LIMIT},
    },
};

/// 单次批量查询的代币上限
const MAX_TOKENS_PER_REQUEST: usize = 50;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub chain_id: u64,
    pub address: String,
    /// 最小单位（wei）
    pub balance: String,
    pub formatted: String,
    pub symbol: String,
}

#[derive(Debug, Serialize)]
pub struct GasResponse {
    pub chain_id: u64,
    #[serde(rename = "type")]
    pub fee_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    pub gas_limit: u64,
    /// gas_limit × 最高单价
    pub max_fee_wei: String,
}

impl GasResponse {
    fn new(chain_id: u64, fee: FeeSuggestion) -> Self {
        let max_fee_wei = fee.max_fee_for(NATIVE_TRANSFER_GAS_LIMIT).to_string();
        match fee {
            FeeSuggestion::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Self {
                chain_id,
                fee_type: "eip1559",
                gas_price: None,
                max_fee_per_gas: Some(max_fee_per_gas.to_string()),
                max_priority_fee_per_gas: Some(max_priority_fee_per_gas.to_string()),
                gas_limit: NATIVE_TRANSFER_GAS_LIMIT,
                max_fee_wei,
            },
            FeeSuggestion::Legacy { gas_price } => Self {
                chain_id,
                fee_type: "legacy",
                gas_price: Some(gas_price.to_string()),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
                gas_limit: NATIVE_TRANSFER_GAS_LIMIT,
                max_fee_wei,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendRawRequest {
    /// 0x 前缀的已签名交易
    pub signed_tx: String,
}

#[derive(Debug, Serialize)]
pub struct SendRawResponse {
    pub tx_hash: String,
    pub explorer_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenBalancesRequest {
    pub address: String,
    pub token_addresses: Vec<String>,
}

/// GET /api/rpc/:chain_id/balance/:address
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path((chain_id, address)): Path<(u64, String)>,
) -> ApiResult<BalanceResponse> {
    let balance = state.custody.get_balance(chain_id, &address).await?;
    let chain = state.custody.resolve_chain(chain_id)?;

    let formatted =
        format_units(balance, chain.decimals as u32).unwrap_or_else(|_| balance.to_string());

    success_response(BalanceResponse {
        chain_id,
        address,
        balance: balance.to_string(),
        formatted,
        symbol: chain.native_symbol.clone(),
    })
}

/// GET /api/rpc/:chain_id/gas
pub async fn get_gas(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
) -> ApiResult<GasResponse> {
    let fee = state.custody.get_fee_suggestion(chain_id).await?;
    success_response(GasResponse::new(chain_id, fee))
}

/// POST /api/rpc/:chain_id/send
pub async fn send_raw(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
    Json(req): Json<SendRawRequest>,
) -> ApiResult<SendRawResponse> {
    let hex_body = req
        .signed_tx
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| AppError::bad_request("signed_tx must be 0x-prefixed hex"))?;
    let raw = hex::decode(hex_body).map_err(|_| AppError::bad_request("signed_tx is not valid hex"))?;

    let tx_hash = state.custody.broadcast_raw(chain_id, &raw).await?;
    let explorer_url = state.custody.resolve_chain(chain_id)?.explorer_tx_url(&tx_hash);

    success_response(SendRawResponse {
        tx_hash,
        explorer_url,
    })
}

/// POST /api/rpc/:chain_id/token-balances
pub async fn get_token_balances(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
    Json(req): Json<TokenBalancesRequest>,
) -> ApiResult<Vec<TokenBalanceEntry>> {
    if req.token_addresses.len() > MAX_TOKENS_PER_REQUEST {
        return Err(AppError::bad_request(format!(
            "at most {} token addresses per request",
            MAX_TOKENS_PER_REQUEST
        )));
    }

    let entries = state
        .custody
        .get_erc20_balances(chain_id, &req.address, &req.token_addresses)
        .await?;
    success_response(entries)
}

/// POST /api/rpc/:chain_id
///
/// 原始 JSON-RPC 透传，响应不做包装
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let response = state.custody.proxy(chain_id, payload).await?;
    Ok(Json(response))
}
