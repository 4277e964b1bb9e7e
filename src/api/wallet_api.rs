//! 托管钱包 API
//!
//! 所有接口都需要 `X-Owner-Id`，只能访问调用方自己的钱包。

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{
        middleware::OwnerContext,
        response::{success_response, success_response_with_message, ApiResult},
    },
    app_state::AppState,
    domain::secret::SecretKind,
    repository::TransactionRecord,
    service::{
        tx::SentTransaction,
        wallets::{ImportedWallet, WalletSummary},
    },
};

#[derive(Deserialize)]
pub struct CreateWalletRequest {
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct CreateWalletResponse {
    pub wallet_id: Uuid,
    pub address: String,
    /// 只返回这一次，请妥善备份
    pub mnemonic: String,
}

#[derive(Deserialize)]
pub struct ImportWalletRequest {
    /// 助记词或 0x 私钥
    pub secret: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct UnlockWalletRequest {
    pub wallet_id: Uuid,
    pub password: String,
}

#[derive(Serialize)]
pub struct UnlockWalletResponse {
    pub address: String,
    pub kind: SecretKind,
    pub secret: String,
}

#[derive(Deserialize)]
pub struct SendNativeRequest {
    pub password: String,
    pub to: String,
    /// 最小单位（wei）的十进制整数
    pub value: String,
    pub chain_id: u64,
}

#[derive(Deserialize)]
pub struct SendTokenRequest {
    pub password: String,
    /// ERC-20 合约地址
    pub token: String,
    pub to: String,
    /// 代币最小单位的十进制整数
    pub amount: String,
    pub chain_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// POST /api/wallets/create
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Json(req): Json<CreateWalletRequest>,
) -> ApiResult<CreateWalletResponse> {
    let created = state
        .custody
        .create_wallet(owner.owner_id, &req.password, req.display_name)
        .await?;

    success_response_with_message(
        CreateWalletResponse {
            wallet_id: created.wallet_id,
            address: created.address.clone(),
            mnemonic: created.mnemonic.to_string(),
        },
        "wallet created; back up the mnemonic now, it will not be shown again",
    )
}

/// POST /api/wallets/import
pub async fn import_wallet(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Json(req): Json<ImportWalletRequest>,
) -> ApiResult<ImportedWallet> {
    let imported = state
        .custody
        .import_wallet(owner.owner_id, &req.secret, &req.password, req.display_name)
        .await?;
    success_response(imported)
}

/// GET /api/wallets
pub async fn list_wallets(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
) -> ApiResult<Vec<WalletSummary>> {
    let wallets = state.custody.list_wallets(owner.owner_id).await?;
    success_response(wallets)
}

/// POST /api/wallets/unlock
///
/// 所有者导出秘密用于备份
pub async fn unlock_wallet(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Json(req): Json<UnlockWalletRequest>,
) -> ApiResult<UnlockWalletResponse> {
    let exported = state
        .custody
        .export_secret(owner.owner_id, req.wallet_id, &req.password)
        .await?;

    success_response(UnlockWalletResponse {
        address: exported.address.clone(),
        kind: exported.kind,
        secret: exported.secret.to_string(),
    })
}

/// POST /api/wallets/:id/send
pub async fn send_native(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Path(wallet_id): Path<Uuid>,
    Json(req): Json<SendNativeRequest>,
) -> ApiResult<SentTransaction> {
    let sent = state
        .custody
        .send_native(
            owner.owner_id,
            wallet_id,
            &req.password,
            &req.to,
            &req.value,
            req.chain_id,
        )
        .await?;
    success_response(sent)
}

/// POST /api/wallets/:id/send-token
pub async fn send_token(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Path(wallet_id): Path<Uuid>,
    Json(req): Json<SendTokenRequest>,
) -> ApiResult<SentTransaction> {
    let sent = state
        .custody
        .send_erc20(
            owner.owner_id,
            wallet_id,
            &req.password,
            &req.token,
            &req.to,
            &req.amount,
            req.chain_id,
        )
        .await?;
    success_response(sent)
}

/// GET /api/wallets/:id/transactions
pub async fn transaction_history(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Path(wallet_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<TransactionRecord>> {
    let history = state
        .custody
        .get_transaction_history(owner.owner_id, wallet_id, query.limit)
        .await?;
    success_response(history)
}

/// POST /api/transactions/:id/refresh
pub async fn refresh_transaction(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<TransactionRecord> {
    let record = state
        .custody
        .refresh_transaction_status(owner.owner_id, transaction_id)
        .await?;
    success_response(record)
}
