// 托管服务 - 钱包秘密加密托管与多链转账编排
// 钱包操作见 service::wallets，转账与交易记录见 service::tx
// PBKDF2/AES 计算放在 spawn_blocking 中执行，避免阻塞请求线程

use std::sync::Arc;

use ethers::types::U256;
use serde_json::Value;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    domain::{
        chain_config::{ChainConfig, ChainRegistry},
        derivation::AccountDeriver,
        errors::{CustodyError, CustodyResult},
    },
    infrastructure::encryption::{SealedSecret, SecretCodec},
    repository::{TransactionRepository, WalletRecord, WalletRepository},
    service::{
        blockchain_client::{RpcDispatcher, TokenBalanceEntry},
        gas_estimator::FeeSuggestion,
    },
};

/// 交易历史默认返回条数
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// 单次查询上限
pub const MAX_HISTORY_LIMIT: u32 = 1_000;

pub struct CustodyService {
    pub(crate) registry: Arc<ChainRegistry>,
    pub(crate) dispatcher: Arc<RpcDispatcher>,
    pub(crate) codec: Arc<SecretCodec>,
    pub(crate) deriver: AccountDeriver,
    pub(crate) wallets: Arc<dyn WalletRepository>,
    pub(crate) transactions: Arc<dyn TransactionRepository>,
    pub(crate) history_limit: u32,
}

impl CustodyService {
    pub fn new(
        dispatcher: Arc<RpcDispatcher>,
        codec: SecretCodec,
        wallets: Arc<dyn WalletRepository>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self {
            registry: dispatcher.registry().clone(),
            dispatcher,
            codec: Arc::new(codec),
            deriver: AccountDeriver::new(),
            wallets,
            transactions,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        self
    }

    pub fn dispatcher(&self) -> &Arc<RpcDispatcher> {
        &self.dispatcher
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 链查询透传
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn list_chains(&self) -> Vec<Arc<ChainConfig>> {
        self.registry.list()
    }

    pub fn resolve_chain(&self, chain_id: u64) -> CustodyResult<Arc<ChainConfig>> {
        self.registry.resolve(chain_id)
    }

    pub async fn get_balance(&self, chain_id: u64, address: &str) -> CustodyResult<U256> {
        self.dispatcher.get_balance(chain_id, address).await
    }

    pub async fn get_fee_suggestion(&self, chain_id: u64) -> CustodyResult<FeeSuggestion> {
        self.dispatcher.get_fee_suggestion(chain_id).await
    }

    pub async fn broadcast_raw(&self, chain_id: u64, signed_tx: &[u8]) -> CustodyResult<String> {
        self.dispatcher.broadcast_raw(chain_id, signed_tx).await
    }

    pub async fn get_erc20_balances(
        &self,
        chain_id: u64,
        owner: &str,
        token_addresses: &[String],
    ) -> CustodyResult<Vec<TokenBalanceEntry>> {
        self.dispatcher
            .get_erc20_balances(chain_id, owner, token_addresses)
            .await
    }

    pub async fn proxy(&self, chain_id: u64, payload: Value) -> CustodyResult<Value> {
        self.dispatcher.proxy(chain_id, payload).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 内部辅助
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub(crate) async fn seal_secret(
        &self,
        plaintext: Zeroizing<String>,
        password: &str,
    ) -> CustodyResult<SealedSecret> {
        let codec = self.codec.clone();
        let password = Zeroizing::new(password.to_string());

        tokio::task::spawn_blocking(move || codec.seal(plaintext.as_bytes(), &password))
            .await
            .map_err(|e| CustodyError::internal(format!("seal task failed: {}", e)))?
    }

    pub(crate) async fn unseal_secret(
        &self,
        sealed: SealedSecret,
        password: &str,
    ) -> CustodyResult<Zeroizing<String>> {
        let codec = self.codec.clone();
        let password = Zeroizing::new(password.to_string());

        tokio::task::spawn_blocking(move || codec.unseal_string(&sealed, &password))
            .await
            .map_err(|e| CustodyError::internal(format!("unseal task failed: {}", e)))?
    }

    /// 钱包必须属于 owner，否则一律视为不存在
    pub(crate) async fn owned_wallet(
        &self,
        owner_id: Uuid,
        wallet_id: Uuid,
    ) -> CustodyResult<WalletRecord> {
        self.wallets
            .find_by_id(wallet_id)
            .await?
            .filter(|w| w.owner_id == owner_id)
            .ok_or(CustodyError::WalletNotFound)
    }
}

pub(crate) fn validate_password(password: &str) -> CustodyResult<()> {
    if password.is_empty() {
        return Err(CustodyError::validation("password is required"));
    }
    Ok(())
}
