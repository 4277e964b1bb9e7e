//! 托管核心错误类型
//!
//! 领域层与服务层统一返回 `CustodyError`，HTTP 层再映射为 `AppError`。
//! 错误消息中不得出现明文、密码或 KDF 参数。

use thiserror::Error;
use uuid::Uuid;

/// 上游 JSON-RPC 错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("rpc request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("rpc transport error at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// 节点拒绝广播（nonce 过低、余额不足等），消息原样透传
    #[error("transaction rejected by node: {0}")]
    RejectedByNode(String),

    /// 读请求返回 JSON-RPC error 对象
    #[error("rpc node error {code}: {message}")]
    NodeError { code: i64, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("all {attempts} rpc providers failed for chain {chain_id}: {last_error}")]
    AllProvidersExhausted {
        chain_id: u64,
        attempts: usize,
        last_error: String,
    },
}

/// 托管服务错误
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("validation error: {0}")]
    Validation(String),

    /// 密码错误与密文篡改共用同一个错误，避免形成判定预言机
    #[error("invalid password")]
    AuthenticationFailed,

    #[error("invalid secret format: expected a 0x-prefixed 64-hex private key or a BIP-39 mnemonic")]
    InvalidSecretFormat,

    #[error("wallet {address} already exists for this owner")]
    DuplicateWallet { address: String },

    #[error("unsupported chain id: {0}")]
    ChainUnsupported(u64),

    #[error("wallet not found")]
    WalletNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("stored address does not match derived address for wallet {wallet_id}")]
    IntegrityViolation { wallet_id: Uuid },

    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// 已签名交易广播结果未知（超时、传输失败等），交易可能已进入内存池
    #[error("broadcast of transaction {tx_hash} is unconfirmed: {source}")]
    BroadcastUnconfirmed {
        tx_hash: String,
        transaction_id: Option<Uuid>,
        #[source]
        source: RpcError,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CustodyResult<T> = Result<T, CustodyError>;

impl CustodyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
