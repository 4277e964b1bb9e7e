//! 测试辅助模块
//! 脚本化 RPC 传输、内存存储的托管服务、本地 JSON-RPC 模拟节点

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use keyvault_core::{
    config::{
        ChainsConfig, Config, CustodyConfig, DatabaseConfig, LoggingConfig, NetworkConfig,
        ServerConfig,
    },
    domain::{
        chain_config::{ChainConfig, ChainRegistry},
        errors::RpcError,
    },
    infrastructure::{encryption::SecretCodec, pbkdf2, rpc_transport::RpcTransport},
    repository::{
        InMemoryTransactionRepository, InMemoryWalletRepository, NewTransaction, RepositoryError,
        TransactionRecord, TransactionRepository, WalletRepository,
    },
    domain::transaction_status::TransactionStatus,
    service::{blockchain_client::RpcDispatcher, custody::CustodyService},
};
use serde_json::{json, Value};

/// Hardhat 默认助记词
pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";
/// 上述助记词 m/44'/60'/0'/0/0 对应地址
pub const TEST_MNEMONIC_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
/// Hardhat 第一个账户的私钥（与助记词派生出的地址相同）
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const TX_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
/// 主网 USDC 合约
pub const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 脚本化传输
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type Handler = dyn Fn(&str, &Value) -> Result<Value, RpcError> + Send + Sync;

pub struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&str, &Value) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_of(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m == method)
            .count()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, endpoint: &str, payload: &Value) -> Result<Value, RpcError> {
        let method = payload["method"].as_str().unwrap_or_default().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), method));
        (self.handler)(endpoint, payload)
    }
}

pub fn rpc_ok(result: Value) -> Result<Value, RpcError> {
    Ok(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

pub fn rpc_node_error(message: &str) -> Result<Value, RpcError> {
    Ok(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": -32000, "message": message }
    }))
}

/// 一个行为正常的 EVM 节点：EIP-1559 链，余额 1 ETH，nonce 为 0
pub fn healthy_node(_endpoint: &str, payload: &Value) -> Result<Value, RpcError> {
    match payload["method"].as_str().unwrap_or_default() {
        "eth_getBalance" => rpc_ok(json!("0xde0b6b3a7640000")),
        "eth_getTransactionCount" => rpc_ok(json!("0x0")),
        "eth_getBlockByNumber" => rpc_ok(json!({ "number": "0x10", "baseFeePerGas": "0x3b9aca00" })),
        "eth_gasPrice" => rpc_ok(json!("0x4a817c800")),
        "eth_sendRawTransaction" => rpc_ok(json!(TX_HASH)),
        // 51000
        "eth_estimateGas" => rpc_ok(json!("0xc738")),
        "eth_getTransactionReceipt" => rpc_ok(json!({
            "transactionHash": TX_HASH,
            "blockNumber": "0x11",
            "gasUsed": "0x5208",
            "status": "0x1"
        })),
        other => rpc_node_error(&format!("method {} not supported", other)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 服务构建
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn ethereum(endpoints: &[&str]) -> ChainConfig {
    ChainConfig {
        chain_id: 1,
        name: "Ethereum".into(),
        native_symbol: "ETH".into(),
        decimals: 18,
        explorer_base_url: "https://etherscan.io".into(),
        rpc_endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    }
}

/// 内存存储的托管服务，使用最低允许的 KDF 迭代次数以加快测试
pub fn test_service(transport: Arc<dyn RpcTransport>) -> CustodyService {
    test_service_with(
        transport,
        Arc::new(InMemoryWalletRepository::new()),
        Arc::new(InMemoryTransactionRepository::new()),
    )
}

/// 同上，但由调用方提供存储（可在测试中直接写入或注入故障）
pub fn test_service_with(
    transport: Arc<dyn RpcTransport>,
    wallets: Arc<dyn WalletRepository>,
    transactions: Arc<dyn TransactionRepository>,
) -> CustodyService {
    let registry = ChainRegistry::new(vec![ethereum(&["http://node.example"])]).unwrap();
    let dispatcher = RpcDispatcher::new(
        Arc::new(registry),
        transport,
        Duration::from_millis(500),
    );
    CustodyService::new(
        Arc::new(dispatcher),
        test_codec(),
        wallets,
        transactions,
    )
}

pub fn test_codec() -> SecretCodec {
    SecretCodec::new(pbkdf2::MIN_ITERATIONS).unwrap()
}

/// 写入总是失败的交易存储，读操作返回空
pub struct UnavailableTransactionRepository;

#[async_trait]
impl TransactionRepository for UnavailableTransactionRepository {
    async fn create(&self, _tx: NewTransaction) -> Result<TransactionRecord, RepositoryError> {
        Err(RepositoryError::Database("connection reset by peer".into()))
    }

    async fn find_by_id(&self, _tx_id: uuid::Uuid) -> Result<Option<TransactionRecord>, RepositoryError> {
        Ok(None)
    }

    async fn list_by_wallet(
        &self,
        _wallet_id: uuid::Uuid,
        _limit: u32,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn update_status(
        &self,
        _tx_id: uuid::Uuid,
        _status: TransactionStatus,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::NotFound)
    }
}

/// 链 1 使用 `primary`，并以 `backups` 作为公共备用端点
pub fn test_config(primary: &str, backups: &[&str]) -> Config {
    Config {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
        },
        logging: LoggingConfig {
            level: "info".into(),
            format: "text".into(),
        },
        database: DatabaseConfig {
            url: None,
            ..DatabaseConfig::default()
        },
        custody: CustodyConfig {
            kdf_iterations: pbkdf2::MIN_ITERATIONS,
            rpc_timeout_ms: 2_000,
            history_limit: 100,
        },
        chains: ChainsConfig {
            fallback_chain_id: 1,
            public_backups: backups.iter().map(|b| b.to_string()).collect(),
            networks: vec![NetworkConfig {
                chain_id: 1,
                name: "Ethereum".into(),
                native_symbol: "ETH".into(),
                decimals: 18,
                explorer_base_url: "https://etherscan.io".into(),
                rpc_url: primary.to_string(),
            }],
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 本地模拟节点
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum MockReply {
    Json(Value),
    Status(StatusCode),
}

pub struct MockNode {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl MockNode {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// 在 127.0.0.1 随机端口启动一个 JSON-RPC 节点
pub async fn spawn_mock_node<F>(handler: F) -> MockNode
where
    F: Fn(&Value) -> MockReply + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new().route(
        "/",
        post({
            let handler = handler.clone();
            let hits = hits.clone();
            move |Json(payload): Json<Value>| {
                let handler = handler.clone();
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    match handler(&payload) {
                        MockReply::Json(body) => (StatusCode::OK, Json(body)).into_response(),
                        MockReply::Status(status) => status.into_response(),
                    }
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockNode {
        url: format!("http://{}", addr),
        hits,
    }
}

/// 返回一个没有监听者的本地地址（连接会被拒绝）
pub async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
