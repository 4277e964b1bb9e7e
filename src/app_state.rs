use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};

use crate::{
    config::Config,
    domain::chain_config::ChainRegistry,
    infrastructure::{
        db::PgPool,
        encryption::SecretCodec,
        rpc_transport::{HttpRpcTransport, RpcTransport},
    },
    repository::{
        InMemoryTransactionRepository, InMemoryWalletRepository, PgTransactionRepository,
        PgWalletRepository, TransactionRepository, WalletRepository,
    },
    service::{blockchain_client::RpcDispatcher, custody::CustodyService},
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub custody: Arc<CustodyService>,
    /// 未配置 DATABASE_URL 时为 None（内存存储）
    pub pool: Option<PgPool>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 使用 HTTP 传输创建应用状态
    pub fn new(config: Config, pool: Option<PgPool>) -> Result<Self> {
        Self::with_transport(config, pool, Arc::new(HttpRpcTransport::new()))
    }

    /// 指定 RPC 传输（测试中替换为脚本化实现）
    pub fn with_transport(
        config: Config,
        pool: Option<PgPool>,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self> {
        let registry = Arc::new(
            ChainRegistry::from_config(&config.chains).context("invalid chain configuration")?,
        );
        let dispatcher = Arc::new(RpcDispatcher::new(
            registry,
            transport,
            Duration::from_millis(config.custody.rpc_timeout_ms),
        ));
        let codec =
            SecretCodec::new(config.custody.kdf_iterations).context("invalid KDF configuration")?;

        let (wallets, transactions): (Arc<dyn WalletRepository>, Arc<dyn TransactionRepository>) =
            match &pool {
                Some(pool) => (
                    Arc::new(PgWalletRepository::new(pool.clone())),
                    Arc::new(PgTransactionRepository::new(pool.clone())),
                ),
                None => {
                    tracing::warn!("DATABASE_URL 未配置，使用内存存储（重启后数据丢失）");
                    (
                        Arc::new(InMemoryWalletRepository::new()),
                        Arc::new(InMemoryTransactionRepository::new()),
                    )
                }
            };

        let custody = CustodyService::new(dispatcher, codec, wallets, transactions)
            .with_history_limit(config.custody.history_limit);

        Ok(Self {
            custody: Arc::new(custody),
            pool,
            config: Arc::new(config),
        })
    }

    pub fn storage_backend(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}
