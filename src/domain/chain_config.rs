//! 多链配置模块
//!
//! 启动时构建、之后只读的链注册表。每条链至少有一个 RPC 端点，
//! 高流量链（默认以太坊主网）在主端点之后追加公共备用端点。

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    config::ChainsConfig,
    domain::errors::{CustodyError, CustodyResult},
    infrastructure::rpc_selector,
};

/// 链配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// EIP-155 链 ID
    pub chain_id: u64,
    /// 链名称
    pub name: String,
    /// 原生币符号 (ETH, MATIC)
    pub native_symbol: String,
    /// 原生币精度
    pub decimals: u8,
    /// 区块浏览器根地址
    pub explorer_base_url: String,
    /// 有序 RPC 端点，第一个为主端点
    pub rpc_endpoints: Vec<String>,
}

impl ChainConfig {
    /// 主端点（注册表保证非空）
    pub fn primary_endpoint(&self) -> &str {
        self.rpc_endpoints
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// 交易在区块浏览器中的链接
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!(
            "{}/tx/{}",
            self.explorer_base_url.trim_end_matches('/'),
            tx_hash
        )
    }
}

/// 链配置注册表
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: HashMap<u64, Arc<ChainConfig>>,
}

impl ChainRegistry {
    /// 从完整的链配置列表构建注册表
    pub fn new(chains: Vec<ChainConfig>) -> CustodyResult<Self> {
        let mut configs = HashMap::with_capacity(chains.len());

        for chain in chains {
            validate_chain(&chain)?;
            let chain_id = chain.chain_id;
            if configs.insert(chain_id, Arc::new(chain)).is_some() {
                return Err(CustodyError::validation(format!(
                    "duplicate chain id in configuration: {}",
                    chain_id
                )));
            }
        }

        if configs.is_empty() {
            return Err(CustodyError::validation("no chains configured"));
        }

        Ok(Self { configs })
    }

    /// 从配置文件/环境变量构建，应用备用端点策略
    pub fn from_config(config: &ChainsConfig) -> CustodyResult<Self> {
        let chains = config
            .networks
            .iter()
            .map(|network| ChainConfig {
                chain_id: network.chain_id,
                name: network.name.clone(),
                native_symbol: network.native_symbol.clone(),
                decimals: network.decimals,
                explorer_base_url: network.explorer_base_url.clone(),
                rpc_endpoints: rpc_selector::build_endpoint_list(
                    network.chain_id,
                    &network.rpc_url,
                    config.fallback_chain_id,
                    &config.public_backups,
                ),
            })
            .collect();

        let registry = Self::new(chains)?;
        tracing::info!(
            chains = registry.configs.len(),
            fallback_chain_id = config.fallback_chain_id,
            "链注册表已加载"
        );
        Ok(registry)
    }

    /// 按链 ID 解析配置
    pub fn resolve(&self, chain_id: u64) -> CustodyResult<Arc<ChainConfig>> {
        self.configs
            .get(&chain_id)
            .cloned()
            .ok_or(CustodyError::ChainUnsupported(chain_id))
    }

    /// 所有链，按链 ID 升序
    pub fn list(&self) -> Vec<Arc<ChainConfig>> {
        let mut chains: Vec<_> = self.configs.values().cloned().collect();
        chains.sort_by_key(|c| c.chain_id);
        chains
    }
}

fn validate_chain(chain: &ChainConfig) -> CustodyResult<()> {
    if chain.rpc_endpoints.is_empty() {
        return Err(CustodyError::validation(format!(
            "chain {} has no rpc endpoints",
            chain.chain_id
        )));
    }
    for endpoint in &chain.rpc_endpoints {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(CustodyError::validation(format!(
                "chain {} has a non-http rpc endpoint",
                chain.chain_id
            )));
        }
    }
    if chain.name.trim().is_empty() || chain.native_symbol.trim().is_empty() {
        return Err(CustodyError::validation(format!(
            "chain {} is missing a name or symbol",
            chain.chain_id
        )));
    }
    Ok(())
}
