//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{net::SocketAddr, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    infrastructure::{pbkdf2, rpc_selector},
    service::blockchain_client::DEFAULT_ATTEMPT_TIMEOUT_MS,
};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub custody: CustodyConfig,
    #[serde(default)]
    pub chains: ChainsConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 数据库配置（未配置 url 时使用内存存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// 托管参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    /// PBKDF2 迭代次数
    pub kdf_iterations: u32,
    /// 单个 RPC 端点的请求超时
    pub rpc_timeout_ms: u64,
    /// 交易历史默认条数
    pub history_limit: u32,
}

/// 链配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    /// 拥有公共备用端点的链
    pub fallback_chain_id: u64,
    pub public_backups: Vec<String>,
    pub networks: Vec<NetworkConfig>,
}

/// 单条链
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub native_symbol: String,
    pub decimals: u8,
    pub explorer_base_url: String,
    pub rpc_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            max_connections: std::env::var("DB_MAX_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            min_connections: std::env::var("DB_MIN_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            acquire_timeout_secs: std::env::var("DB_ACQ_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: std::env::var("KDF_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(pbkdf2::DEFAULT_ITERATIONS),
            rpc_timeout_ms: std::env::var("RPC_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_MS),
            history_limit: std::env::var("TX_HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        }
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        let public_backups = std::env::var("RPC_PUBLIC_BACKUPS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(rpc_selector::default_public_backups);

        Self {
            fallback_chain_id: std::env::var("FALLBACK_CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            public_backups,
            networks: default_networks(),
        }
    }
}

/// 默认链表：(chain_id, 名称, 符号, 浏览器, RPC 环境变量, Alchemy 子域, 公共默认端点)
const DEFAULT_NETWORKS: &[(u64, &str, &str, &str, &str, &str, &str)] = &[
    (1, "Ethereum", "ETH", "https://etherscan.io", "ETHEREUM_RPC_URL", "eth-mainnet", "https://cloudflare-eth.com"),
    (10, "Optimism", "ETH", "https://optimistic.etherscan.io", "OPTIMISM_RPC_URL", "opt-mainnet", "https://mainnet.optimism.io"),
    (137, "Polygon", "MATIC", "https://polygonscan.com", "POLYGON_RPC_URL", "polygon-mainnet", "https://polygon-rpc.com"),
    (8453, "Base", "ETH", "https://basescan.org", "BASE_RPC_URL", "base-mainnet", "https://mainnet.base.org"),
    (42161, "Arbitrum", "ETH", "https://arbiscan.io", "ARBITRUM_RPC_URL", "arb-mainnet", "https://arb1.arbitrum.io/rpc"),
    (11155111, "Sepolia", "ETH", "https://sepolia.etherscan.io", "SEPOLIA_RPC_URL", "eth-sepolia", "https://rpc.sepolia.org"),
];

/// 从环境变量构建默认链表
pub fn default_networks() -> Vec<NetworkConfig> {
    let alchemy_key = std::env::var("ALCHEMY_API_KEY").ok();

    DEFAULT_NETWORKS
        .iter()
        .map(|&(chain_id, name, symbol, explorer, env_key, alchemy_slug, public_default)| {
            NetworkConfig {
                chain_id,
                name: name.to_string(),
                native_symbol: symbol.to_string(),
                decimals: 18,
                explorer_base_url: explorer.to_string(),
                rpc_url: resolve_rpc_url(
                    std::env::var(env_key).ok(),
                    alchemy_key.as_deref(),
                    alchemy_slug,
                    public_default,
                ),
            }
        })
        .collect()
}

/// 端点优先级：链专属环境变量 > Alchemy > 公共默认端点
pub fn resolve_rpc_url(
    explicit: Option<String>,
    alchemy_key: Option<&str>,
    alchemy_slug: &str,
    public_default: &str,
) -> String {
    if let Some(url) = explicit.filter(|u| !u.trim().is_empty()) {
        return url.trim().to_string();
    }
    match alchemy_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => format!("https://{}.g.alchemy.com/v2/{}", alchemy_slug, key),
        None => public_default.to_string(),
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            custody: CustodyConfig::default(),
            chains: ChainsConfig::default(),
        })
    }

    /// 从配置文件加载配置（缺省的段落回退到环境变量）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR is not a socket address: {}", self.server.bind_addr))?;

        // 验证数据库URL格式
        if let Some(url) = &self.database.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
            }
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if !pbkdf2::iterations_in_range(self.custody.kdf_iterations) {
            anyhow::bail!(
                "KDF_ITERATIONS must be between {} and {}",
                pbkdf2::MIN_ITERATIONS,
                pbkdf2::MAX_ITERATIONS
            );
        }

        if self.custody.rpc_timeout_ms == 0 {
            anyhow::bail!("RPC_TIMEOUT_MS must be greater than 0");
        }

        if self.chains.networks.is_empty() {
            anyhow::bail!("at least one chain must be configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_networks_cover_supported_chains() {
        let networks = default_networks();
        let ids: Vec<u64> = networks.iter().map(|n| n.chain_id).collect();
        assert_eq!(ids, vec![1, 10, 137, 8453, 42161, 11155111]);

        let polygon = networks.iter().find(|n| n.chain_id == 137).unwrap();
        assert_eq!(polygon.native_symbol, "MATIC");
        assert!(networks.iter().all(|n| n.decimals == 18));
    }

    #[test]
    fn test_resolve_rpc_url_priority() {
        assert_eq!(
            resolve_rpc_url(
                Some("https://custom.example".into()),
                Some("key"),
                "eth-mainnet",
                "https://cloudflare-eth.com"
            ),
            "https://custom.example"
        );
        assert_eq!(
            resolve_rpc_url(None, Some("key"), "eth-mainnet", "https://cloudflare-eth.com"),
            "https://eth-mainnet.g.alchemy.com/v2/key"
        );
        assert_eq!(
            resolve_rpc_url(Some("  ".into()), None, "eth-mainnet", "https://cloudflare-eth.com"),
            "https://cloudflare-eth.com"
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind_addr = "127.0.0.1:9090"

[logging]
level = "debug"
format = "json"

[database]
max_connections = 20
min_connections = 5
acquire_timeout_secs = 30

[custody]
kdf_iterations = 400000
rpc_timeout_ms = 3000
history_limit = 50

[chains]
fallback_chain_id = 1
public_backups = ["https://backup.example"]

[[chains.networks]]
chain_id = 1
name = "Ethereum"
native_symbol = "ETH"
decimals = 18
explorer_base_url = "https://etherscan.io"
rpc_url = "https://primary.example"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.custody.kdf_iterations, 400_000);
        assert_eq!(config.chains.networks.len(), 1);
        assert_eq!(config.chains.public_backups, vec!["https://backup.example"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::from_env().unwrap();
        config.server.bind_addr = "0.0.0.0:8088".into();
        config.logging.level = "info".into();
        config.logging.format = "text".into();
        config.database.url = None;
        config.custody.kdf_iterations = pbkdf2::DEFAULT_ITERATIONS;
        config.custody.rpc_timeout_ms = DEFAULT_ATTEMPT_TIMEOUT_MS;
        assert!(config.validate().is_ok());

        let mut weak = config.clone();
        weak.custody.kdf_iterations = 10_000;
        assert!(weak.validate().is_err());

        let mut bad_db = config.clone();
        bad_db.database.url = Some("mysql://localhost/db".into());
        assert!(bad_db.validate().is_err());

        let mut bad_format = config;
        bad_format.logging.format = "yaml".into();
        assert!(bad_format.validate().is_err());
    }
}
