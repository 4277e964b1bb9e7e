//! Domain 模块
//!
//! 包含核心领域模型：链注册表、秘密、账户派生、交易状态与错误

pub mod chain_config;
pub mod derivation;
pub mod errors;
pub mod secret;
pub mod transaction_status;

// 重新导出常用类型
pub use chain_config::{ChainConfig, ChainRegistry};
pub use derivation::{AccountDeriver, DerivedAccount};
pub use errors::{CustodyError, CustodyResult, RpcError};
pub use secret::{Secret, SecretKind};
pub use transaction_status::TransactionStatus;
