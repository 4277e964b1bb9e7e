//! keyvault-core - 信封加密的钱包托管与多链 EVM 调度
//!
//! 用户密码经 PBKDF2 派生密钥，AES-256-GCM 加密助记词/私钥后入库；
//! 转账时解密、重新派生并校验地址，签名后通过多端点故障转移广播。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{
            AccountDeriver, ChainConfig, ChainRegistry, CustodyError, CustodyResult, RpcError,
            Secret, SecretKind, TransactionStatus,
        },
        error::{AppError, AppErrorCode},
        infrastructure::encryption::{SealedSecret, SecretCodec},
        service::{CustodyService, FeeSuggestion, RpcDispatcher},
    };
}
