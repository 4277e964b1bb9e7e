//! Repository 抽象层
//!
//! 托管服务只依赖 trait；生产环境使用 Postgres 实现，
//! 未配置数据库（开发/测试）时使用内存实现。

pub mod memory;
pub mod transaction_repository;
pub mod wallet_repository;

use thiserror::Error;

use crate::domain::errors::CustodyError;

pub use memory::{InMemoryTransactionRepository, InMemoryWalletRepository};
pub use transaction_repository::{
    NewTransaction, PgTransactionRepository, TransactionRecord, TransactionRepository,
};
pub use wallet_repository::{NewWallet, PgWalletRepository, WalletRecord, WalletRepository};

/// 存储层错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// 唯一约束冲突（如 owner + address）
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("record not found")]
    NotFound,

    /// 存储中的数据无法还原为领域模型
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::UniqueViolation
            }
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<RepositoryError> for CustodyError {
    fn from(err: RepositoryError) -> Self {
        CustodyError::Storage(err.to_string())
    }
}
