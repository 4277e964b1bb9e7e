// 交易记录 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::RepositoryError;
use crate::{domain::TransactionStatus, infrastructure::db::PgPool};

/// 交易记录
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub wallet_id: Uuid,
    /// 广播被拒绝时为空
    pub hash: Option<String>,
    pub from_address: String,
    /// 收款地址（ERC-20 转账时为代币接收方）
    pub to_address: String,
    /// 最小单位的十进制字符串；原生币为 wei，ERC-20 为代币最小单位
    pub value_base_units: String,
    /// ERC-20 合约地址；原生币转账为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub chain_id: u64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// 创建交易参数
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: Uuid,
    pub hash: Option<String>,
    pub from_address: String,
    pub to_address: String,
    pub value_base_units: String,
    pub token_address: Option<String>,
    pub chain_id: u64,
    pub status: TransactionStatus,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn create(&self, tx: NewTransaction) -> Result<TransactionRecord, RepositoryError>;

    async fn find_by_id(&self, tx_id: Uuid) -> Result<Option<TransactionRecord>, RepositoryError>;

    /// 最新的在前
    async fn list_by_wallet(
        &self,
        wallet_id: Uuid,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, RepositoryError>;

    async fn update_status(
        &self,
        tx_id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), RepositoryError>;
}

// ============ PostgreSQL 实现 ============

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    wallet_id: Uuid,
    tx_hash: Option<String>,
    from_address: String,
    to_address: String,
    value_base_units: String,
    token_address: Option<String>,
    chain_id: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(TransactionRecord {
            id: row.id,
            wallet_id: row.wallet_id,
            hash: row.tx_hash,
            from_address: row.from_address,
            to_address: row.to_address,
            value_base_units: row.value_base_units,
            token_address: row.token_address,
            chain_id: u64::try_from(row.chain_id)
                .map_err(|_| RepositoryError::Corrupt(format!("transaction {} has negative chain_id", row.id)))?,
            status: row.status.parse().map_err(RepositoryError::Corrupt)?,
            created_at: row.created_at,
        })
    }
}

const TX_COLUMNS: &str =
    "id, wallet_id, tx_hash, from_address, to_address, value_base_units, token_address, chain_id, status, created_at";

pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn create(&self, tx: NewTransaction) -> Result<TransactionRecord, RepositoryError> {
        let chain_id = i64::try_from(tx.chain_id)
            .map_err(|_| RepositoryError::Corrupt("chain_id out of range".into()))?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO custody_transactions (
                id, wallet_id, tx_hash, from_address, to_address,
                value_base_units, token_address, chain_id, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TX_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(tx.wallet_id)
        .bind(&tx.hash)
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(&tx.value_base_units)
        .bind(&tx.token_address)
        .bind(chain_id)
        .bind(tx.status.to_db_string())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, tx_id: Uuid) -> Result<Option<TransactionRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM custody_transactions WHERE id = $1",
            TX_COLUMNS
        ))
        .bind(tx_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRecord::try_from).transpose()
    }

    async fn list_by_wallet(
        &self,
        wallet_id: Uuid,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM custody_transactions WHERE wallet_id = $1 ORDER BY created_at DESC LIMIT $2",
            TX_COLUMNS
        ))
        .bind(wallet_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRecord::try_from).collect()
    }

    async fn update_status(
        &self,
        tx_id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE custody_transactions SET status = $1 WHERE id = $2")
            .bind(status.to_db_string())
            .bind(tx_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
