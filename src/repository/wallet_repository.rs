// 钱包数据访问 Repository

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::RepositoryError;
use crate::infrastructure::{db::PgPool, encryption::SealedSecret};

// ============ 领域模型 ============

/// 托管钱包记录（创建后不可变）
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// EIP-55 校验和地址
    pub address: String,
    pub display_name: String,
    pub sealed_secret: SealedSecret,
    pub created_at: DateTime<Utc>,
}

/// 创建钱包参数
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub owner_id: Uuid,
    pub address: String,
    pub display_name: String,
    pub sealed_secret: SealedSecret,
}

// ============ Repository Trait ============

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// 创建新钱包；(owner_id, address) 冲突时返回 `UniqueViolation`
    async fn create(&self, wallet: NewWallet) -> Result<WalletRecord, RepositoryError>;

    /// 按所有者和地址查询（地址大小写不敏感）
    async fn find_by_owner_and_address(
        &self,
        owner_id: Uuid,
        address: &str,
    ) -> Result<Option<WalletRecord>, RepositoryError>;

    /// 根据 ID 查询钱包
    async fn find_by_id(&self, wallet_id: Uuid) -> Result<Option<WalletRecord>, RepositoryError>;

    /// 列出用户的所有钱包（最新的在前）
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<WalletRecord>, RepositoryError>;
}

// ============ PostgreSQL 实现 ============

#[derive(Debug, FromRow)]
struct WalletRow {
    id: Uuid,
    owner_id: Uuid,
    address: String,
    display_name: String,
    ciphertext: String,
    salt: String,
    iv: String,
    auth_tag: String,
    kdf_iterations: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for WalletRecord {
    type Error = RepositoryError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        let decode = |field: &str, value: &str| {
            STANDARD
                .decode(value)
                .map_err(|_| RepositoryError::Corrupt(format!("wallet {} has invalid {}", row.id, field)))
        };

        let sealed_secret = SealedSecret {
            ciphertext: decode("ciphertext", &row.ciphertext)?,
            salt: decode("salt", &row.salt)?,
            iv: decode("iv", &row.iv)?,
            auth_tag: decode("auth_tag", &row.auth_tag)?,
            kdf_iterations: u32::try_from(row.kdf_iterations).map_err(|_| {
                RepositoryError::Corrupt(format!("wallet {} has invalid kdf_iterations", row.id))
            })?,
        };

        Ok(WalletRecord {
            id: row.id,
            owner_id: row.owner_id,
            address: row.address,
            display_name: row.display_name,
            sealed_secret,
            created_at: row.created_at,
        })
    }
}

const WALLET_COLUMNS: &str = "id, owner_id, address, display_name, ciphertext, salt, iv, auth_tag, kdf_iterations, created_at";

pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn create(&self, wallet: NewWallet) -> Result<WalletRecord, RepositoryError> {
        let kdf_iterations = i32::try_from(wallet.sealed_secret.kdf_iterations)
            .map_err(|_| RepositoryError::Corrupt("kdf_iterations out of range".into()))?;

        let row = sqlx::query_as::<_, WalletRow>(&format!(
            r#"
            INSERT INTO custody_wallets (
                id, owner_id, address, display_name,
                ciphertext, salt, iv, auth_tag, kdf_iterations
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            WALLET_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(wallet.owner_id)
        .bind(&wallet.address)
        .bind(&wallet.display_name)
        .bind(STANDARD.encode(&wallet.sealed_secret.ciphertext))
        .bind(STANDARD.encode(&wallet.sealed_secret.salt))
        .bind(STANDARD.encode(&wallet.sealed_secret.iv))
        .bind(STANDARD.encode(&wallet.sealed_secret.auth_tag))
        .bind(kdf_iterations)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_owner_and_address(
        &self,
        owner_id: Uuid,
        address: &str,
    ) -> Result<Option<WalletRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM custody_wallets WHERE owner_id = $1 AND lower(address) = lower($2)",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WalletRecord::try_from).transpose()
    }

    async fn find_by_id(&self, wallet_id: Uuid) -> Result<Option<WalletRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM custody_wallets WHERE id = $1",
            WALLET_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WalletRecord::try_from).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<WalletRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM custody_wallets WHERE owner_id = $1 ORDER BY created_at DESC",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WalletRecord::try_from).collect()
    }
}
