//! 钱包托管操作：创建、导入、解锁、导出、列表
//!
//! 秘密只以 `Zeroizing` 缓冲区的形式出现在内存中，入库前用用户密码加密。
//! 存储的地址必须始终等于从解密后秘密重新派生的地址。

use std::fmt;

use chrono::{DateTime, Utc};
use k256::ecdsa::SigningKey;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    domain::{
        derivation::DerivedAccount,
        errors::{CustodyError, CustodyResult},
        secret::{Secret, SecretKind},
    },
    infrastructure::log_redact::redact_address,
    repository::{NewWallet, RepositoryError, WalletRecord},
    service::custody::{validate_password, CustodyService},
};

pub const DEFAULT_CREATED_WALLET_NAME: &str = "Main Wallet";
pub const DEFAULT_IMPORTED_WALLET_NAME: &str = "Imported Wallet";
const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// 新建钱包结果；助记词只在这里返回一次
pub struct CreatedWallet {
    pub wallet_id: Uuid,
    pub address: String,
    pub mnemonic: Zeroizing<String>,
}

impl fmt::Debug for CreatedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedWallet")
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.address)
            .field("mnemonic", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedWallet {
    pub wallet_id: Uuid,
    pub address: String,
    pub kind: SecretKind,
}

/// 钱包列表项（不含任何密文字段）
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub id: Uuid,
    pub address: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<WalletRecord> for WalletSummary {
    fn from(record: WalletRecord) -> Self {
        Self {
            id: record.id,
            address: record.address,
            display_name: record.display_name,
            created_at: record.created_at,
        }
    }
}

/// 解锁后的账户，仅在签名期间存在
pub struct UnsealedAccount {
    pub wallet_id: Uuid,
    secret: Secret,
    account: DerivedAccount,
}

impl UnsealedAccount {
    pub fn address(&self) -> &str {
        &self.account.address
    }

    pub fn kind(&self) -> SecretKind {
        self.secret.kind()
    }

    pub fn signing_key(&self) -> &SigningKey {
        self.account.signing_key()
    }
}

impl fmt::Debug for UnsealedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsealedAccount")
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.account.address)
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// 导出的秘密（仅限钱包所有者备份）
pub struct ExportedSecret {
    pub address: String,
    pub kind: SecretKind,
    pub secret: Zeroizing<String>,
}

impl fmt::Debug for ExportedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedSecret")
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

fn display_name_or(display_name: Option<String>, default: &str) -> CustodyResult<String> {
    let name = display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default.to_string());

    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(CustodyError::validation(format!(
            "display name must be at most {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    Ok(name)
}

impl CustodyService {
    /// 新建钱包：生成助记词 → 派生地址 → 加密 → 入库
    pub async fn create_wallet(
        &self,
        owner_id: Uuid,
        password: &str,
        display_name: Option<String>,
    ) -> CustodyResult<CreatedWallet> {
        validate_password(password)?;
        let display_name = display_name_or(display_name, DEFAULT_CREATED_WALLET_NAME)?;

        let secret = self.deriver.generate_secret()?;
        let account = self.deriver.derive_account(&secret, 0)?;
        let sealed_secret = self.seal_secret(secret.expose_canonical(), password).await?;

        let record = self
            .wallets
            .create(NewWallet {
                owner_id,
                address: account.address.clone(),
                display_name,
                sealed_secret,
            })
            .await
            .map_err(|e| duplicate_or_storage(e, &account.address))?;

        info!(
            owner_id = %owner_id,
            wallet_id = %record.id,
            address = %redact_address(&record.address),
            "Custody wallet created"
        );

        Ok(CreatedWallet {
            wallet_id: record.id,
            address: record.address,
            mnemonic: secret.expose_canonical(),
        })
    }

    /// 导入助记词或私钥；同一 owner 下地址唯一
    pub async fn import_wallet(
        &self,
        owner_id: Uuid,
        secret_input: &str,
        password: &str,
        display_name: Option<String>,
    ) -> CustodyResult<ImportedWallet> {
        validate_password(password)?;
        let display_name = display_name_or(display_name, DEFAULT_IMPORTED_WALLET_NAME)?;

        let secret = Secret::parse(secret_input)?;
        let account = self.deriver.derive_account(&secret, 0)?;

        if self
            .wallets
            .find_by_owner_and_address(owner_id, &account.address)
            .await?
            .is_some()
        {
            return Err(CustodyError::DuplicateWallet {
                address: account.address,
            });
        }

        let sealed_secret = self.seal_secret(secret.expose_canonical(), password).await?;

        // 并发导入时由存储层唯一约束兜底
        let record = self
            .wallets
            .create(NewWallet {
                owner_id,
                address: account.address.clone(),
                display_name,
                sealed_secret,
            })
            .await
            .map_err(|e| duplicate_or_storage(e, &account.address))?;

        info!(
            owner_id = %owner_id,
            wallet_id = %record.id,
            kind = ?secret.kind(),
            address = %redact_address(&record.address),
            "Custody wallet imported"
        );

        Ok(ImportedWallet {
            wallet_id: record.id,
            address: record.address,
            kind: secret.kind(),
        })
    }

    pub async fn list_wallets(&self, owner_id: Uuid) -> CustodyResult<Vec<WalletSummary>> {
        let records = self.wallets.list_by_owner(owner_id).await?;
        Ok(records.into_iter().map(WalletSummary::from).collect())
    }

    /// 解密并重新派生，校验地址一致性
    pub async fn unlock_for_signing(
        &self,
        owner_id: Uuid,
        wallet_id: Uuid,
        password: &str,
    ) -> CustodyResult<UnsealedAccount> {
        validate_password(password)?;
        let record = self.owned_wallet(owner_id, wallet_id).await?;

        let plaintext = self
            .unseal_secret(record.sealed_secret.clone(), password)
            .await
            .map_err(|e| {
                if matches!(e, CustodyError::AuthenticationFailed) {
                    warn!(wallet_id = %wallet_id, "Wallet unlock rejected");
                }
                e
            })?;

        let secret = Secret::parse(&plaintext).map_err(|_| {
            error!(wallet_id = %wallet_id, "Decrypted wallet secret is not a valid secret");
            CustodyError::IntegrityViolation { wallet_id }
        })?;
        let account = self.deriver.derive_account(&secret, 0)?;

        if !account.address.eq_ignore_ascii_case(&record.address) {
            error!(
                wallet_id = %wallet_id,
                stored = %redact_address(&record.address),
                derived = %redact_address(&account.address),
                "Stored wallet address does not match derived address"
            );
            return Err(CustodyError::IntegrityViolation { wallet_id });
        }

        Ok(UnsealedAccount {
            wallet_id,
            secret,
            account,
        })
    }

    /// 所有者导出秘密用于备份
    pub async fn export_secret(
        &self,
        owner_id: Uuid,
        wallet_id: Uuid,
        password: &str,
    ) -> CustodyResult<ExportedSecret> {
        let unlocked = self.unlock_for_signing(owner_id, wallet_id, password).await?;

        warn!(
            owner_id = %owner_id,
            wallet_id = %wallet_id,
            "Wallet secret exported"
        );

        Ok(ExportedSecret {
            address: unlocked.address().to_string(),
            kind: unlocked.kind(),
            secret: unlocked.secret.expose_canonical(),
        })
    }
}

fn duplicate_or_storage(err: RepositoryError, address: &str) -> CustodyError {
    match err {
        RepositoryError::UniqueViolation => CustodyError::DuplicateWallet {
            address: address.to_string(),
        },
        other => other.into(),
    }
}
