//! 内存 Repository 实现
//!
//! 未配置 DATABASE_URL 时使用；语义与 Postgres 实现保持一致，
//! (owner_id, lower(address)) 唯一性在同一个写锁内检查并插入。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    NewTransaction, NewWallet, RepositoryError, TransactionRecord, TransactionRepository,
    WalletRecord, WalletRepository,
};
use crate::domain::TransactionStatus;

#[derive(Default, Clone)]
pub struct InMemoryWalletRepository {
    wallets: Arc<RwLock<HashMap<Uuid, WalletRecord>>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.wallets.read().await.is_empty()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn create(&self, wallet: NewWallet) -> Result<WalletRecord, RepositoryError> {
        let mut wallets = self.wallets.write().await;

        let duplicate = wallets.values().any(|w| {
            w.owner_id == wallet.owner_id && w.address.eq_ignore_ascii_case(&wallet.address)
        });
        if duplicate {
            return Err(RepositoryError::UniqueViolation);
        }

        let record = WalletRecord {
            id: Uuid::new_v4(),
            owner_id: wallet.owner_id,
            address: wallet.address,
            display_name: wallet.display_name,
            sealed_secret: wallet.sealed_secret,
            created_at: chrono::Utc::now(),
        };
        wallets.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_owner_and_address(
        &self,
        owner_id: Uuid,
        address: &str,
    ) -> Result<Option<WalletRecord>, RepositoryError> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .values()
            .find(|w| w.owner_id == owner_id && w.address.eq_ignore_ascii_case(address))
            .cloned())
    }

    async fn find_by_id(&self, wallet_id: Uuid) -> Result<Option<WalletRecord>, RepositoryError> {
        Ok(self.wallets.read().await.get(&wallet_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<WalletRecord>, RepositoryError> {
        let wallets = self.wallets.read().await;
        let mut owned: Vec<WalletRecord> = wallets
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }
}

/// 交易按插入顺序保存，倒序即最新在前
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn create(&self, tx: NewTransaction) -> Result<TransactionRecord, RepositoryError> {
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            wallet_id: tx.wallet_id,
            hash: tx.hash,
            from_address: tx.from_address,
            to_address: tx.to_address,
            value_base_units: tx.value_base_units,
            token_address: tx.token_address,
            chain_id: tx.chain_id,
            status: tx.status,
            created_at: chrono::Utc::now(),
        };
        self.transactions.write().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, tx_id: Uuid) -> Result<Option<TransactionRecord>, RepositoryError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.iter().find(|t| t.id == tx_id).cloned())
    }

    async fn list_by_wallet(
        &self,
        wallet_id: Uuid,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .rev()
            .filter(|t| t.wallet_id == wallet_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        tx_id: Uuid,
        status: TransactionStatus,
    ) -> Result<(), RepositoryError> {
        let mut transactions = self.transactions.write().await;
        let record = transactions
            .iter_mut()
            .find(|t| t.id == tx_id)
            .ok_or(RepositoryError::NotFound)?;
        record.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::encryption::SealedSecret;

    fn sealed() -> SealedSecret {
        SealedSecret {
            ciphertext: vec![1, 2, 3],
            salt: vec![0; 32],
            iv: vec![0; 12],
            auth_tag: vec![0; 16],
            kdf_iterations: 310_000,
        }
    }

    fn new_wallet(owner_id: Uuid, address: &str) -> NewWallet {
        NewWallet {
            owner_id,
            address: address.to_string(),
            display_name: "Main Wallet".to_string(),
            sealed_secret: sealed(),
        }
    }

    fn new_tx(wallet_id: Uuid, value: &str) -> NewTransaction {
        NewTransaction {
            wallet_id,
            hash: None,
            from_address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".into(),
            to_address: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".into(),
            value_base_units: value.into(),
            token_address: None,
            chain_id: 1,
            status: TransactionStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_wallet_uniqueness_is_case_insensitive_per_owner() {
        let repo = InMemoryWalletRepository::new();
        let owner = Uuid::new_v4();

        repo.create(new_wallet(owner, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
            .await
            .unwrap();

        let dup = repo
            .create(new_wallet(owner, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"))
            .await;
        assert!(matches!(dup, Err(RepositoryError::UniqueViolation)));

        // 其他用户可以导入同一地址
        repo.create(new_wallet(Uuid::new_v4(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
            .await
            .unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_find_by_owner_and_address() {
        let repo = InMemoryWalletRepository::new();
        let owner = Uuid::new_v4();
        let created = repo
            .create(new_wallet(owner, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
            .await
            .unwrap();

        let found = repo
            .find_by_owner_and_address(owner, "0XF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        assert!(repo
            .find_by_owner_and_address(Uuid::new_v4(), &created.address)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_transactions_newest_first_with_limit() {
        let repo = InMemoryTransactionRepository::new();
        let wallet_id = Uuid::new_v4();

        for value in ["1", "2", "3"] {
            repo.create(new_tx(wallet_id, value)).await.unwrap();
        }
        repo.create(new_tx(Uuid::new_v4(), "99")).await.unwrap();

        let history = repo.list_by_wallet(wallet_id, 2).await.unwrap();
        let values: Vec<&str> = history.iter().map(|t| t.value_base_units.as_str()).collect();
        assert_eq!(values, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn test_update_status() {
        let repo = InMemoryTransactionRepository::new();
        let tx = repo.create(new_tx(Uuid::new_v4(), "1")).await.unwrap();

        repo.update_status(tx.id, TransactionStatus::Confirmed)
            .await
            .unwrap();
        let stored = repo.find_by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);

        assert!(matches!(
            repo.update_status(Uuid::new_v4(), TransactionStatus::Failed).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
