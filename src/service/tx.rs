//! 原生币 / ERC-20 转账与交易记录
//!
//! 节点接受广播只代表进入内存池，记录为 Pending；
//! 之后通过回执刷新为 Confirmed / Failed。
//! 节点明确拒绝的广播记录为 Failed 且无哈希；
//! 超时、传输失败等结果未知的广播以本地哈希记录为 Pending。

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        chain_config::ChainConfig,
        errors::{CustodyError, CustodyResult, RpcError},
        transaction_status::TransactionStatus,
    },
    infrastructure::log_redact::redact_address,
    repository::{NewTransaction, TransactionRecord},
    service::{
        custody::{validate_password, CustodyService, MAX_HISTORY_LIMIT},
        gas_estimator::buffered_gas_limit,
        transaction_builder::{
            erc20_transfer_calldata, sign_erc20_transfer, sign_native_transfer, Erc20Transfer,
            NativeTransfer, SignedTransaction,
        },
    },
    utils::{parse_positive_base_units, AddressValidator},
};

#[derive(Debug, Clone, Serialize)]
pub struct SentTransaction {
    /// 广播成功但记录写入失败时为空，哈希仍然有效
    pub transaction_id: Option<Uuid>,
    pub hash: String,
    pub status: TransactionStatus,
    pub explorer_url: String,
}

/// 待广播交易的记录字段
struct PendingRecord {
    wallet_id: Uuid,
    from_address: String,
    to_address: String,
    value_base_units: String,
    token_address: Option<String>,
    chain_id: u64,
}

impl PendingRecord {
    fn with_outcome(&self, hash: Option<String>, status: TransactionStatus) -> NewTransaction {
        NewTransaction {
            wallet_id: self.wallet_id,
            hash,
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
            value_base_units: self.value_base_units.clone(),
            token_address: self.token_address.clone(),
            chain_id: self.chain_id,
            status,
        }
    }
}

impl CustodyService {
    /// 发送原生币
    ///
    /// 参数校验在任何解密或网络请求之前完成
    pub async fn send_native(
        &self,
        owner_id: Uuid,
        wallet_id: Uuid,
        password: &str,
        to: &str,
        value_base_units: &str,
        chain_id: u64,
    ) -> CustodyResult<SentTransaction> {
        // 1. 参数校验
        let value = parse_positive_base_units(value_base_units)?;
        let to = AddressValidator::parse_evm_address(to)?;
        validate_password(password)?;
        let chain = self.registry.resolve(chain_id)?;

        // 2. 解锁
        let unlocked = self.unlock_for_signing(owner_id, wallet_id, password).await?;
        let from_address = unlocked.address().to_string();

        // 3. nonce 与费用并发获取
        let (nonce, fee) = tokio::try_join!(
            self.dispatcher.get_transaction_count(chain_id, &from_address),
            self.dispatcher.get_fee_suggestion(chain_id),
        )?;

        // 4. 签名，私钥随 unlocked 一起释放
        let signed = sign_native_transfer(
            unlocked.signing_key(),
            &NativeTransfer {
                chain_id,
                nonce,
                to,
                value,
                fee,
            },
        )?;
        drop(unlocked);

        debug!(
            wallet_id = %wallet_id,
            nonce = nonce,
            eip1559 = fee.is_eip1559(),
            "Native transfer signed"
        );

        // 5. 广播并记录
        let record = PendingRecord {
            wallet_id,
            from_address,
            to_address: ethers::utils::to_checksum(&to, None),
            value_base_units: value.to_string(),
            token_address: None,
            chain_id,
        };
        self.broadcast_and_record(&chain, signed, record).await
    }

    /// 发送 ERC-20 代币
    ///
    /// `amount_base_units` 为代币最小单位；gas limit 取 eth_estimateGas 结果加余量，
    /// 估算时合约回滚（余额不足等）直接作为节点拒绝返回，不签名
    #[allow(clippy::too_many_arguments)]
    pub async fn send_erc20(
        &self,
        owner_id: Uuid,
        wallet_id: Uuid,
        password: &str,
        token: &str,
        to: &str,
        amount_base_units: &str,
        chain_id: u64,
    ) -> CustodyResult<SentTransaction> {
        // 1. 参数校验
        let amount = parse_positive_base_units(amount_base_units)?;
        let token = AddressValidator::parse_evm_address(token)?;
        let to = AddressValidator::parse_evm_address(to)?;
        validate_password(password)?;
        let chain = self.registry.resolve(chain_id)?;

        // 2. 解锁
        let unlocked = self.unlock_for_signing(owner_id, wallet_id, password).await?;
        let from_address = unlocked.address().to_string();
        let from = AddressValidator::parse_evm_address(&from_address)?;

        // 3. nonce、费用与 gas 估算并发获取
        let calldata = erc20_transfer_calldata(to, amount);
        let (nonce, fee, estimate) = tokio::try_join!(
            self.dispatcher.get_transaction_count(chain_id, &from_address),
            self.dispatcher.get_fee_suggestion(chain_id),
            self.dispatcher.estimate_gas(chain_id, &from, &token, &calldata),
        )?;
        let gas_limit = buffered_gas_limit(estimate);

        // 4. 签名
        let signed = sign_erc20_transfer(
            unlocked.signing_key(),
            &Erc20Transfer {
                chain_id,
                nonce,
                token,
                to,
                amount,
                gas_limit,
                fee,
            },
        )?;
        drop(unlocked);

        debug!(
            wallet_id = %wallet_id,
            nonce = nonce,
            gas_estimate = estimate,
            gas_limit = gas_limit,
            eip1559 = fee.is_eip1559(),
            "ERC-20 transfer signed"
        );

        // 5. 广播并记录
        let record = PendingRecord {
            wallet_id,
            from_address,
            to_address: ethers::utils::to_checksum(&to, None),
            value_base_units: amount.to_string(),
            token_address: Some(ethers::utils::to_checksum(&token, None)),
            chain_id,
        };
        self.broadcast_and_record(&chain, signed, record).await
    }

    async fn broadcast_and_record(
        &self,
        chain: &ChainConfig,
        signed: SignedTransaction,
        record: PendingRecord,
    ) -> CustodyResult<SentTransaction> {
        let wallet_id = record.wallet_id;
        let chain_id = chain.chain_id;

        match self.dispatcher.broadcast_raw(chain_id, &signed.raw).await {
            Ok(hash) => {
                if !hash.eq_ignore_ascii_case(&signed.hash) {
                    debug!(
                        node_hash = %hash,
                        local_hash = %signed.hash,
                        "Node returned a different transaction hash"
                    );
                }

                // 先落日志，记录写入失败时哈希不丢
                info!(
                    wallet_id = %wallet_id,
                    chain_id = chain_id,
                    from = %redact_address(&record.from_address),
                    token = ?record.token_address,
                    tx_hash = %hash,
                    "Transfer broadcast"
                );

                let transaction_id = self
                    .record_outcome(
                        record.with_outcome(Some(hash.clone()), TransactionStatus::Pending),
                    )
                    .await;

                Ok(SentTransaction {
                    transaction_id,
                    explorer_url: chain.explorer_tx_url(&hash),
                    hash,
                    status: TransactionStatus::Pending,
                })
            }
            Err(CustodyError::Rpc(RpcError::RejectedByNode(message))) => {
                warn!(
                    wallet_id = %wallet_id,
                    chain_id = chain_id,
                    reason = %message,
                    "Transfer rejected by node"
                );
                self.record_outcome(record.with_outcome(None, TransactionStatus::Failed))
                    .await;
                Err(RpcError::RejectedByNode(message).into())
            }
            Err(CustodyError::Rpc(source)) => {
                // 交易可能已被某个节点接收，保留本地哈希以便刷新
                warn!(
                    wallet_id = %wallet_id,
                    chain_id = chain_id,
                    tx_hash = %signed.hash,
                    error = %source,
                    "Transfer broadcast outcome unknown"
                );
                let transaction_id = self
                    .record_outcome(
                        record.with_outcome(Some(signed.hash.clone()), TransactionStatus::Pending),
                    )
                    .await;
                Err(CustodyError::BroadcastUnconfirmed {
                    tx_hash: signed.hash,
                    transaction_id,
                    source,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// 写入交易记录；失败只记日志，不覆盖广播结果
    async fn record_outcome(&self, tx: NewTransaction) -> Option<Uuid> {
        let hash = tx.hash.clone();
        let status = tx.status;
        match self.transactions.create(tx).await {
            Ok(record) => Some(record.id),
            Err(e) => {
                error!(
                    tx_hash = ?hash,
                    status = %status,
                    error = %e,
                    "Failed to record transaction"
                );
                None
            }
        }
    }

    /// 交易历史（最新在前）
    pub async fn get_transaction_history(
        &self,
        owner_id: Uuid,
        wallet_id: Uuid,
        limit: Option<u32>,
    ) -> CustodyResult<Vec<TransactionRecord>> {
        self.owned_wallet(owner_id, wallet_id).await?;

        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.transactions.list_by_wallet(wallet_id, limit).await?)
    }

    /// 按回执刷新交易状态；回执为空时保持 Pending
    pub async fn refresh_transaction_status(
        &self,
        owner_id: Uuid,
        transaction_id: Uuid,
    ) -> CustodyResult<TransactionRecord> {
        let mut record = self
            .transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or(CustodyError::TransactionNotFound)?;

        self.owned_wallet(owner_id, record.wallet_id)
            .await
            .map_err(|e| match e {
                CustodyError::WalletNotFound => CustodyError::TransactionNotFound,
                other => other,
            })?;

        if record.status.is_final() {
            return Ok(record);
        }
        let Some(hash) = record.hash.clone() else {
            return Ok(record);
        };

        let Some(receipt) = self
            .dispatcher
            .get_transaction_receipt(record.chain_id, &hash)
            .await?
        else {
            return Ok(record);
        };

        let next = if receipt.succeeded() {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Failed
        };

        if record.status.can_transition_to(&next) {
            self.transactions
                .update_status(record.id, next)
                .await?;
            info!(
                transaction_id = %record.id,
                from = %record.status,
                to = %next,
                block_number = ?receipt.block_number,
                "Transaction status updated"
            );
            record.status = next;
        }

        Ok(record)
    }
}
