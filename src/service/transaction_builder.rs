//! 转账交易构建与签名
//!
//! 使用 ethers 的 typed transaction：有 EIP-1559 费用建议时构建 type-2 交易，
//! 否则构建带 EIP-155 chain id 的 legacy 交易。
//! 原生币转账 gas limit 固定为 21000；ERC-20 转账由调用方传入估算值。

use ethers::{
    abi::{self, Token},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, Eip1559TransactionRequest,
        TransactionRequest, U256,
    },
    utils::keccak256,
};
use k256::ecdsa::SigningKey;

use crate::{
    domain::errors::{CustodyError, CustodyResult},
    service::gas_estimator::{FeeSuggestion, NATIVE_TRANSFER_GAS_LIMIT},
};

/// transfer(address,uint256)
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// 原生币转账参数
#[derive(Debug, Clone)]
pub struct NativeTransfer {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub fee: FeeSuggestion,
}

/// ERC-20 转账参数，交易发往代币合约，value 为 0
#[derive(Debug, Clone)]
pub struct Erc20Transfer {
    pub chain_id: u64,
    pub nonce: u64,
    pub token: Address,
    pub to: Address,
    /// 代币最小单位
    pub amount: U256,
    pub gas_limit: u64,
    pub fee: FeeSuggestion,
}

/// 已签名交易
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// RLP 编码的完整交易
    pub raw: Vec<u8>,
    /// 本地计算的交易哈希（keccak256(raw)）
    pub hash: String,
}

/// 两种转账共用的交易字段
struct CallRequest {
    chain_id: u64,
    nonce: u64,
    to: Address,
    value: U256,
    data: Option<Bytes>,
    gas_limit: u64,
    fee: FeeSuggestion,
}

impl CallRequest {
    fn to_typed(&self, from: Address) -> TypedTransaction {
        match self.fee {
            FeeSuggestion::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = Eip1559TransactionRequest::new()
                    .from(from)
                    .to(self.to)
                    .value(self.value)
                    .nonce(self.nonce)
                    .gas(self.gas_limit)
                    .max_fee_per_gas(max_fee_per_gas)
                    .max_priority_fee_per_gas(max_priority_fee_per_gas)
                    .chain_id(self.chain_id);
                if let Some(data) = &self.data {
                    tx = tx.data(data.clone());
                }
                tx.into()
            }
            FeeSuggestion::Legacy { gas_price } => {
                let mut tx = TransactionRequest::new()
                    .from(from)
                    .to(self.to)
                    .value(self.value)
                    .nonce(self.nonce)
                    .gas(self.gas_limit)
                    .gas_price(gas_price)
                    .chain_id(self.chain_id);
                if let Some(data) = &self.data {
                    tx = tx.data(data.clone());
                }
                tx.into()
            }
        }
    }

    fn sign(&self, signing_key: &SigningKey) -> CustodyResult<SignedTransaction> {
        let wallet = LocalWallet::from(signing_key.clone()).with_chain_id(self.chain_id);
        let tx = self.to_typed(wallet.address());

        let signature = wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| CustodyError::internal(format!("failed to sign transaction: {}", e)))?;

        let raw = tx.rlp_signed(&signature).to_vec();
        let hash = format!("0x{}", hex::encode(keccak256(&raw)));

        Ok(SignedTransaction { raw, hash })
    }
}

impl NativeTransfer {
    fn call(&self) -> CallRequest {
        CallRequest {
            chain_id: self.chain_id,
            nonce: self.nonce,
            to: self.to,
            value: self.value,
            data: None,
            gas_limit: NATIVE_TRANSFER_GAS_LIMIT,
            fee: self.fee,
        }
    }
}

impl Erc20Transfer {
    fn call(&self) -> CallRequest {
        CallRequest {
            chain_id: self.chain_id,
            nonce: self.nonce,
            to: self.token,
            value: U256::zero(),
            data: Some(Bytes::from(erc20_transfer_calldata(self.to, self.amount))),
            gas_limit: self.gas_limit,
            fee: self.fee,
        }
    }
}

/// `transfer(to, amount)` 的 calldata：selector ++ pad32(to) ++ pad32(amount)
pub fn erc20_transfer_calldata(to: Address, amount: U256) -> Vec<u8> {
    let mut data = ERC20_TRANSFER_SELECTOR.to_vec();
    data.extend(abi::encode(&[Token::Address(to), Token::Uint(amount)]));
    data
}

/// 签名原生币转账
pub fn sign_native_transfer(
    signing_key: &SigningKey,
    transfer: &NativeTransfer,
) -> CustodyResult<SignedTransaction> {
    transfer.call().sign(signing_key)
}

/// 签名 ERC-20 转账
pub fn sign_erc20_transfer(
    signing_key: &SigningKey,
    transfer: &Erc20Transfer,
) -> CustodyResult<SignedTransaction> {
    transfer.call().sign(signing_key)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    // hardhat/anvil 默认账户 #0
    const PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const FROM: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TO: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&hex::decode(PRIVATE_KEY).unwrap()).unwrap()
    }

    fn transfer(fee: FeeSuggestion) -> NativeTransfer {
        NativeTransfer {
            chain_id: 1,
            nonce: 7,
            to: Address::from_str(TO).unwrap(),
            value: U256::exp10(18),
            fee,
        }
    }

    #[test]
    fn test_eip1559_transfer_is_type_2_and_recoverable() {
        let t = transfer(FeeSuggestion::from_base_fee(U256::from(30_000_000_000u64)));
        let signed = sign_native_transfer(&signing_key(), &t).unwrap();

        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(signed.hash.len(), 66);

        let tx = t.call().to_typed(Address::from_str(FROM).unwrap());
        let wallet = LocalWallet::from(signing_key()).with_chain_id(1u64);
        let signature = wallet.sign_transaction_sync(&tx).unwrap();
        assert_eq!(
            signature.recover(tx.sighash()).unwrap(),
            Address::from_str(FROM).unwrap()
        );
        assert_eq!(tx.gas(), Some(&U256::from(NATIVE_TRANSFER_GAS_LIMIT)));
    }

    #[test]
    fn test_legacy_transfer_is_rlp_list_with_eip155() {
        let t = transfer(FeeSuggestion::from_gas_price(U256::from(20_000_000_000u64)));
        let signed = sign_native_transfer(&signing_key(), &t).unwrap();

        // legacy 交易直接是 RLP list
        assert!(signed.raw[0] >= 0xc0);

        let tx = t.call().to_typed(Address::from_str(FROM).unwrap());
        let wallet = LocalWallet::from(signing_key()).with_chain_id(1u64);
        let signature = wallet.sign_transaction_sync(&tx).unwrap();
        // EIP-155: v = chain_id * 2 + 35/36
        assert!(signature.v == 37 || signature.v == 38);
    }

    #[test]
    fn test_hash_is_keccak_of_raw() {
        let t = transfer(FeeSuggestion::from_gas_price(U256::from(1u64)));
        let signed = sign_native_transfer(&signing_key(), &t).unwrap();
        assert_eq!(
            signed.hash,
            format!("0x{}", hex::encode(keccak256(&signed.raw)))
        );
    }

    const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    fn erc20_transfer() -> Erc20Transfer {
        Erc20Transfer {
            chain_id: 1,
            nonce: 3,
            token: Address::from_str(TOKEN).unwrap(),
            to: Address::from_str(TO).unwrap(),
            amount: U256::from(1_500_000u64),
            gas_limit: 62_000,
            fee: FeeSuggestion::from_base_fee(U256::from(30_000_000_000u64)),
        }
    }

    #[test]
    fn test_erc20_calldata_layout() {
        let data = erc20_transfer_calldata(Address::from_str(TO).unwrap(), U256::from(1_500_000u64));

        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], Address::from_str(TO).unwrap().as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1_500_000u64));
    }

    #[test]
    fn test_erc20_transfer_targets_token_with_zero_value() {
        let t = erc20_transfer();
        let signed = sign_erc20_transfer(&signing_key(), &t).unwrap();
        assert_eq!(signed.raw[0], 0x02);

        let tx = t.call().to_typed(Address::from_str(FROM).unwrap());
        assert_eq!(tx.to_addr(), Some(&Address::from_str(TOKEN).unwrap()));
        assert_eq!(tx.value(), Some(&U256::zero()));
        assert_eq!(tx.gas(), Some(&U256::from(62_000u64)));
        assert_eq!(
            tx.data().map(|d| d.to_vec()),
            Some(erc20_transfer_calldata(
                Address::from_str(TO).unwrap(),
                U256::from(1_500_000u64)
            ))
        );
    }

    #[test]
    fn test_native_transfer_has_no_calldata() {
        let t = transfer(FeeSuggestion::from_gas_price(U256::from(1u64)));
        let tx = t.call().to_typed(Address::from_str(FROM).unwrap());
        assert!(tx.data().map_or(true, |d| d.is_empty()));
    }
}
