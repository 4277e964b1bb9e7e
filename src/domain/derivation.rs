//! 账户派生
//!
//! - 助记词：BIP-39 种子（空口令）→ BIP-32 `m/44'/60'/0'/0/{index}`
//! - 私钥：直接使用
//!
//! 地址 = Keccak-256(未压缩公钥去掉 0x04 前缀) 的后 20 字节，EIP-55 大小写校验。

use std::fmt;

use bip39::{Language, Mnemonic};
use coins_bip32::{path::DerivationPath, prelude::XPriv};
use ethers::{types::Address, utils::to_checksum};
use k256::ecdsa::SigningKey;
use rand::{rngs::OsRng, RngCore};
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::domain::{
    errors::{CustodyError, CustodyResult},
    secret::{Secret, SecretKind},
};

/// 以太坊 BIP-44 路径前缀，账户索引占 address_index 位
pub const ETHEREUM_PATH_PREFIX: &str = "m/44'/60'/0'/0";

/// 新助记词的熵长度（128 位 → 12 个单词）
const MNEMONIC_ENTROPY_BYTES: usize = 16;

/// 派生结果（仅存在于内存中）
pub struct DerivedAccount {
    pub address: String,
    pub kind: SecretKind,
    signing_key: SigningKey,
}

impl DerivedAccount {
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

/// 账户派生器（无状态）
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountDeriver;

impl AccountDeriver {
    pub fn new() -> Self {
        Self
    }

    /// 用系统 CSPRNG 生成 12 词英文助记词
    pub fn generate_secret(&self) -> CustodyResult<Secret> {
        let mut entropy = Zeroizing::new([0u8; MNEMONIC_ENTROPY_BYTES]);
        OsRng.fill_bytes(&mut entropy[..]);

        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
            .map_err(|e| CustodyError::internal(format!("mnemonic generation failed: {}", e)))?;

        Ok(Secret::Mnemonic(Zeroizing::new(mnemonic.to_string())))
    }

    /// 派生账户与 EIP-55 地址
    pub fn derive_account(&self, secret: &Secret, account_index: u32) -> CustodyResult<DerivedAccount> {
        let signing_key = match secret {
            Secret::Mnemonic(phrase) => derive_from_mnemonic(phrase, account_index)?,
            Secret::PrivateKey(bytes) => SigningKey::from_slice(&bytes[..])
                .map_err(|_| CustodyError::InvalidSecretFormat)?,
        };

        Ok(DerivedAccount {
            address: checksum_address(&signing_key),
            kind: secret.kind(),
            signing_key,
        })
    }
}

fn derive_from_mnemonic(phrase: &str, account_index: u32) -> CustodyResult<SigningKey> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|_| CustodyError::InvalidSecretFormat)?;
    let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));

    let path = format!("{}/{}", ETHEREUM_PATH_PREFIX, account_index)
        .parse::<DerivationPath>()
        .map_err(|e| CustodyError::internal(format!("invalid derivation path: {}", e)))?;

    let master_key = XPriv::root_from_seed(&seed[..], None)
        .map_err(|e| CustodyError::internal(format!("failed to derive master key: {}", e)))?;
    let derived_key = master_key
        .derive_path(&path)
        .map_err(|e| CustodyError::internal(format!("failed to derive child key: {}", e)))?;

    // XPriv 实现 AsRef<SigningKey>
    let signing_key: &SigningKey = derived_key.as_ref();
    Ok(signing_key.clone())
}

/// 公钥 → EIP-55 地址
pub fn checksum_address(signing_key: &SigningKey) -> String {
    let public_key = signing_key.verifying_key().to_encoded_point(false);
    // 去掉 0x04 前缀
    let hash = Keccak256::digest(&public_key.as_bytes()[1..]);
    to_checksum(&Address::from_slice(&hash[12..]), None)
}
