//! 钱包秘密（助记词 / 原始私钥）
//!
//! 输入在边界处一次性识别为 `Secret::Mnemonic` 或 `Secret::PrivateKey`，
//! 之后不再做字符串嗅探。所有秘密缓冲区在 drop 时清零。

use std::fmt;

use bip39::{Language, Mnemonic};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::domain::errors::{CustodyError, CustodyResult};

/// 秘密类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    Mnemonic,
    PrivateKey,
}

/// 钱包秘密
pub enum Secret {
    /// 规范化后的英文 BIP-39 助记词（单空格分隔、小写）
    Mnemonic(Zeroizing<String>),
    /// 32 字节 secp256k1 私钥
    PrivateKey(Zeroizing<[u8; 32]>),
}

impl Secret {
    /// 识别并校验用户输入
    ///
    /// - `0x` + 64 位十六进制 → 私钥（不带前缀的 64 位十六进制同样接受）
    /// - 否则必须是校验和正确的英文 BIP-39 助记词
    pub fn parse(input: &str) -> CustodyResult<Self> {
        let trimmed = input.trim();

        if let Some(hex_part) = private_key_hex(trimmed) {
            let mut bytes = Zeroizing::new([0u8; 32]);
            hex::decode_to_slice(hex_part, &mut bytes[..])
                .map_err(|_| CustodyError::InvalidSecretFormat)?;
            // 0 或 >= n 的标量不是合法私钥
            k256::SecretKey::from_slice(&bytes[..])
                .map_err(|_| CustodyError::InvalidSecretFormat)?;
            return Ok(Secret::PrivateKey(bytes));
        }

        let normalized = Zeroizing::new(
            trimmed
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(" "),
        );
        if normalized.is_empty() {
            return Err(CustodyError::InvalidSecretFormat);
        }

        Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|_| CustodyError::InvalidSecretFormat)?;

        Ok(Secret::Mnemonic(normalized))
    }

    pub fn kind(&self) -> SecretKind {
        match self {
            Secret::Mnemonic(_) => SecretKind::Mnemonic,
            Secret::PrivateKey(_) => SecretKind::PrivateKey,
        }
    }

    /// 规范字符串形式（加密存储的就是这个值）
    pub fn expose_canonical(&self) -> Zeroizing<String> {
        match self {
            Secret::Mnemonic(phrase) => phrase.clone(),
            Secret::PrivateKey(bytes) => {
                Zeroizing::new(format!("0x{}", hex::encode(&bytes[..])))
            }
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret::{:?}([REDACTED])", self.kind())
    }
}

fn private_key_hex(input: &str) -> Option<&str> {
    let body = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    if body.len() == 64 && body.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(body)
    } else {
        None
    }
}
