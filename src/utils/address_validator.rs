//! 地址验证模块
//!
//! EVM 地址：0x + 40 位十六进制；含大写字母时必须通过 EIP-55 校验

use ethers::{types::Address, utils::to_checksum};

use crate::domain::errors::{CustodyError, CustodyResult};

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证并解析 EVM 地址
    pub fn parse_evm_address(address: &str) -> CustodyResult<Address> {
        let invalid = || CustodyError::validation(format!("invalid EVM address: {}", address));

        // 1. 基本格式检查
        let hex_part = address.strip_prefix("0x").ok_or_else(invalid)?;
        if hex_part.len() != 40 {
            return Err(invalid());
        }

        // 2. 验证hex字符
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes).map_err(|_| invalid())?;
        let parsed = Address::from(bytes);

        // 3. EIP-55 Checksum验证（全小写或全大写视为未带校验）
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && to_checksum(&parsed, None) != address {
            return Err(CustodyError::validation(format!(
                "EVM address fails EIP-55 checksum: {}",
                address
            )));
        }

        Ok(parsed)
    }

    /// 验证并返回 EIP-55 形式
    pub fn checksummed(address: &str) -> CustodyResult<String> {
        Self::parse_evm_address(address).map(|a| to_checksum(&a, None))
    }

    pub fn is_valid_evm_address(address: &str) -> bool {
        Self::parse_evm_address(address).is_ok()
    }
}
