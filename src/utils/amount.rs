//! 金额解析
//!
//! 对外接口只接受最小单位（wei）的十进制整数字符串，避免浮点误差。

use ethers::types::U256;

use crate::domain::errors::{CustodyError, CustodyResult};

/// 解析正整数金额（wei）
pub fn parse_positive_base_units(value: &str) -> CustodyResult<U256> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(CustodyError::validation("value is required"));
    }
    if trimmed.starts_with('-') {
        return Err(CustodyError::validation("value must be positive"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(CustodyError::validation(
            "value must be an integer amount in base units",
        ));
    }

    let amount = U256::from_dec_str(trimmed)
        .map_err(|_| CustodyError::validation("value exceeds 256 bits"))?;
    if amount.is_zero() {
        return Err(CustodyError::validation("value must be greater than zero"));
    }

    Ok(amount)
}
