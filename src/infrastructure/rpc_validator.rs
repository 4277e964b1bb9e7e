// RPC响应校验模块 - 防止链上数据污染
use ethers::types::U256;
use serde_json::Value;

use crate::domain::errors::RpcError;

fn invalid(msg: impl Into<String>) -> RpcError {
    RpcError::InvalidResponse(msg.into())
}

/// 提取 JSON-RPC 响应中的 result 字段
///
/// `error` 对象转换为 `NodeError`，缺少 `result` 视为格式错误
pub fn extract_result(json: &Value) -> Result<&Value, RpcError> {
    // 检查是否有error字段
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown RPC error")
            .to_string();
        return Err(RpcError::NodeError { code, message });
    }

    // 检查jsonrpc版本
    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return Err(invalid(format!("unsupported JSON-RPC version: {}", version)));
        }
    }

    json.get("result")
        .ok_or_else(|| invalid("missing result field in RPC response"))
}

/// 解析十六进制数量（余额、gas price、base fee）
pub fn parse_quantity(value: &Value) -> Result<U256, RpcError> {
    let hex = value
        .as_str()
        .ok_or_else(|| invalid(format!("expected hex quantity, got {}", value)))?;
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| invalid("quantity must be 0x-prefixed"))?;

    // 最多32字节 = 64个十六进制字符
    if digits.is_empty() || digits.len() > 64 {
        return Err(invalid(format!("quantity has invalid length: {}", digits.len())));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("quantity contains non-hex characters"));
    }

    U256::from_str_radix(digits, 16).map_err(|e| invalid(format!("failed to parse quantity: {}", e)))
}

/// 验证RPC返回的nonce值
pub fn parse_nonce(value: &Value) -> Result<u64, RpcError> {
    let quantity = parse_quantity(value)?;
    if quantity > U256::from(u64::MAX) {
        return Err(invalid("nonce exceeds u64"));
    }
    Ok(quantity.as_u64())
}

/// 验证交易哈希格式
pub fn validate_tx_hash(value: &Value) -> Result<String, RpcError> {
    let tx_hash = value
        .as_str()
        .ok_or_else(|| invalid("transaction hash must be a string"))?;
    let hash = tx_hash.trim_start_matches("0x");

    // 以太坊交易哈希为32字节 = 64个十六进制字符
    if hash.len() != 64 {
        return Err(invalid(format!(
            "invalid transaction hash length: expected 64, got {}",
            hash.len()
        )));
    }
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("transaction hash contains non-hex characters"));
    }

    Ok(format!("0x{}", hash.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_result() {
        let ok = json!({"jsonrpc": "2.0", "id": 1, "result": "0x1"});
        assert_eq!(extract_result(&ok).unwrap(), &json!("0x1"));

        let null_result = json!({"jsonrpc": "2.0", "id": 1, "result": null});
        assert!(extract_result(&null_result).unwrap().is_null());

        let missing = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(
            extract_result(&missing),
            Err(RpcError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_extract_result_node_error() {
        let err = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "nonce too low"}
        });
        assert_eq!(
            extract_result(&err).unwrap_err(),
            RpcError::NodeError {
                code: -32000,
                message: "nonce too low".to_string()
            }
        );
    }

    #[test]
    fn test_parse_quantity() {
        // 2 ETH
        assert_eq!(
            parse_quantity(&json!("0x1bc16d674ec80000")).unwrap(),
            U256::from(2_000_000_000_000_000_000u64)
        );
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), U256::zero());
        assert!(parse_quantity(&json!("invalid")).is_err());
        assert!(parse_quantity(&json!("0x")).is_err());
        assert!(parse_quantity(&json!(12)).is_err());
    }

    #[test]
    fn test_parse_nonce() {
        assert_eq!(parse_nonce(&json!("0x5")).unwrap(), 5);
        assert!(parse_nonce(&json!("0x10000000000000000")).is_err());
    }

    #[test]
    fn test_validate_tx_hash() {
        let hash = "0x1234567890ABCDEF1234567890abcdef1234567890abcdef1234567890abcdef";
        assert_eq!(
            validate_tx_hash(&json!(hash)).unwrap(),
            hash.to_lowercase()
        );
        assert!(validate_tx_hash(&json!("invalid")).is_err());
    }
}
