//! 日志脱敏
//!
//! 地址和 RPC 端点写入日志前统一经过这里。
//! 秘密、密码、密文永远不进日志，这里也不提供对应的函数。

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return "*".repeat(address.len());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏 RPC 端点：只保留协议和主机，路径/查询串里常带 API Key
pub fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => match parsed.port() {
                Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
                None => format!("{}://{}", parsed.scheme(), host),
            },
            None => "<invalid-url>".to_string(),
        },
        Err(_) => "<invalid-url>".to_string(),
    }
}
