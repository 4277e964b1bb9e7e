//! RPC 端点选择
//!
//! 只有配置的高流量链（默认以太坊主网）才拥有备用端点列表：
//! `[主端点] ++ 公共备用端点`，保持顺序并去重。其余链只使用单一端点。

/// 以太坊主网公共备用端点
pub const DEFAULT_PUBLIC_BACKUPS: &[&str] = &[
    "https://cloudflare-eth.com",
    "https://ethereum.publicnode.com",
    "https://rpc.ankr.com/eth",
    "https://eth.llamarpc.com",
    "https://1rpc.io/eth",
];

/// 构建某条链的有序端点列表
pub fn build_endpoint_list(
    chain_id: u64,
    primary: &str,
    fallback_chain_id: u64,
    public_backups: &[String],
) -> Vec<String> {
    let primary = normalize(primary);

    if chain_id != fallback_chain_id {
        return if primary.is_empty() {
            Vec::new()
        } else {
            vec![primary]
        };
    }

    let mut endpoints: Vec<String> = Vec::with_capacity(public_backups.len() + 1);
    let candidates = std::iter::once(primary).chain(public_backups.iter().map(|u| normalize(u)));
    for url in candidates {
        if !url.is_empty() && !endpoints.contains(&url) {
            endpoints.push(url);
        }
    }
    endpoints
}

/// 默认备用端点（拥有所有权的副本，供配置默认值使用）
pub fn default_public_backups() -> Vec<String> {
    DEFAULT_PUBLIC_BACKUPS.iter().map(|s| s.to_string()).collect()
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
