//! JSON-RPC 传输层
//!
//! 调度器只依赖 `RpcTransport`，生产环境使用基于 reqwest 的 `HttpRpcTransport`，
//! 测试可以替换为脚本化实现。单次请求的超时由调度器统一控制。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{domain::errors::RpcError, infrastructure::log_redact::redact_url};

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// 向单个端点发送 JSON-RPC 请求体，返回解析后的响应 JSON（不解释 error 字段）
    async fn send(&self, endpoint: &str, payload: &Value) -> Result<Value, RpcError>;
}

/// HTTP 传输
#[derive(Debug, Clone)]
pub struct HttpRpcTransport {
    http_client: reqwest::Client,
}

impl HttpRpcTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client: client,
        }
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl Default for HttpRpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn send(&self, endpoint: &str, payload: &Value) -> Result<Value, RpcError> {
        let transport_err = |message: String| RpcError::Transport {
            endpoint: redact_url(endpoint),
            message,
        };

        let response = self
            .http_client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_err(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_err(format!("failed to read body: {}", e.without_url())))?;

        let parsed = serde_json::from_str::<Value>(&body);

        // 部分节点在 JSON-RPC 错误时返回非 2xx，但仍带有合法的 error 对象
        if !status.is_success() {
            return match parsed {
                Ok(json) if json.get("error").is_some() => Ok(json),
                _ => Err(transport_err(format!("http status {}", status.as_u16()))),
            };
        }

        parsed.map_err(|e| RpcError::InvalidResponse(format!("failed to parse JSON response: {}", e)))
    }
}
