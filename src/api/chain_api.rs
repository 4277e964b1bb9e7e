//! 链信息与健康检查 API

use std::sync::Arc;

use axum::extract::State;
use serde::Serialize;

use crate::{
    api::response::{success_response, ApiResult},
    app_state::AppState,
    domain::chain_config::ChainConfig,
    infrastructure::db,
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub chains: usize,
}

/// RPC 端点可能带 API Key，只返回数量
#[derive(Debug, Serialize)]
pub struct ChainView {
    pub chain_id: u64,
    pub name: String,
    pub native_symbol: String,
    pub decimals: u8,
    pub explorer_base_url: String,
    pub rpc_endpoint_count: usize,
}

impl From<&ChainConfig> for ChainView {
    fn from(chain: &ChainConfig) -> Self {
        Self {
            chain_id: chain.chain_id,
            name: chain.name.clone(),
            native_symbol: chain.native_symbol.clone(),
            decimals: chain.decimals,
            explorer_base_url: chain.explorer_base_url.clone(),
            rpc_endpoint_count: chain.rpc_endpoints.len(),
        }
    }
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let status = match &state.pool {
        Some(pool) => match db::health_check(pool).await {
            Ok(()) => "ok",
            Err(e) => {
                tracing::warn!(error = ?e, "数据库健康检查失败");
                "degraded"
            }
        },
        None => "ok",
    };

    success_response(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage_backend(),
        chains: state.custody.list_chains().len(),
    })
}

/// GET /api/chains
pub async fn list_chains(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ChainView>> {
    let chains = state
        .custody
        .list_chains()
        .iter()
        .map(|c| ChainView::from(c.as_ref()))
        .collect();
    success_response(chains)
}
