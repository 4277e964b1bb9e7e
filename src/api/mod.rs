use std::{sync::Arc, time::Instant};

use axum::{
    extract::Request,
    middleware::from_fn,
    response::Response,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Level;

use crate::{api::middleware::trace_id_middleware, app_state::AppState};

pub mod chain_api;
pub mod middleware;
pub mod response; // 统一响应格式
pub mod rpc_api;
pub mod wallet_api;

pub fn routes(state: Arc<AppState>) -> Router {
    // 公共路由：链信息与链上读写
    let public_routes = Router::new()
        .route("/api/health", get(chain_api::health))
        .route("/api/chains", get(chain_api::list_chains))
        .route(
            "/api/rpc/:chain_id/balance/:address",
            get(rpc_api::get_balance),
        )
        .route("/api/rpc/:chain_id/gas", get(rpc_api::get_gas))
        .route("/api/rpc/:chain_id/send", post(rpc_api::send_raw))
        .route(
            "/api/rpc/:chain_id/token-balances",
            post(rpc_api::get_token_balances),
        )
        .route("/api/rpc/:chain_id", post(rpc_api::proxy));

    // 托管路由：需要 X-Owner-Id
    let custody_routes = Router::new()
        .route("/api/wallets", get(wallet_api::list_wallets))
        .route("/api/wallets/create", post(wallet_api::create_wallet))
        .route("/api/wallets/import", post(wallet_api::import_wallet))
        .route("/api/wallets/unlock", post(wallet_api::unlock_wallet))
        .route("/api/wallets/:id/send", post(wallet_api::send_native))
        .route("/api/wallets/:id/send-token", post(wallet_api::send_token))
        .route(
            "/api/wallets/:id/transactions",
            get(wallet_api::transaction_history),
        )
        .route(
            "/api/transactions/:id/refresh",
            post(wallet_api::refresh_transaction),
        );

    Router::new()
        .merge(public_routes)
        .merge(custody_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(CompressionLayer::new())
                .layer(from_fn(trace_id_middleware))
                .layer(from_fn(trace_log)),
        )
        .with_state(state)
}

async fn trace_log(req: Request, next: axum::middleware::Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let resp = next.run(req).await;
    let status = resp.status();
    let elapsed = start.elapsed().as_millis();
    tracing::event!(Level::INFO, method=%method, path=%path, status=%status.as_u16(), elapsed_ms=%elapsed, "http_request");
    resp
}
