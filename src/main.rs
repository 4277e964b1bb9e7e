//! keyvault-core 主入口
//! 托管钱包与多链 RPC 调度服务

use std::sync::Arc;

use anyhow::{Context, Result};
use keyvault_core::{
    api,
    app_state::AppState,
    config::Config,
    infrastructure::{db, logging},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指向 TOML 文件时叠加文件配置）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    // 3. 初始化日志
    logging::init_logging(&config.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        chains = config.chains.networks.len(),
        "Starting keyvault-core"
    );

    // 4. 数据库（可选）
    let pool = match config.database.url.as_deref() {
        Some(_) => {
            let pool = db::init_pool(&config.database).await?;
            tracing::info!("Database connected");

            if std::env::var("SKIP_MIGRATIONS").is_err() {
                db::run_migrations(&pool).await?;
            } else {
                tracing::info!("Database migrations skipped (SKIP_MIGRATIONS=1)");
            }
            Some(pool)
        }
        None => None,
    };

    // 5. 应用状态与路由
    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::new(config, pool)?);
    let app = api::routes(state);

    // 6. 启动服务器
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
