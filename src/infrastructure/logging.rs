//! 日志系统配置模块
//! 支持结构化日志（JSON）和文本日志，级别由 RUST_LOG / LOG_LEVEL 控制

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

/// 初始化日志系统
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // 设置日志级别过滤器
    let filter = build_filter(config);

    // 根据配置选择日志格式
    let result = if config.format == "json" {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .try_init()
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true).with_timer(ChronoUtc::rfc_3339()))
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))
}

/// RUST_LOG 优先，其次是配置中的级别
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "keyvault_core={level},tower_http={level},sqlx=warn",
            level = config.level
        ))
    })
}
