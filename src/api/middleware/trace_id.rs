//! Trace ID 中间件
//! 为每个请求生成或沿用 trace_id，并写入错误响应体与响应头

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::AppError;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// 请求扩展中的 trace_id
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

impl TraceId {
    /// 从请求头中提取 trace_id，如果没有则生成新的
    pub fn get_or_generate(req: &Request) -> Self {
        let from_header = req
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 128);

        match from_header {
            Some(trace_id) => Self(trace_id.to_string()),
            None => Self(Uuid::new_v4().to_string()),
        }
    }
}

pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = TraceId::get_or_generate(&req);
    req.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!("request", trace_id = %trace_id.0);
    let mut response = next.run(req).instrument(span).await;

    // 错误响应补上 trace_id
    if let Some(err) = response.extensions_mut().remove::<AppError>() {
        response = err.with_trace_id(trace_id.0.clone()).into_response();
    }

    if let Ok(header_value) = HeaderValue::from_str(&trace_id.0) {
        response.headers_mut().insert(TRACE_ID_HEADER, header_value);
    }

    response
}
