//! 调用方身份
//!
//! 认证由上游网关完成，已认证用户的 id 通过 `X-Owner-Id` 头传入。
//! 缺失或格式错误一律返回 401。

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const OWNER_ID_HEADER: &str = "x-owner-id";

#[derive(Debug, Clone, Copy)]
pub struct OwnerContext {
    pub owner_id: Uuid,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for OwnerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(OWNER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing X-Owner-Id header"))?;

        let owner_id = Uuid::parse_str(header.trim())
            .map_err(|_| AppError::unauthorized("invalid X-Owner-Id header"))?;

        Ok(Self { owner_id })
    }
}
