use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::errors::{CustodyError, RpcError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    Unauthorized,
    NotFound,
    Internal,

    // 业务错误码
    WalletNotFound,
    WalletAlreadyExists,
    TransactionNotFound,
    InvalidSecret,
    InvalidPassword,
    ChainNotSupported,
    TransactionRejected,
    BroadcastUnconfirmed,
    RpcError,
    ValidationFailed,
    IntegrityViolation,
    DatabaseError,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Internal => "internal",
            AppErrorCode::WalletNotFound => "wallet_not_found",
            AppErrorCode::WalletAlreadyExists => "wallet_already_exists",
            AppErrorCode::TransactionNotFound => "transaction_not_found",
            AppErrorCode::InvalidSecret => "invalid_secret",
            AppErrorCode::InvalidPassword => "invalid_password",
            AppErrorCode::ChainNotSupported => "chain_not_supported",
            AppErrorCode::TransactionRejected => "transaction_rejected",
            AppErrorCode::BroadcastUnconfirmed => "broadcast_unconfirmed",
            AppErrorCode::RpcError => "rpc_error",
            AppErrorCode::ValidationFailed => "validation_failed",
            AppErrorCode::IntegrityViolation => "integrity_violation",
            AppErrorCode::DatabaseError => "database_error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        let mut response = (self.status, Json(body)).into_response();
        // trace_id 中间件会取出并补齐 trace_id 后重新渲染
        if self.trace_id.is_none() {
            response.extensions_mut().insert(self);
        }
        response
    }
}

impl AppError {
    pub fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

impl From<CustodyError> for AppError {
    fn from(err: CustodyError) -> Self {
        let message = err.to_string();
        match err {
            CustodyError::Validation(_) => {
                Self::new(AppErrorCode::ValidationFailed, StatusCode::BAD_REQUEST, message)
            }
            CustodyError::InvalidSecretFormat => {
                Self::new(AppErrorCode::InvalidSecret, StatusCode::BAD_REQUEST, message)
            }
            CustodyError::AuthenticationFailed => {
                Self::new(AppErrorCode::InvalidPassword, StatusCode::UNAUTHORIZED, message)
            }
            CustodyError::DuplicateWallet { .. } => {
                Self::new(AppErrorCode::WalletAlreadyExists, StatusCode::CONFLICT, message)
            }
            CustodyError::ChainUnsupported(_) => {
                Self::new(AppErrorCode::ChainNotSupported, StatusCode::BAD_REQUEST, message)
            }
            CustodyError::WalletNotFound => {
                Self::new(AppErrorCode::WalletNotFound, StatusCode::NOT_FOUND, message)
            }
            CustodyError::TransactionNotFound => {
                Self::new(AppErrorCode::TransactionNotFound, StatusCode::NOT_FOUND, message)
            }
            CustodyError::Rpc(RpcError::RejectedByNode(node_message)) => Self::new(
                AppErrorCode::TransactionRejected,
                StatusCode::BAD_REQUEST,
                node_message,
            ),
            CustodyError::Rpc(_) => {
                Self::new(AppErrorCode::RpcError, StatusCode::BAD_GATEWAY, message)
            }
            // 消息带交易哈希，调用方据此查询或刷新
            CustodyError::BroadcastUnconfirmed { .. } => Self::new(
                AppErrorCode::BroadcastUnconfirmed,
                StatusCode::BAD_GATEWAY,
                message,
            ),
            // 存储/内部错误的细节只进日志
            CustodyError::IntegrityViolation { .. } => {
                tracing::error!(error = %message, "Wallet integrity violation");
                Self::new(
                    AppErrorCode::IntegrityViolation,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "wallet integrity check failed",
                )
            }
            CustodyError::Storage(_) => {
                tracing::error!(error = %message, "Storage error");
                Self::new(
                    AppErrorCode::DatabaseError,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage temporarily unavailable",
                )
            }
            CustodyError::Internal(_) => {
                tracing::error!(error = %message, "Internal error");
                Self::internal("internal error")
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::bad_request(format!("invalid JSON: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Unhandled error");
        AppError::internal("internal error")
    }
}
