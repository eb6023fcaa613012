use std::num::ParseIntError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 负载编解码错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to encode payload: {0}")]
    Encode(String),
    #[error("failed to decode payload: {0}")]
    Decode(String),
    #[error("payload is truncated")]
    Truncated,
    #[error("payload checksum mismatch")]
    Checksum,
    #[error("unexpected type for payload field `{0}`")]
    Schema(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("default session expiration is not set")]
    MissingDefaultExpiration,
    #[error("default session expiration `{value}` is not a valid number of seconds")]
    InvalidDefaultExpiration {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// 会话存储错误
///
/// 无效 Cookie、缓存未命中和会话过期都不是错误，只会得到一个空会话。
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Cache(#[from] redis::RedisError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("secure random source failed: {0}")]
    Random(String),
    #[error("blocking session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        tracing::error!("Session handling failed: {}", self);

        let (status, error_message) = match self {
            SessionError::Cache(_) => (StatusCode::SERVICE_UNAVAILABLE, "会话缓存不可用"),
            SessionError::Codec(_) => (StatusCode::INTERNAL_SERVER_ERROR, "会话数据损坏"),
            SessionError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "会话配置错误"),
            SessionError::Random(_) | SessionError::Join(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "内部服务器错误")
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
