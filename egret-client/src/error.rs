use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;

use crate::types::{Response, ResponseMode};

/// 传输层错误
///
/// 请求没有拿到任何 HTTP 响应（超时、连接失败、请求构建失败等）。
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed to build request: {0}")]
    Builder(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else if error.is_builder() {
            TransportError::Builder(error.to_string())
        } else {
            TransportError::Other(error.to_string())
        }
    }
}

/// token 续期失败
///
/// 会被克隆后分发给所有排队中的请求，所以底层错误放在 `Arc` 里。
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("token renewal failed: {0}")]
    Renewal(Arc<anyhow::Error>),
    #[error("token renewal was cancelled")]
    Cancelled,
}

/// 请求客户端的统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// 网络层失败，没有响应体
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 非 2xx 响应，且响应体不是结构化数据
    #[error("request failed with status {}", .0.status)]
    Status(Box<Response>),

    /// 非 2xx 响应携带的业务错误体
    #[error("api error (status {status}): {body}")]
    Api { status: StatusCode, body: Value },

    /// `body` / `data` 模式下的校验失败
    #[error("response rejected in `{mode}` mode (status {status})")]
    ResponseMode {
        mode: ResponseMode,
        status: StatusCode,
        payload: Value,
    },

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 拦截器或用户钩子返回的任意错误
    #[error(transparent)]
    Interceptor(#[from] anyhow::Error),
}

impl RequestError {
    /// 错误对应的 HTTP 状态码（如果有）
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status(response) => Some(response.status),
            RequestError::Api { status, .. } | RequestError::ResponseMode { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// 被拒绝的原始响应（仅 `Status` 变体）
    pub fn response(&self) -> Option<&Response> {
        match self {
            RequestError::Status(response) => Some(response),
            _ => None,
        }
    }
}

pub type Result<T, E = RequestError> = std::result::Result<T, E>;
