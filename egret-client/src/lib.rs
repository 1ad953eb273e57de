//! 基于拦截器的 REST 请求客户端
//!
//! - 请求/响应拦截器链，按注册顺序执行，错误交给最近的 `rejected` 处理
//! - `raw` / `body` / `data` 三种响应返回方式
//! - 数组查询参数的序列化格式可选（brackets、comma、indices、repeat 或自定义）
//! - token 过期时单飞续期，并发请求排队等待同一个新 token 后重放
//!
//! ```no_run
//! use egret_client::{RequestClient, RequestConfig, ResponseMode, renew_with};
//! use serde_json::Value;
//!
//! # async fn run() -> egret_client::Result<()> {
//! let client = RequestClient::new(
//!     RequestConfig::new()
//!         .with_base_url("https://api.example.com")
//!         .with_response_return(ResponseMode::Data),
//! );
//! client.enable_token_refresh(renew_with(|| async { Ok("new-token".to_string()) }));
//!
//! let user: Value = client.get("/users/1", RequestConfig::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod interceptor;
pub mod refresh;
pub mod transfer;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::RequestClient;
pub use error::{RefreshError, RequestError, Result, TransportError};
pub use interceptor::{
    Dispatch, Exchange, InterceptorHandle, InterceptorManager, NoOpInterceptor,
    RequestInterceptor, ResponseInterceptor,
};
pub use refresh::{
    RefreshCoordinator, RefreshPolicy, TokenRefreshInterceptor, TokenRenewer, renew_with,
};
pub use transfer::{DownloadedFile, MultipartForm, UploadFile};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    ArrayFormat, ClientSettings, ContentType, HttpMethod, ParamsSerializer, Payload, Reply,
    RequestBody, RequestConfig, Response, ResponseMode, ResponseType,
};
