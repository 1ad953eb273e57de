use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

use crate::error::{RequestError, Result};
use crate::interceptor::{Exchange, ResponseInterceptor};
use crate::refresh::{RefreshCoordinator, TokenRenewer};
use crate::types::{RequestConfig, Response};

pub type ExpiryMatcher = Arc<dyn Fn(&RequestError) -> bool + Send + Sync>;
pub type TokenAttacher = Arc<dyn Fn(&mut RequestConfig, &str) -> Result<()> + Send + Sync>;

/// 刷新策略：哪些失败算作 token 过期，新 token 如何附加到重放的请求上
///
/// 默认：响应状态码为 401 视为过期，新 token 写入 `Authorization: Bearer <token>`。
#[derive(Clone)]
pub struct RefreshPolicy {
    is_expired: ExpiryMatcher,
    attach: TokenAttacher,
}

impl RefreshPolicy {
    /// 按状态码判断过期
    pub fn on_status(mut self, status: StatusCode) -> Self {
        self.is_expired = status_matcher(status);
        self
    }

    pub fn with_expiry_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&RequestError) -> bool + Send + Sync + 'static,
    {
        self.is_expired = Arc::new(matcher);
        self
    }

    /// 把 `prefix + token` 写入指定头部
    pub fn with_header(mut self, name: HeaderName, prefix: &'static str) -> Self {
        self.attach = header_attacher(name, prefix);
        self
    }

    pub fn with_token_attacher<F>(mut self, attach: F) -> Self
    where
        F: Fn(&mut RequestConfig, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.attach = Arc::new(attach);
        self
    }

    pub fn is_expired(&self, error: &RequestError) -> bool {
        (self.is_expired)(error)
    }

    pub fn attach(&self, config: &mut RequestConfig, token: &str) -> Result<()> {
        (self.attach)(config, token)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            is_expired: status_matcher(StatusCode::UNAUTHORIZED),
            attach: header_attacher(AUTHORIZATION, "Bearer "),
        }
    }
}

fn status_matcher(status: StatusCode) -> ExpiryMatcher {
    Arc::new(move |error: &RequestError| {
        matches!(error, RequestError::Status(response) if response.status == status)
    })
}

fn header_attacher(name: HeaderName, prefix: &'static str) -> TokenAttacher {
    Arc::new(move |config: &mut RequestConfig, token: &str| -> Result<()> {
        let value = HeaderValue::from_str(&format!("{prefix}{token}")).map_err(|e| {
            RequestError::InvalidRequest(format!("token is not a valid header value: {e}"))
        })?;
        config.headers.insert(name.clone(), value);
        Ok(())
    })
}

/// token 过期自动刷新拦截器
///
/// 作为响应拦截器的 `rejected` 处理：识别到 token 过期后通过
/// [`RefreshCoordinator`] 获取新 token，从原始配置重新走一遍请求链，
/// 附加新 token 后发送。重放的结果交给后续的响应拦截器继续处理，
/// 重放后仍然过期的请求不会再次刷新。
pub struct TokenRefreshInterceptor {
    coordinator: Arc<RefreshCoordinator>,
    policy: RefreshPolicy,
}

impl TokenRefreshInterceptor {
    pub fn new<R>(renewer: R) -> Self
    where
        R: TokenRenewer + 'static,
    {
        Self::with_policy(renewer, RefreshPolicy::default())
    }

    pub fn with_policy<R>(renewer: R, policy: RefreshPolicy) -> Self
    where
        R: TokenRenewer + 'static,
    {
        Self {
            coordinator: Arc::new(RefreshCoordinator::new(renewer)),
            policy,
        }
    }

    /// 该拦截器独占的刷新协调器
    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.coordinator)
    }
}

#[async_trait]
impl ResponseInterceptor for TokenRefreshInterceptor {
    async fn rejected(&self, error: RequestError, exchange: &Exchange<'_>) -> Result<Response> {
        if exchange.config().is_replay() || !self.policy.is_expired(&error) {
            return Err(error);
        }

        let token = self.coordinator.fresh_token().await?;

        debug!("replaying {} with renewed token", exchange.config().full_url());
        exchange
            .replay(|config| self.policy.attach(config, &token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::Dispatch;
    use crate::refresh::renew_with;
    use crate::types::Payload;
    use std::sync::Mutex;

    /// 记录重放请求的分发器，请求链固定写入一个旧 token
    #[derive(Default)]
    struct RecordingDispatcher {
        replays: Mutex<Vec<RequestConfig>>,
    }

    #[async_trait]
    impl Dispatch for RecordingDispatcher {
        async fn prepare(&self, config: RequestConfig) -> Result<RequestConfig> {
            config.try_header("authorization", "Bearer stale")
        }

        async fn transmit(&self, config: &RequestConfig) -> Result<Response> {
            self.replays.lock().unwrap().push(config.clone());
            Ok(Response::new(
                StatusCode::OK,
                Payload::Text("replayed".into()),
                config.clone(),
            ))
        }
    }

    fn expired(config: &RequestConfig) -> RequestError {
        RequestError::Status(Box::new(Response::new(
            StatusCode::UNAUTHORIZED,
            Payload::Json(serde_json::Value::Null),
            config.clone(),
        )))
    }

    #[tokio::test]
    async fn test_expired_request_is_replayed_with_bearer_token() {
        let interceptor = TokenRefreshInterceptor::new(renew_with(|| async { Ok("fresh".to_string()) }));
        let dispatcher = RecordingDispatcher::default();
        let origin = RequestConfig::new().with_url("/profile");
        let sent = origin.clone().try_header("x-trace", "t").unwrap();
        let exchange = Exchange::new(&sent, &dispatcher).with_origin(&origin);

        let response = interceptor.rejected(expired(&sent), &exchange).await.unwrap();
        assert_eq!(response.data, Payload::Text("replayed".into()));

        // 从原始配置重建，新 token 覆盖请求链写入的旧 token
        let replays = dispatcher.replays.lock().unwrap();
        assert_eq!(replays.len(), 1);
        assert_eq!(replays[0].headers.get(AUTHORIZATION).unwrap(), "Bearer fresh");
        assert!(replays[0].headers.get("x-trace").is_none());
        assert!(replays[0].is_replay());
    }

    #[tokio::test]
    async fn test_other_errors_pass_through_untouched() {
        let interceptor = TokenRefreshInterceptor::new(renew_with(|| async {
            anyhow::bail!("renewer must not be called")
        }));
        let dispatcher = RecordingDispatcher::default();
        let sent = RequestConfig::new().with_url("/profile");
        let exchange = Exchange::new(&sent, &dispatcher);

        let err = interceptor
            .rejected(RequestError::InvalidRequest("offline".into()), &exchange)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidRequest(_)));
        assert!(dispatcher.replays.lock().unwrap().is_empty());
        assert!(!interceptor.coordinator().is_refreshing());
    }

    #[tokio::test]
    async fn test_replayed_request_is_not_refreshed_again() {
        let interceptor = TokenRefreshInterceptor::new(renew_with(|| async { Ok("fresh".to_string()) }));
        let dispatcher = RecordingDispatcher::default();
        let mut sent = RequestConfig::new().with_url("/profile");
        sent.mark_replayed();
        let exchange = Exchange::new(&sent, &dispatcher);

        let err = interceptor.rejected(expired(&sent), &exchange).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(dispatcher.replays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let policy = RefreshPolicy::default()
            .on_status(StatusCode::FORBIDDEN)
            .with_header(HeaderName::from_static("x-access-token"), "");
        let interceptor =
            TokenRefreshInterceptor::with_policy(renew_with(|| async { Ok("abc".to_string()) }), policy);
        let dispatcher = RecordingDispatcher::default();
        let sent = RequestConfig::new().with_url("/admin");
        let exchange = Exchange::new(&sent, &dispatcher);

        // 401 不再触发刷新
        assert!(interceptor.rejected(expired(&sent), &exchange).await.is_err());

        let forbidden = RequestError::Status(Box::new(Response::new(
            StatusCode::FORBIDDEN,
            Payload::Json(serde_json::Value::Null),
            sent.clone(),
        )));
        interceptor.rejected(forbidden, &exchange).await.unwrap();
        let replays = dispatcher.replays.lock().unwrap();
        assert_eq!(replays[0].headers.get("x-access-token").unwrap(), "abc");
    }
}
