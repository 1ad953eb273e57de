use async_trait::async_trait;

use crate::error::{RequestError, Result};
use crate::types::{RequestConfig, Response};

/// 请求拦截器
///
/// 两个方法都有透传的默认实现，只需要覆盖关心的一半：
/// - `fulfilled`: 修改即将发出的请求配置，返回错误即中断请求
/// - `rejected`: 处理链中前面产生的错误，返回 `Ok` 可以恢复成功路径
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn fulfilled(&self, config: RequestConfig) -> Result<RequestConfig> {
        Ok(config)
    }

    async fn rejected(&self, error: RequestError) -> Result<RequestConfig> {
        Err(error)
    }
}

/// 响应拦截器
///
/// `exchange` 提供本次实际发出的请求配置，以及通过同一客户端重放请求的能力。
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn fulfilled(&self, response: Response, _exchange: &Exchange<'_>) -> Result<Response> {
        Ok(response)
    }

    async fn rejected(&self, error: RequestError, _exchange: &Exchange<'_>) -> Result<Response> {
        Err(error)
    }
}

/// 请求分发能力，由客户端实现
///
/// 重放只经过请求链和传输层，结果交回外层响应链从当前位置继续。
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// 执行请求拦截器链
    async fn prepare(&self, config: RequestConfig) -> Result<RequestConfig> {
        Ok(config)
    }

    /// 传输层往返，非 2xx 响应返回 `RequestError::Status`
    async fn transmit(&self, config: &RequestConfig) -> Result<Response>;
}

/// 响应拦截器看到的一次请求上下文
pub struct Exchange<'a> {
    origin: &'a RequestConfig,
    config: &'a RequestConfig,
    dispatcher: &'a dyn Dispatch,
}

impl<'a> Exchange<'a> {
    pub fn new(config: &'a RequestConfig, dispatcher: &'a dyn Dispatch) -> Self {
        Self {
            origin: config,
            config,
            dispatcher,
        }
    }

    /// 指定请求拦截器执行之前的配置
    pub fn with_origin(mut self, origin: &'a RequestConfig) -> Self {
        self.origin = origin;
        self
    }

    /// 本次发出的请求配置（已经过请求拦截器）
    pub fn config(&self) -> &RequestConfig {
        self.config
    }

    /// 合并后、请求拦截器执行之前的配置
    pub fn origin(&self) -> &RequestConfig {
        self.origin
    }

    /// 从原始配置重新发出请求
    ///
    /// 请求链重新执行一次，`patch` 在请求链之后、发送之前修改配置，
    /// 所以拦截器写入的头部不会覆盖它。重放的请求带有重放标记。
    pub async fn replay<F>(&self, patch: F) -> Result<Response>
    where
        F: FnOnce(&mut RequestConfig) -> Result<()> + Send,
    {
        let mut config = self.dispatcher.prepare(self.origin.clone()).await?;
        patch(&mut config)?;
        config.mark_replayed();
        self.dispatcher.transmit(&config).await
    }
}

/// 空拦截器实现，用于测试和默认情况
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpInterceptor;

impl RequestInterceptor for NoOpInterceptor {}

impl ResponseInterceptor for NoOpInterceptor {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payload, ResponseType};
    use reqwest::StatusCode;

    struct EchoDispatcher;

    #[async_trait]
    impl Dispatch for EchoDispatcher {
        async fn prepare(&self, config: RequestConfig) -> Result<RequestConfig> {
            config.try_header("x-prepared", "1")
        }

        async fn transmit(&self, config: &RequestConfig) -> Result<Response> {
            Ok(Response::new(
                StatusCode::OK,
                Payload::Text(config.full_url()),
                config.clone(),
            ))
        }
    }

    #[tokio::test]
    async fn test_no_op_interceptor_passes_through() {
        let config = RequestConfig::new().with_url("/users");
        let prepared = RequestInterceptor::fulfilled(&NoOpInterceptor, config.clone())
            .await
            .unwrap();
        assert_eq!(prepared, config);

        let err = RequestInterceptor::rejected(&NoOpInterceptor, RequestError::InvalidRequest("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_exchange_replays_from_origin() {
        let origin = RequestConfig::new().with_url("/first");
        let sent = origin.clone().try_header("x-prepared", "1").unwrap();
        let exchange = Exchange::new(&sent, &EchoDispatcher).with_origin(&origin);

        assert_eq!(exchange.config().headers.len(), 1);
        assert!(exchange.origin().headers.is_empty());

        let replayed = exchange
            .replay(|config| {
                assert_eq!(config.headers.get("x-prepared").unwrap(), "1");
                config.url = Some("/second".into());
                config.response_type = Some(ResponseType::Text);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(replayed.data, Payload::Text("/second".into()));
        assert!(replayed.config.is_replay());
        assert_eq!(replayed.config.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_replay_stops_when_patch_fails() {
        let sent = RequestConfig::new().with_url("/first");
        let exchange = Exchange::new(&sent, &EchoDispatcher);

        let err = exchange
            .replay(|_| Err(RequestError::InvalidRequest("bad token".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidRequest(_)));
    }
}
