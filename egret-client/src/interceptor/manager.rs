use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::interceptor::{Exchange, RequestInterceptor, ResponseInterceptor};
use crate::types::{RequestConfig, Response};

/// 拦截器注册句柄，可用于之后移除该拦截器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle(u64);

/// 一条按注册顺序执行的拦截器链
struct Chain<T: ?Sized> {
    next_id: u64,
    entries: Vec<(InterceptorHandle, Arc<T>)>,
}

impl<T: ?Sized> Chain<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, interceptor: Arc<T>) -> InterceptorHandle {
        let handle = InterceptorHandle(self.next_id);
        self.next_id += 1;
        self.entries.push((handle, interceptor));
        handle
    }

    fn eject(&mut self, handle: InterceptorHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(h, _)| *h != handle);
        self.entries.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.iter().map(|(_, i)| Arc::clone(i)).collect()
    }
}

/// 拦截器管理器
///
/// 维护请求和响应两条拦截器链。每次执行前先对链做快照，
/// 执行期间注册或移除拦截器不会影响正在进行的请求。
pub struct InterceptorManager {
    request: RwLock<Chain<dyn RequestInterceptor>>,
    response: RwLock<Chain<dyn ResponseInterceptor>>,
}

impl InterceptorManager {
    pub fn new() -> Self {
        Self {
            request: RwLock::new(Chain::new()),
            response: RwLock::new(Chain::new()),
        }
    }

    pub fn add_request_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: RequestInterceptor + 'static,
    {
        self.request
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(interceptor))
    }

    pub fn add_response_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: ResponseInterceptor + 'static,
    {
        self.response
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(interceptor))
    }

    /// 移除请求拦截器，句柄不存在时返回 `false`
    pub fn eject_request_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.request
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .eject(handle)
    }

    pub fn eject_response_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.response
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .eject(handle)
    }

    pub fn request_len(&self) -> usize {
        self.request.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn response_len(&self) -> usize {
        self.response.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// 依次执行请求拦截器
    ///
    /// `Ok` 交给下一个 `fulfilled`，`Err` 交给下一个 `rejected`。
    pub async fn run_request_chain(&self, config: RequestConfig) -> Result<RequestConfig> {
        let chain = self
            .request
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();

        let mut outcome = Ok(config);
        for interceptor in chain {
            outcome = match outcome {
                Ok(config) => interceptor.fulfilled(config).await,
                Err(error) => interceptor.rejected(error).await,
            };
        }
        outcome
    }

    /// 依次执行响应拦截器，语义与请求链相同
    pub async fn run_response_chain(
        &self,
        outcome: Result<Response>,
        exchange: &Exchange<'_>,
    ) -> Result<Response> {
        let chain = self
            .response
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();

        let mut outcome = outcome;
        for interceptor in chain {
            outcome = match outcome {
                Ok(response) => interceptor.fulfilled(response, exchange).await,
                Err(error) => interceptor.rejected(error, exchange).await,
            };
        }
        outcome
    }
}

impl Default for InterceptorManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::interceptor::{Dispatch, NoOpInterceptor};
    use crate::types::Payload;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// 在 `X-Trace` 头部追加自己的名字
    struct Tag(&'static str);

    #[async_trait]
    impl RequestInterceptor for Tag {
        async fn fulfilled(&self, config: RequestConfig) -> Result<RequestConfig> {
            let trace = config
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .map(|v| format!("{v},{}", self.0))
                .unwrap_or_else(|| self.0.to_string());
            config.try_header("x-trace", &trace)
        }
    }

    struct FailRequest;

    #[async_trait]
    impl RequestInterceptor for FailRequest {
        async fn fulfilled(&self, _config: RequestConfig) -> Result<RequestConfig> {
            Err(anyhow::anyhow!("blocked").into())
        }
    }

    /// 记录调用轨迹的响应拦截器
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on_success: bool,
        recover: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_on_success: false,
                recover: false,
            }
        }
    }

    #[async_trait]
    impl ResponseInterceptor for Recorder {
        async fn fulfilled(&self, response: Response, _exchange: &Exchange<'_>) -> Result<Response> {
            self.log.lock().unwrap().push(format!("{}:ok", self.name));
            if self.fail_on_success {
                return Err(RequestError::InvalidRequest(self.name.into()));
            }
            Ok(response)
        }

        async fn rejected(&self, error: RequestError, exchange: &Exchange<'_>) -> Result<Response> {
            self.log.lock().unwrap().push(format!("{}:err", self.name));
            if self.recover {
                return Ok(Response::new(
                    StatusCode::OK,
                    Payload::Text("recovered".into()),
                    exchange.config().clone(),
                ));
            }
            Err(error)
        }
    }

    struct NoDispatch;

    #[async_trait]
    impl Dispatch for NoDispatch {
        async fn transmit(&self, _config: &RequestConfig) -> Result<Response> {
            Err(RequestError::InvalidRequest("no dispatch in tests".into()))
        }
    }

    fn ok_response() -> Result<Response> {
        Ok(Response::new(
            StatusCode::OK,
            Payload::Text("ok".into()),
            RequestConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_request_chain_runs_in_registration_order() {
        let manager = InterceptorManager::new();
        manager.add_request_interceptor(Tag("a"));
        manager.add_request_interceptor(NoOpInterceptor);
        manager.add_request_interceptor(Tag("b"));
        manager.add_request_interceptor(Tag("c"));

        let config = manager.run_request_chain(RequestConfig::new()).await.unwrap();
        assert_eq!(config.headers.get("x-trace").unwrap(), "a,b,c");
    }

    #[tokio::test]
    async fn test_request_chain_error_skips_later_fulfilled() {
        let manager = InterceptorManager::new();
        manager.add_request_interceptor(FailRequest);
        manager.add_request_interceptor(Tag("never"));

        let err = manager.run_request_chain(RequestConfig::new()).await.unwrap_err();
        assert!(matches!(err, RequestError::Interceptor(_)));
    }

    #[tokio::test]
    async fn test_response_success_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = InterceptorManager::new();
        manager.add_response_interceptor(Recorder::new("first", &log));
        manager.add_response_interceptor(Recorder::new("second", &log));

        let config = RequestConfig::default();
        let exchange = Exchange::new(&config, &NoDispatch);
        manager.run_response_chain(ok_response(), &exchange).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first:ok", "second:ok"]);
    }

    #[tokio::test]
    async fn test_error_goes_to_next_rejected_and_recovery_resumes_success_path() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = InterceptorManager::new();
        manager.add_response_interceptor(Recorder {
            fail_on_success: true,
            ..Recorder::new("first", &log)
        });
        manager.add_response_interceptor(Recorder {
            recover: true,
            ..Recorder::new("second", &log)
        });
        manager.add_response_interceptor(Recorder::new("third", &log));

        let config = RequestConfig::default();
        let exchange = Exchange::new(&config, &NoDispatch);
        let response = manager.run_response_chain(ok_response(), &exchange).await.unwrap();

        assert_eq!(response.data, Payload::Text("recovered".into()));
        // first 的 fulfilled 抛错，交给 second 的 rejected，恢复后 third 走成功路径
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:ok", "second:err", "third:ok"]
        );
    }

    #[tokio::test]
    async fn test_incoming_error_propagates_when_nobody_recovers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = InterceptorManager::new();
        manager.add_response_interceptor(Recorder::new("first", &log));
        manager.add_response_interceptor(NoOpInterceptor);

        let config = RequestConfig::default();
        let exchange = Exchange::new(&config, &NoDispatch);
        let err = manager
            .run_response_chain(Err(RequestError::InvalidRequest("boom".into())), &exchange)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::InvalidRequest(msg) if msg == "boom"));
        assert_eq!(*log.lock().unwrap(), vec!["first:err"]);
    }

    #[tokio::test]
    async fn test_eject_removes_only_that_entry() {
        let manager = InterceptorManager::new();
        let a = manager.add_request_interceptor(Tag("a"));
        manager.add_request_interceptor(Tag("b"));

        assert!(manager.eject_request_interceptor(a));
        assert!(!manager.eject_request_interceptor(a));
        assert_eq!(manager.request_len(), 1);

        let config = manager.run_request_chain(RequestConfig::new()).await.unwrap();
        assert_eq!(config.headers.get("x-trace").unwrap(), "b");
    }
}
