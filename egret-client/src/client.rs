use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RequestError, Result};
use crate::interceptor::{
    Dispatch, Exchange, InterceptorHandle, InterceptorManager, RequestInterceptor,
    ResponseInterceptor,
};
use crate::refresh::{RefreshPolicy, TokenRefreshInterceptor, TokenRenewer};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{ClientSettings, HttpMethod, Reply, RequestConfig, Response, ResponseMode};

/// 请求客户端
///
/// 一次调用的完整流程：
/// 1. 单次调用配置合并到客户端默认配置上
/// 2. 依次执行请求拦截器
/// 3. 传输层往返，非 2xx 响应转为 `RequestError::Status`
/// 4. 依次执行响应拦截器（token 刷新在这里恢复过期的请求）
/// 5. 错误归一化，再按响应模式拆解结果
///
/// 每个客户端持有自己的默认配置、拦截器和刷新状态，互不影响。
pub struct RequestClient {
    defaults: RequestConfig,
    transport: Arc<dyn Transport>,
    interceptors: InterceptorManager,
}

impl RequestClient {
    /// 使用 reqwest 传输层创建客户端，`options` 覆盖内置默认值
    pub fn new(options: RequestConfig) -> Self {
        Self::with_transport(options, ReqwestTransport::new())
    }

    pub fn with_transport<T>(options: RequestConfig, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        let defaults = RequestConfig::client_defaults().merge(&options);
        debug!(
            "request client created (base_url: {:?}, mode: {})",
            defaults.base_url,
            defaults.response_mode()
        );
        Self {
            defaults,
            transport: Arc::new(transport),
            interceptors: InterceptorManager::new(),
        }
    }

    /// 从配置文件中的设置创建客户端
    pub fn from_settings(settings: ClientSettings) -> Result<Self> {
        Ok(Self::new(RequestConfig::try_from(settings)?))
    }

    pub fn defaults(&self) -> &RequestConfig {
        &self.defaults
    }

    pub fn add_request_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: RequestInterceptor + 'static,
    {
        self.interceptors.add_request_interceptor(interceptor)
    }

    pub fn add_response_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: ResponseInterceptor + 'static,
    {
        self.interceptors.add_response_interceptor(interceptor)
    }

    pub fn eject_request_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.interceptors.eject_request_interceptor(handle)
    }

    pub fn eject_response_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.interceptors.eject_response_interceptor(handle)
    }

    /// 启用 token 过期自动刷新（401 触发，`Authorization: Bearer` 附加）
    pub fn enable_token_refresh<R>(&self, renewer: R) -> InterceptorHandle
    where
        R: TokenRenewer + 'static,
    {
        self.enable_token_refresh_with(renewer, RefreshPolicy::default())
    }

    pub fn enable_token_refresh_with<R>(&self, renewer: R, policy: RefreshPolicy) -> InterceptorHandle
    where
        R: TokenRenewer + 'static,
    {
        self.add_response_interceptor(TokenRefreshInterceptor::with_policy(renewer, policy))
    }

    /// 发送请求，返回按响应模式拆解后的结果
    pub async fn send(&self, url: &str, config: RequestConfig) -> Result<Reply> {
        let (mode, response) = self.fetch(url, config).await?;
        mode.apply(response)
    }

    /// 发送请求并把结果反序列化为 `T`
    pub async fn request<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<T> {
        self.send(url, config).await?.deserialize()
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<T> {
        self.request(url, config.with_method(HttpMethod::Get)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<T> {
        self.request(url, config.with_method(HttpMethod::Delete)).await
    }

    /// `data` 序列化为 JSON 请求体，覆盖 `config.data`
    pub async fn post<T, B>(&self, url: &str, data: &B, config: RequestConfig) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let config = config.with_method(HttpMethod::Post).with_json(data)?;
        self.request(url, config).await
    }

    pub async fn put<T, B>(&self, url: &str, data: &B, config: RequestConfig) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let config = config.with_method(HttpMethod::Put).with_json(data)?;
        self.request(url, config).await
    }

    /// 走完整流程，返回生效的响应模式和最终响应
    pub(crate) async fn fetch(&self, url: &str, config: RequestConfig) -> Result<(ResponseMode, Response)> {
        let config = self.defaults.merge(&config.with_url(url));
        let mode = config.response_mode();
        let response = self.execute(config).await.map_err(normalize)?;
        Ok((mode, response))
    }

    async fn execute(&self, config: RequestConfig) -> Result<Response> {
        let (outcome, sent) = match self.interceptors.run_request_chain(config.clone()).await {
            Ok(prepared) => (self.round_trip(&prepared).await, Some(prepared)),
            // 请求链失败时不发送，错误直接进入响应链
            Err(error) => (Err(error), None),
        };

        let exchange = Exchange::new(sent.as_ref().unwrap_or(&config), self).with_origin(&config);
        self.interceptors.run_response_chain(outcome, &exchange).await
    }

    async fn round_trip(&self, config: &RequestConfig) -> Result<Response> {
        let response = self.transport.send(config).await?;
        if response.status.is_success() {
            Ok(response)
        } else {
            debug!("{} responded with {}", config.full_url(), response.status);
            Err(RequestError::Status(Box::new(response)))
        }
    }
}

#[async_trait]
impl Dispatch for RequestClient {
    async fn prepare(&self, config: RequestConfig) -> Result<RequestConfig> {
        self.interceptors.run_request_chain(config).await
    }

    async fn transmit(&self, config: &RequestConfig) -> Result<Response> {
        self.round_trip(config).await
    }
}

/// 带结构化响应体的失败响应转为 `Api` 错误，其余错误原样返回
fn normalize(error: RequestError) -> RequestError {
    match error {
        RequestError::Status(response) if response.data.is_structured() => {
            let Response { status, data, .. } = *response;
            warn!("api error with status {status}");
            RequestError::Api {
                status,
                body: data.into_json(),
            }
        }
        other => other,
    }
}
