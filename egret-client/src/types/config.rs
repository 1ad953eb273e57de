use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RequestError, Result};
use crate::types::{ContentType, HttpMethod, ParamsSerializer, RequestBody, ResponseMode, ResponseType};

/// 默认超时时间
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// 请求配置
///
/// 客户端默认配置和单次调用的覆盖配置使用同一个结构。
/// 合并时单次调用的字段优先，头部按键逐个合并。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub base_url: Option<String>,
    pub headers: HeaderMap,
    /// 查询参数对象
    pub params: Option<Value>,
    pub data: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub response_return: Option<ResponseMode>,
    pub params_serializer: Option<ParamsSerializer>,
    pub response_type: Option<ResponseType>,
    replayed: bool,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 客户端内置默认值：JSON 内容类型、`raw` 返回方式、10 秒超时
    pub fn client_defaults() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, ContentType::Json.header_value());
        Self {
            headers,
            timeout: Some(DEFAULT_TIMEOUT),
            response_return: Some(ResponseMode::Raw),
            ..Self::default()
        }
    }

    /// 以 `self` 为默认值合并覆盖配置，两边都不会被修改
    pub fn merge(&self, overrides: &RequestConfig) -> RequestConfig {
        let mut headers = self.headers.clone();
        for name in overrides.headers.keys() {
            headers.remove(name);
            for value in overrides.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        RequestConfig {
            method: overrides.method.or(self.method),
            url: overrides.url.clone().or_else(|| self.url.clone()),
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            headers,
            params: overrides.params.clone().or_else(|| self.params.clone()),
            data: overrides.data.clone().or_else(|| self.data.clone()),
            timeout: overrides.timeout.or(self.timeout),
            response_return: overrides.response_return.or(self.response_return),
            params_serializer: overrides
                .params_serializer
                .clone()
                .or_else(|| self.params_serializer.clone()),
            response_type: overrides.response_type.or(self.response_type),
            replayed: overrides.replayed || self.replayed,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// 从字符串设置头部，名称或值非法时返回错误
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RequestError::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RequestError::InvalidRequest(format!("invalid header value for '{name}': {e}")))?;
        Ok(self.with_header(name, value))
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_data(mut self, data: RequestBody) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        Ok(self.with_data(RequestBody::Json(serde_json::to_value(body)?)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_response_return(mut self, mode: ResponseMode) -> Self {
        self.response_return = Some(mode);
        self
    }

    pub fn with_params_serializer(mut self, serializer: impl Into<ParamsSerializer>) -> Self {
        self.params_serializer = Some(serializer.into());
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// 生效的响应模式，未配置时为 `Raw`
    pub fn response_mode(&self) -> ResponseMode {
        self.response_return.unwrap_or_default()
    }

    /// 是否为 token 刷新后重放的请求
    pub fn is_replay(&self) -> bool {
        self.replayed
    }

    pub(crate) fn mark_replayed(&mut self) {
        self.replayed = true;
    }

    /// 拼接 `base_url` 和 `url`；`url` 为绝对地址时直接使用
    pub fn full_url(&self) -> String {
        let url = self.url.as_deref().unwrap_or_default();
        if url.contains("://") {
            return url.to_string();
        }
        match self.base_url.as_deref() {
            Some(base) if !base.is_empty() => {
                if url.is_empty() {
                    base.to_string()
                } else {
                    format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
                }
            }
            _ => url.to_string(),
        }
    }
}

/// 可从配置文件加载的客户端设置
///
/// ```json
/// { "base_url": "https://api.example.com", "timeout_ms": 5000,
///   "response_return": "data", "params_serializer": "brackets",
///   "headers": { "X-Client": "egret" } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: Option<u64>,
    pub response_return: Option<ResponseMode>,
    pub params_serializer: Option<ParamsSerializer>,
}

impl TryFrom<ClientSettings> for RequestConfig {
    type Error = RequestError;

    fn try_from(settings: ClientSettings) -> Result<Self> {
        let mut config = RequestConfig {
            base_url: settings.base_url,
            timeout: settings.timeout_ms.map(Duration::from_millis),
            response_return: settings.response_return,
            params_serializer: settings.params_serializer,
            ..RequestConfig::default()
        };
        for (name, value) in &settings.headers {
            config = config.try_header(name, value)?;
        }
        Ok(config)
    }
}
