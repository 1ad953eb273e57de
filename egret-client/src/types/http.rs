use std::fmt;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};

use crate::transfer::MultipartForm;
use crate::types::RequestConfig;

/// HTTP 方法枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// 返回HTTP方法的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// 转换为 reqwest 的方法类型
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 内容类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    FormUrlEncoded,
    FormMultipart,
    OctetStream,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json;charset=utf-8",
            ContentType::FormUrlEncoded => "application/x-www-form-urlencoded;charset=utf-8",
            ContentType::FormMultipart => "multipart/form-data;charset=utf-8",
            ContentType::OctetStream => "application/octet-stream;charset=utf-8",
        }
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// 响应体的解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// 尝试按 JSON 解析，失败时保留文本
    #[default]
    Json,
    Text,
    Binary,
}

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// `application/x-www-form-urlencoded`，值必须是扁平对象
    Form(Value),
    Multipart(MultipartForm),
    Bytes(Vec<u8>),
}

/// 解码后的响应体
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// 按请求期望的类型解码原始字节
    pub fn decode(bytes: &[u8], response_type: ResponseType) -> Self {
        match response_type {
            ResponseType::Binary => Payload::Binary(bytes.to_vec()),
            ResponseType::Text => Payload::Text(String::from_utf8_lossy(bytes).into_owned()),
            ResponseType::Json => {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Payload::Json(Value::Null);
                }
                match serde_json::from_slice(bytes) {
                    Ok(value) => Payload::Json(value),
                    Err(_) => Payload::Text(String::from_utf8_lossy(bytes).into_owned()),
                }
            }
        }
    }

    /// 是否为结构化（非空 JSON）数据
    pub fn is_structured(&self) -> bool {
        matches!(self, Payload::Json(value) if !value.is_null())
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// 转换为 JSON 值；二进制数据无法表示，返回 `Null`
    pub fn into_json(self) -> Value {
        match self {
            Payload::Json(value) => value,
            Payload::Text(text) => Value::String(text),
            Payload::Binary(_) => Value::Null,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Binary(bytes) => bytes,
            Payload::Text(text) => text.into_bytes(),
            Payload::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// 传输层返回的完整响应
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub data: Payload,
    /// 实际发出的请求配置
    pub config: RequestConfig,
}

impl Response {
    pub fn new(status: StatusCode, data: Payload, config: RequestConfig) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            data,
            config,
        }
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn header_str(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// `raw` 模式下用于反序列化的信封对象
    pub fn to_envelope(&self) -> Value {
        let mut headers = Map::new();
        for (name, value) in &self.headers {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }

        let mut envelope = Map::new();
        envelope.insert("status".into(), Value::from(self.status.as_u16()));
        envelope.insert(
            "statusText".into(),
            Value::String(self.status.canonical_reason().unwrap_or_default().to_string()),
        );
        envelope.insert("headers".into(), Value::Object(headers));
        envelope.insert("data".into(), self.data.clone().into_json());
        Value::Object(envelope)
    }
}
