use async_trait::async_trait;
use log::debug;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::multipart::{Form, Part};

use crate::error::TransportError;
use crate::transfer::{MultipartForm, PartValue};
use crate::types::params::stringify;
use crate::types::{
    ArrayFormat, ContentType, ParamsSerializer, Payload, RequestBody, RequestConfig, Response,
};

/// 底层 HTTP 传输
///
/// 只负责一次网络往返：按配置发出请求，把响应体按 `response_type` 解码。
/// 不检查状态码，非 2xx 也作为正常响应返回。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, config: &RequestConfig) -> Result<Response, TransportError>;
}

/// 基于 reqwest 的默认传输实现
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义的 reqwest 客户端（代理、证书等）
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, config: &RequestConfig) -> Result<Response, TransportError> {
        let method = config.method.unwrap_or_default();
        let url = request_url(config);
        debug!("{method} {url}");

        let mut headers = config.headers.clone();
        let mut builder = self.client.request(method.to_reqwest(), &url);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        match &config.data {
            Some(RequestBody::Json(value)) => {
                builder = builder.json(value);
            }
            Some(RequestBody::Form(value)) => {
                headers.insert(CONTENT_TYPE, ContentType::FormUrlEncoded.header_value());
                builder = builder.form(value);
            }
            Some(RequestBody::Bytes(bytes)) => {
                builder = builder.body(bytes.clone());
            }
            Some(RequestBody::Multipart(form)) => {
                // boundary 由 reqwest 生成，不能沿用配置里的内容类型
                headers.remove(CONTENT_TYPE);
                builder = builder.multipart(to_reqwest_form(form)?);
            }
            None => {}
        }

        let response = builder.headers(headers).send().await?;
        let status = response.status();
        let response_headers: HeaderMap = response.headers().clone();
        let bytes = response.bytes().await?;
        debug!("{method} {url} -> {status} ({} bytes)", bytes.len());

        let data = Payload::decode(&bytes, config.response_type.unwrap_or_default());
        Ok(Response {
            status,
            headers: response_headers,
            data,
            config: config.clone(),
        })
    }
}

/// 完整的请求地址，已按配置的序列化方式附加查询字符串
///
/// 没有配置序列化方式，或名称无法识别时，按 `brackets` 格式编码。
pub fn request_url(config: &RequestConfig) -> String {
    let mut url = config.full_url();
    let Some(params) = &config.params else {
        return url;
    };

    let query = match config.params_serializer.as_ref().and_then(ParamsSerializer::resolve) {
        Some(serialize) => serialize(params),
        None => stringify(params, ArrayFormat::Brackets),
    };
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }
    url
}

fn to_reqwest_form(form: &MultipartForm) -> Result<Form, TransportError> {
    let mut multipart = Form::new();
    for part in &form.parts {
        multipart = match &part.value {
            PartValue::Text(text) => multipart.text(part.name.clone(), text.clone()),
            PartValue::File(file) => {
                let mut file_part =
                    Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
                if let Some(content_type) = &file.content_type {
                    file_part = file_part
                        .mime_str(content_type)
                        .map_err(|e| TransportError::Builder(e.to_string()))?;
                }
                multipart.part(part.name.clone(), file_part)
            }
        };
    }
    Ok(multipart)
}
