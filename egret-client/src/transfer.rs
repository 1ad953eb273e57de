//! 文件上传与下载

use std::path::Path;

use log::debug;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::RequestClient;
use crate::error::Result;
use crate::types::{ContentType, HttpMethod, RequestBody, RequestConfig, Response, ResponseMode, ResponseType};

/// multipart 表单描述
///
/// 只保存字段内容，发送时才由传输层构造真正的 multipart 请求体，
/// 所以 token 刷新后重放请求可以重新构造。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File(UploadFile),
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: PartValue::Text(value.into()),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: UploadFile) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: PartValue::File(file),
        });
        self
    }

    /// 把一个 JSON 对象的字段追加为文本字段
    ///
    /// 数组展开为 `key[0]`、`key[1]`……；`null` 被跳过；嵌套对象以 JSON 文本发送。
    pub fn fields(mut self, values: &Value) -> Self {
        let Value::Object(map) = values else {
            return self;
        };
        for (key, value) in map {
            match value {
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        if let Some(text) = field_text(item) {
                            self = self.text(format!("{key}[{index}]"), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = field_text(other) {
                        self = self.text(key.clone(), text);
                    }
                }
            }
        }
        self
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// 待上传的文件
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// 读取本地文件，根据扩展名推断 MIME 类型
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let content_type = mime_guess::from_path(path).first().map(|mime| mime.to_string());

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

/// 下载得到的文件
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    /// 来自 `Content-Disposition`
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DownloadedFile {
    pub fn from_response(response: Response) -> Self {
        let file_name = response
            .header_str(CONTENT_DISPOSITION)
            .and_then(parse_file_name);
        let content_type = response.header_str(CONTENT_TYPE).map(str::to_string);

        Self {
            file_name,
            content_type,
            bytes: response.data.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 写入本地文件
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(path.as_ref(), &self.bytes).await?;
        debug!("saved {} bytes to {}", self.bytes.len(), path.as_ref().display());
        Ok(())
    }
}

/// 从 `Content-Disposition` 中取文件名，`filename*` 优先
fn parse_file_name(disposition: &str) -> Option<String> {
    let mut plain = None;
    for directive in disposition.split(';').map(str::trim) {
        let Some((key, value)) = directive.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // RFC 5987: charset'lang'percent-encoded
                let encoded = value.trim().splitn(3, '\'').nth(2).unwrap_or(value.trim());
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }
    plain.filter(|name| !name.is_empty())
}

impl RequestClient {
    /// 以 multipart 表单上传
    ///
    /// 调用方没有指定 `Content-Type` 时使用 `multipart/form-data`。
    pub async fn upload<T: DeserializeOwned>(
        &self,
        url: &str,
        form: MultipartForm,
        config: RequestConfig,
    ) -> Result<T> {
        let mut config = config
            .with_method(HttpMethod::Post)
            .with_data(RequestBody::Multipart(form));
        if !config.headers.contains_key(CONTENT_TYPE) {
            config
                .headers
                .insert(CONTENT_TYPE, ContentType::FormMultipart.header_value());
        }
        self.request(url, config).await
    }

    /// 下载文件
    ///
    /// 响应按二进制读取。调用方没有选择 `raw` 时按 `body` 模式检查状态码，
    /// `data` 模式对二进制内容没有意义，同样按 `body` 处理。
    /// 调用方没有指定 `Content-Type`/`Accept` 时使用 `application/octet-stream`。
    pub async fn download(&self, url: &str, config: RequestConfig) -> Result<DownloadedFile> {
        let mode = match config.response_return {
            Some(ResponseMode::Raw) => ResponseMode::Raw,
            _ => ResponseMode::Body,
        };
        let mut config = config
            .with_method(HttpMethod::Get)
            .with_response_type(ResponseType::Binary)
            .with_response_return(mode);
        for name in [CONTENT_TYPE, ACCEPT] {
            if !config.headers.contains_key(&name) {
                config
                    .headers
                    .insert(name, ContentType::OctetStream.header_value());
            }
        }

        let (mode, response) = self.fetch(url, config).await?;
        mode.ensure_status(&response)?;
        let file = DownloadedFile::from_response(response);
        if file.is_empty() {
            debug!("download from {url} returned an empty body");
        }
        Ok(file)
    }
}
