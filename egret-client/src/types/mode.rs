use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RequestError, Result};
use crate::types::{Payload, Response};

/// 响应数据的返回方式
///
/// - `Raw`: 完整的响应信封（状态码、头部、响应体），不做任何检查
/// - `Body`: 只返回响应体，仅根据状态码判断是否成功
/// - `Data`: 解构 `{code, message, data}`，只返回 `data`，同时检查状态码和 `code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Raw,
    Body,
    Data,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Raw => "raw",
            ResponseMode::Body => "body",
            ResponseMode::Data => "data",
        }
    }

    /// 按当前模式拆解响应
    pub fn apply(self, response: Response) -> Result<Reply> {
        match self {
            ResponseMode::Raw => Ok(Reply::Raw(response)),
            ResponseMode::Body => {
                self.ensure_status(&response)?;
                Ok(Reply::Body(response.data))
            }
            ResponseMode::Data => {
                self.ensure_status(&response)?;
                let status = response.status;
                let mut body = match response.data {
                    Payload::Json(Value::Object(body)) => body,
                    other => {
                        return Err(RequestError::ResponseMode {
                            mode: self,
                            status,
                            payload: other.into_json(),
                        });
                    }
                };

                // `0` 与 `0.0` 都算成功
                if body.get("code").and_then(Value::as_f64) != Some(0.0) {
                    return Err(RequestError::ResponseMode {
                        mode: self,
                        status,
                        payload: Value::Object(body),
                    });
                }

                Ok(Reply::Data(body.remove("data").unwrap_or(Value::Null)))
            }
        }
    }

    /// `Raw` 以外的模式要求 2xx 状态码
    pub fn ensure_status(self, response: &Response) -> Result<()> {
        if self == ResponseMode::Raw || response.status.is_success() {
            return Ok(());
        }
        Err(RequestError::ResponseMode {
            mode: self,
            status: response.status,
            payload: response.data.clone().into_json(),
        })
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 按响应模式拆解后的结果
#[derive(Debug, Clone)]
pub enum Reply {
    Raw(Response),
    Body(Payload),
    Data(Value),
}

impl Reply {
    /// 转换为 JSON 值；`Raw` 转换为 `{status, statusText, headers, data}`
    pub fn into_value(self) -> Value {
        match self {
            Reply::Raw(response) => response.to_envelope(),
            Reply::Body(payload) => payload.into_json(),
            Reply::Data(value) => value,
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        if let Reply::Body(Payload::Binary(_)) = self {
            return Err(RequestError::InvalidRequest(
                "binary payload cannot be deserialized, use download() instead".into(),
            ));
        }
        Ok(serde_json::from_value(self.into_value())?)
    }
}
