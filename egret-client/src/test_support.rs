use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::TransportError;
use crate::transport::Transport;
use crate::types::{Payload, RequestConfig, Response};

type Handler = Arc<dyn Fn(&RequestConfig) -> Result<Response, TransportError> + Send + Sync>;

/// 脚本化的传输层，记录每次收到的请求配置
#[derive(Clone)]
pub struct MockTransport {
    handler: Handler,
    sent: Arc<Mutex<Vec<RequestConfig>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestConfig) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            sent: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// 每次都返回同一个 JSON 响应
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(move |config| Ok(json_response(config, status, body.clone())))
    }

    /// 每次往返前等待，让并发请求真正交错
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<RequestConfig> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, config: &RequestConfig) -> Result<Response, TransportError> {
        self.sent.lock().unwrap().push(config.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(config)
    }
}

pub fn json_response(config: &RequestConfig, status: u16, body: Value) -> Response {
    Response::new(
        StatusCode::from_u16(status).unwrap(),
        Payload::Json(body),
        config.clone(),
    )
}
