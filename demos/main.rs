use async_trait::async_trait;
use egret_client::transport::request_url;
use egret_client::{
    Payload, Reply, RequestClient, RequestConfig, RequestError, Response, ResponseMode, Transport,
    TransportError,
};
use log::info;
use reqwest::StatusCode;
use serde_json::{Value, json};

/// 固定返回同一个业务响应的离线传输层
struct CannedTransport {
    body: Value,
}

#[async_trait]
impl Transport for CannedTransport {
    async fn send(&self, config: &RequestConfig) -> Result<Response, TransportError> {
        info!("-> {}", request_url(config));
        Ok(Response::new(StatusCode::OK, Payload::Json(self.body.clone()), config.clone()))
    }
}

fn client_with(body: Value) -> RequestClient {
    RequestClient::with_transport(
        RequestConfig::new().with_base_url("https://api.example.com"),
        CannedTransport { body },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("=== Egret HTTP Client Response Modes ===\n");

    let client = client_with(json!({"code": 0, "message": "ok", "data": {"id": 1}}));

    for mode in [ResponseMode::Raw, ResponseMode::Body, ResponseMode::Data] {
        let reply = client
            .send("/users/1", RequestConfig::new().with_response_return(mode))
            .await?;
        match reply {
            Reply::Raw(response) => println!("raw  -> status {} {:?}", response.status, response.data),
            Reply::Body(payload) => println!("body -> {:?}", payload),
            Reply::Data(value) => println!("data -> {}", value),
        }
    }

    println!("\n业务码非 0 的响应:");
    let failing = client_with(json!({"code": 1, "message": "bad"}));
    let config = RequestConfig::new().with_response_return(ResponseMode::Data);
    match failing.get::<Value>("/users/1", config).await {
        Err(RequestError::ResponseMode { mode, payload, .. }) => {
            println!("   ❌ {} 模式拒绝了响应: {}", mode, payload)
        }
        other => println!("   意外的结果: {:?}", other),
    }

    println!("\n数组参数的四种序列化格式:");
    for format in ["brackets", "comma", "indices", "repeat"] {
        let config = RequestConfig::new()
            .with_params(json!({"ids": [1, 2, 3]}))
            .with_params_serializer(format);
        let _: Value = client.get("/search", config).await?;
    }

    Ok(())
}
