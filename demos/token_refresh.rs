use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use egret_client::{
    Payload, RequestClient, RequestConfig, Response, ResponseMode, Transport, TransportError,
    renew_with,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

/// 进程内的模拟服务端：只接受当前有效的 token
struct FakeAuthServer {
    valid_token: &'static str,
}

#[async_trait]
impl Transport for FakeAuthServer {
    async fn send(&self, config: &RequestConfig) -> Result<Response, TransportError> {
        tokio::time::sleep(Duration::from_millis(20)).await;

        let expected = format!("Bearer {}", self.valid_token);
        let authorized = config
            .headers
            .get("authorization")
            .is_some_and(|value| value.as_bytes() == expected.as_bytes());

        let (status, body) = if authorized {
            (StatusCode::OK, json!({"code": 0, "message": "ok", "data": {"path": config.full_url()}}))
        } else {
            (StatusCode::UNAUTHORIZED, json!({"code": 40100, "message": "token expired"}))
        };
        Ok(Response::new(status, Payload::Json(body), config.clone()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    println!("=== Egret HTTP Client Token Refresh Example ===\n");

    let client = Arc::new(RequestClient::with_transport(
        RequestConfig::new()
            .with_base_url("https://api.example.com")
            .with_response_return(ResponseMode::Data)
            .try_header("Authorization", "Bearer stale-token")?,
        FakeAuthServer {
            valid_token: "fresh-token",
        },
    ));

    let renewals = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&renewals);
    client.enable_token_refresh(renew_with(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            println!("🔄 续期 token 中...");
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok("fresh-token".to_string())
        }
    }));

    println!("并发发出 5 个携带过期 token 的请求...");
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..5 {
        let client = Arc::clone(&client);
        tasks.spawn(async move { client.get::<Value>(&format!("/orders/{i}"), RequestConfig::new()).await });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(data) => println!("   ✅ {}", data["path"]),
            Err(e) => println!("   ❌ 错误: {}", e),
        }
    }

    println!("\n续期次数: {}", renewals.load(Ordering::SeqCst));
    Ok(())
}
