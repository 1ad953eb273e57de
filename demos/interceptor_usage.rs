use async_trait::async_trait;
use egret_client::{
    Exchange, RequestClient, RequestConfig, RequestInterceptor, Response, ResponseInterceptor,
    ResponseMode, Result,
};
use serde::Deserialize;
use serde_json::json;

/// 用户数据结构
#[derive(Debug, Deserialize)]
struct User {
    id: u32,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: u32,
    #[serde(rename = "userId")]
    user_id: u32,
    title: String,
}

/// 认证拦截器 - 自动添加认证头部
struct AuthInterceptor;

#[async_trait]
impl RequestInterceptor for AuthInterceptor {
    async fn fulfilled(&self, config: RequestConfig) -> Result<RequestConfig> {
        println!("🔐 AuthInterceptor: 添加认证头部");
        config.try_header("Authorization", "Bearer demo-token-12345")
    }
}

/// 日志拦截器 - 记录响应信息
struct LoggingInterceptor;

#[async_trait]
impl ResponseInterceptor for LoggingInterceptor {
    async fn fulfilled(&self, response: Response, exchange: &Exchange<'_>) -> Result<Response> {
        println!(
            "📝 LoggingInterceptor: {} {} -> {}, 内容类型: {:?}",
            exchange.config().method.unwrap_or_default(),
            exchange.config().full_url(),
            response.status,
            response.header_str("content-type"),
        );
        Ok(response)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("=== Egret HTTP Client Interceptor Usage Example ===\n");

    let client = RequestClient::new(
        RequestConfig::new()
            .with_base_url("https://jsonplaceholder.typicode.com")
            .with_response_return(ResponseMode::Body),
    );
    client.add_request_interceptor(AuthInterceptor);
    let logging = client.add_response_interceptor(LoggingInterceptor);

    // 示例1：请求拦截器 + 响应拦截器
    println!("1. 获取用户（认证拦截器 + 日志拦截器）...");
    match client.get::<User>("/users/1", RequestConfig::new()).await {
        Ok(user) => println!("   ✅ 成功获取用户: {} <{}> (id={})\n", user.name, user.email, user.id),
        Err(e) => println!("   ❌ 错误: {}\n", e),
    }

    // 示例2：数组参数按 repeat 格式序列化
    println!("2. 查询多个用户的文章（params_serializer = repeat）...");
    let config = RequestConfig::new()
        .with_params(json!({"userId": [1, 2]}))
        .with_params_serializer("repeat");
    match client.get::<Vec<Post>>("/posts", config).await {
        Ok(posts) => {
            println!("   ✅ 共 {} 篇文章", posts.len());
            if let Some(post) = posts.first() {
                println!("   第一篇: #{} (user {}) {}\n", post.id, post.user_id, post.title);
            }
        }
        Err(e) => println!("   ❌ 错误: {}\n", e),
    }

    // 示例3：移除日志拦截器
    println!("3. 移除日志拦截器后再次请求...");
    client.eject_response_interceptor(logging);
    match client.get::<User>("/users/2", RequestConfig::new()).await {
        Ok(user) => println!("   ✅ 成功获取用户: {}\n", user.name),
        Err(e) => println!("   ❌ 错误: {}\n", e),
    }

    println!("拦截器示例运行完成！");

    Ok(())
}
