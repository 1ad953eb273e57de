pub mod manager;
pub mod traits;

pub use manager::{InterceptorHandle, InterceptorManager};
pub use traits::{Dispatch, Exchange, NoOpInterceptor, RequestInterceptor, ResponseInterceptor};
