pub mod coordinator;
pub mod interceptor;

pub use coordinator::{FnRenewer, RefreshCoordinator, TokenRenewer, renew_with};
pub use interceptor::{ExpiryMatcher, RefreshPolicy, TokenAttacher, TokenRefreshInterceptor};
