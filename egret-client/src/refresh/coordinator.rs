use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::oneshot;

use crate::error::RefreshError;

/// token 续期操作
///
/// 具体的认证接口和协议由调用方决定，这里只要求返回新的 token。
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self) -> anyhow::Result<String>;
}

/// 用异步闭包实现的续期操作，见 [`renew_with`]
pub struct FnRenewer<F>(F);

#[async_trait]
impl<F, Fut> TokenRenewer for FnRenewer<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    async fn renew(&self) -> anyhow::Result<String> {
        (self.0)().await
    }
}

/// 把异步闭包包装为 [`TokenRenewer`]
pub fn renew_with<F, Fut>(f: F) -> FnRenewer<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    FnRenewer(f)
}

type Waiter = Box<dyn FnOnce(Result<String, RefreshError>) + Send>;

/// 刷新状态：是否正在刷新 + 等待新 token 的队列
///
/// 只有 `refreshing` 为真时队列才可能非空。
#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: VecDeque<Waiter>,
}

/// token 刷新协调器
///
/// 保证同一时间最多只有一个续期操作在进行。第一个遇到 token 过期的请求
/// 发起续期，之后过期的请求只排队等待；续期结束后按入队顺序把结果交给
/// 每个等待者。续期失败时所有等待者都收到同一个失败，状态回到空闲，
/// 不会自动重试。
pub struct RefreshCoordinator {
    renewer: Arc<dyn TokenRenewer>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new<R>(renewer: R) -> Self
    where
        R: TokenRenewer + 'static,
    {
        Self::from_arc(Arc::new(renewer))
    }

    pub fn from_arc(renewer: Arc<dyn TokenRenewer>) -> Self {
        Self {
            renewer,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// 是否有续期正在进行
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// 当前排队等待新 token 的数量
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// 获取新 token
    ///
    /// 空闲时由当前调用发起续期（自己作为第一个等待者入队）；
    /// 续期进行中则只排队。
    pub async fn fresh_token(&self) -> Result<String, RefreshError> {
        let (tx, rx) = oneshot::channel();
        let leader = self.enqueue(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }));

        if leader {
            debug!("token expired, starting renewal");
            let guard = SettleGuard {
                coordinator: self,
                armed: true,
            };
            let outcome = self
                .renewer
                .renew()
                .await
                .map_err(|e| RefreshError::Renewal(Arc::new(e)));
            guard.finish(outcome);
        } else {
            debug!("token renewal in flight, request queued");
        }

        rx.await.unwrap_or(Err(RefreshError::Cancelled))
    }

    /// 入队；返回 `true` 表示协调器原本空闲，调用方需要发起续期
    fn enqueue(&self, waiter: Waiter) -> bool {
        let mut state = self.lock();
        state.waiters.push_back(waiter);
        if state.refreshing {
            false
        } else {
            state.refreshing = true;
            true
        }
    }

    /// 结束本轮续期：清除标记并取出整个队列，再按顺序通知
    fn settle(&self, outcome: Result<String, RefreshError>) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        match &outcome {
            Ok(_) => debug!("token renewed, releasing {} waiting request(s)", waiters.len()),
            Err(e) => warn!("{e}, rejecting {} waiting request(s)", waiters.len()),
        }

        for waiter in waiters {
            waiter(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 发起续期的 future 被丢弃时，让所有等待者以 `Cancelled` 失败
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl SettleGuard<'_> {
    fn finish(mut self, outcome: Result<String, RefreshError>) {
        self.armed = false;
        self.coordinator.settle(outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.settle(Err(RefreshError::Cancelled));
        }
    }
}
