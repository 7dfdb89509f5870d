//! 协作式取消令牌
//!
//! 每个运行持有一个令牌。运行在每次发布前检查标志，并在周期等待中
//! 通过 `recv_timeout` 阻塞在唤醒通道上，因此取消在等待期间立即生效，
//! 而不是等满整个周期。
//!
//! `cancel()` 只做一次原子写和一次 `try_send`，永不阻塞调用方。

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

/// 取消令牌（可克隆，克隆之间共享同一状态）
///
/// # Example
///
/// ```
/// use robosim_driver::CancelToken;
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let waiter = token.clone();
/// token.cancel();
/// assert!(waiter.wait_timeout(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        // 容量 1：只需要一个唤醒信号，重复取消由标志去重
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// 请求取消（幂等、非阻塞）
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            let _ = self.inner.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// 等待最多 `timeout`，返回期间是否被取消
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.inner.wake_rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.is_cancelled()
            },
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
