//! 时钟抽象
//!
//! 运行线程只通过 [`Clock`] 读取时间和等待采样周期：
//!
//! - [`SystemClock`]: 墙上时间，等待期间可被 [`CancelToken`] 立即唤醒
//! - [`SimulatedClock`]: 虚拟时间，每次等待把时间推进一个周期后立即返回，
//!   用于确定性测试、基准和 CLI 的 `--simulated` 模式
//!
//! 模拟器启动每个运行时调用 [`Clock::fork`]，虚拟时钟借此给每个运行
//! 一条独立的时间线。

use crate::cancel::CancelToken;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// 等满了周期
    Elapsed,
    /// 等待期间（或之前）收到取消
    Cancelled,
}

/// 时钟 Trait
///
/// 实现必须是 `Send + Sync`：同一个时钟被所有运行线程共享。
pub trait Clock: Send + Sync {
    /// 当前 UTC 时间（用于负载时间戳）
    fn now_utc(&self) -> DateTime<Utc>;

    /// 等待 `interval`，取消时提前返回
    fn sleep(&self, interval: Duration, cancel: &CancelToken) -> WaitOutcome;

    /// 为新运行派生时钟，返回 `None` 表示所有运行共用本时钟
    fn fork(&self) -> Option<Arc<dyn Clock>> {
        None
    }
}

/// 墙上时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, interval: Duration, cancel: &CancelToken) -> WaitOutcome {
        if cancel.wait_timeout(interval) {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Elapsed
        }
    }
}

/// 虚拟时钟
///
/// 时间只在 `sleep`/`advance` 时前进。[`fork`](Clock::fork) 得到的副本从
/// 当前虚拟时间出发、各自前进，并发运行互不推进对方的时间，
/// 样本时间戳只取决于该运行自己的周期。
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use robosim_driver::{CancelToken, Clock, SimulatedClock, WaitOutcome};
/// use std::time::Duration;
///
/// let clock = SimulatedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
/// let token = CancelToken::new();
/// assert_eq!(clock.sleep(Duration::from_secs(2), &token), WaitOutcome::Elapsed);
/// assert_eq!(clock.now_utc(), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 2).unwrap());
/// ```
#[derive(Debug)]
pub struct SimulatedClock {
    now: Mutex<DateTime<Utc>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 从当前墙上时间开始
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// 手动推进虚拟时间（溢出时保持不变）
    pub fn advance(&self, interval: Duration) {
        let Ok(delta) = TimeDelta::from_std(interval) else {
            return;
        };
        let mut now = self.now.lock();
        if let Some(next) = now.checked_add_signed(delta) {
            *now = next;
        }
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for SimulatedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn sleep(&self, interval: Duration, cancel: &CancelToken) -> WaitOutcome {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        self.advance(interval);
        WaitOutcome::Elapsed
    }

    fn fork(&self) -> Option<Arc<dyn Clock>> {
        Some(Arc::new(SimulatedClock::new(self.now_utc())))
    }
}
