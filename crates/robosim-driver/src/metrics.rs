//! 模拟引擎指标
//!
//! 原子计数器，运行线程更新，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 引擎实时指标
///
/// # 使用示例
///
/// ```rust
/// use robosim_driver::SimMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = SimMetrics::new();
/// metrics.position_samples.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().position_samples, 1);
/// ```
#[derive(Debug, Default)]
pub struct SimMetrics {
    /// 产生的位置采样数
    pub position_samples: AtomicU64,

    /// 产生的状态采样数
    pub status_samples: AtomicU64,

    /// 发布失败次数（运行不会因此中止）
    pub publish_failures: AtomicU64,

    pub runs_started: AtomicU64,
    pub runs_completed: AtomicU64,
    pub runs_cancelled: AtomicU64,

    /// 起点与终点重合的运动运行
    pub runs_degenerate: AtomicU64,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器
    ///
    /// 各计数器分别原子读取，彼此之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            position_samples: self.position_samples.load(Ordering::Relaxed),
            status_samples: self.status_samples.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            runs_degenerate: self.runs_degenerate.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.position_samples.store(0, Ordering::Relaxed);
        self.status_samples.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
        self.runs_started.store(0, Ordering::Relaxed);
        self.runs_completed.store(0, Ordering::Relaxed);
        self.runs_cancelled.store(0, Ordering::Relaxed);
        self.runs_degenerate.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub position_samples: u64,
    pub status_samples: u64,
    pub publish_failures: u64,
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_cancelled: u64,
    pub runs_degenerate: u64,
}

impl MetricsSnapshot {
    /// 已结束的运行数
    pub fn runs_finished(&self) -> u64 {
        self.runs_completed + self.runs_cancelled + self.runs_degenerate
    }

    /// 发布失败率（百分比）
    ///
    /// 没有任何采样时返回 0.0。
    pub fn publish_failure_rate(&self) -> f64 {
        let total = self.position_samples + self.status_samples;
        if total == 0 {
            return 0.0;
        }
        (self.publish_failures as f64 / total as f64) * 100.0
    }
}
