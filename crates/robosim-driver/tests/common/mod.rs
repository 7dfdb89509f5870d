//! 集成测试共享的辅助类型

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use robosim_driver::{CancelToken, RobotId, RunObserver, SimulatedClock};
use robosim_sink::{SinkError, TelemetrySink};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub fn robot(id: &str) -> RobotId {
    RobotId::new(id).unwrap()
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub fn simulated_clock() -> Arc<SimulatedClock> {
    Arc::new(SimulatedClock::new(epoch()))
}

/// 在第 N 个位置采样之后取消
pub struct CancelAfterPositions {
    pub n: u64,
    pub cancel: CancelToken,
    seen: AtomicU64,
}

impl CancelAfterPositions {
    pub fn new(n: u64, cancel: CancelToken) -> Self {
        Self {
            n,
            cancel,
            seen: AtomicU64::new(0),
        }
    }
}

impl RunObserver for CancelAfterPositions {
    fn on_position_sample(&self, _robot: &RobotId, _x: f64, _y: f64, _progress: f64) {
        if self.seen.fetch_add(1, Ordering::Relaxed) + 1 >= self.n {
            self.cancel.cancel();
        }
    }
}

/// 总是失败的传输
#[derive(Default)]
pub struct FailingSink {
    pub attempts: AtomicU64,
}

impl TelemetrySink for FailingSink {
    fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(SinkError::Backend("broker unreachable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
