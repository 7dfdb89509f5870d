//! 日志后端
//!
//! 不连接任何代理，把每条负载通过 `tracing` 打印出来。
//! 适合在没有 MQTT 代理的机器上演示或排查模拟输出。

use crate::{SinkError, TelemetrySink};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct LogSink {
    published: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已输出的消息数量
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl TelemetrySink for LogSink {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        info!(target: "robosim::telemetry", topic, payload = %String::from_utf8_lossy(payload), "publish");
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
