//! # Robosim Sink Layer
//!
//! 遥测传输抽象层：核心引擎只依赖 [`TelemetrySink`]，具体的消息代理、
//! 日志输出、进程内通道等实现都在本 crate 中以后端形式提供。
//!
//! | 后端 | 说明 |
//! |------|------|
//! | [`LogSink`] | 通过 `tracing` 输出，每条负载一行日志 |
//! | [`ChannelSink`] | crossbeam 通道，供进程内消费者/测试读取 |
//! | [`JsonLinesSink`] | 每条消息写一行 JSON（含主题） |
//! | `MqttSink` | MQTT 代理（需启用 `mqtt` feature） |

use std::sync::Arc;
use thiserror::Error;

pub mod channel;
pub mod jsonl;
pub mod log;
#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use channel::{ChannelSink, PublishedMessage};
pub use jsonl::{JsonLinesRecord, JsonLinesSink};
pub use log::LogSink;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttSink, MqttSinkConfig};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 传输尚未就绪（未连接代理）
    #[error("Sink not connected")]
    NotConnected,
    /// 对端已关闭（通道接收端被丢弃等）
    #[error("Sink disconnected")]
    Disconnected,
    /// 缓冲区已满，消息被丢弃
    #[error("Sink buffer full")]
    Full,
    /// 后端特定错误
    #[error("Backend error: {0}")]
    Backend(String),
}

/// 遥测发布接口
///
/// 由运动模拟与状态发布线程并发调用，因此要求 `Send + Sync`，
/// 所有方法都以 `&self` 调用，后端自行负责内部同步。
///
/// # 示例
///
/// ```rust
/// use robosim_sink::{SinkError, TelemetrySink};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct CountingSink(AtomicUsize);
///
/// impl TelemetrySink for CountingSink {
///     fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), SinkError> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
///
/// let sink = CountingSink(AtomicUsize::new(0));
/// sink.publish("robot/R1/status", b"{}").unwrap();
/// assert_eq!(sink.0.load(Ordering::Relaxed), 1);
/// ```
pub trait TelemetrySink: Send + Sync {
    /// 发布一条负载
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError>;

    /// 传输是否可用（例如已连接到代理）
    ///
    /// 默认总是就绪；需要建立连接的后端应覆盖此方法。
    fn is_ready(&self) -> bool {
        true
    }

    /// 后端名称（用于日志）
    fn name(&self) -> &str {
        "sink"
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        (**self).publish(topic, payload)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
