//! 进程内通道后端
//!
//! 把每条发布转发到 crossbeam 通道，供同进程的消费者（UI 刷新、测试断言、
//! 转发线程）读取。

use crate::{SinkError, TelemetrySink};
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// 一条已发布的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// 以 UTF-8 文本查看负载（非法字节用替换字符）
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// crossbeam 通道后端
///
/// - `unbounded()`：永不丢弃
/// - `bounded(n)`：使用 `try_send`，缓冲区满时返回 [`SinkError::Full`]，不阻塞发布线程
///
/// 接收端全部丢弃后，发布返回 [`SinkError::Disconnected`]。
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<PublishedMessage>,
}

impl ChannelSink {
    pub fn unbounded() -> (Self, Receiver<PublishedMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<PublishedMessage>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        let message = PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        };
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkError::Full),
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Disconnected),
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
