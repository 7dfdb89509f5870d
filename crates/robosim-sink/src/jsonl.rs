//! JSON Lines 后端
//!
//! 每条发布写一行 `{"topic": ..., "payload": {...}}`，便于离线回看或用
//! `jq` 处理模拟输出。负载不是合法 JSON 时以字符串形式写入。

use crate::{SinkError, TelemetrySink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 输出文件中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLinesRecord {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// JSON Lines 后端
///
/// 写入端由互斥锁保护，多个运行线程交错写入时每行仍然完整。
/// 每行写完立即 flush，`tail -f` 可以实时看到输出。
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<BufWriter<File>> {
    /// 创建（或截断）输出文件
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 取回底层写入端
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        let payload = serde_json::from_slice(payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())
        });
        let record = JsonLinesRecord {
            topic: topic.to_string(),
            payload,
        };
        let line =
            serde_json::to_string(&record).map_err(|e| SinkError::Backend(e.to_string()))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
