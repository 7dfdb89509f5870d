//! 协议层错误类型定义

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 机器人标识不合法（空字符串或包含主题保留字符）
    #[error("Invalid robot id: {0:?}")]
    InvalidRobotId(String),

    /// 电量超出 [0, 100]
    #[error("Battery level out of range: {0} (expected 0..=100)")]
    BatteryOutOfRange(u32),

    /// 未知的角色名称
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// 未知的作业状态名称
    #[error("Unknown operational status: {0}")]
    UnknownOperationalStatus(String),

    /// 坐标不是有限实数（NaN/Inf）
    #[error("Non-finite coordinate: ({x}, {y}, {z})")]
    NonFiniteCoordinate { x: f64, y: f64, z: f64 },

    /// JSON 编解码错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
