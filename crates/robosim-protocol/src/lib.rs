//! # Robosim Protocol
//!
//! 机器人遥测数据模型与 JSON 线格式定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `types`: 机器人标识、位置、状态等核心数据类型
//! - `topics`: 发布主题命名规则
//! - `payload`: 位置/状态遥测负载（JSON）
//! - `geometry`: 航向计算与数值舍入
//!
//! ## 线格式
//!
//! ```text
//! robot/{robot_id}/position  {"robot_id", "timestamp", "position": {x, y, z}, "heading"}
//! robot/{robot_id}/status    {"robot_id", "timestamp", "battery_level", "role", "operational_status"}
//! ```

mod error;
pub mod geometry;
pub mod payload;
pub mod topics;
pub mod types;

pub use error::ProtocolError;
pub use geometry::{heading_degrees, round_to};
pub use payload::{PositionPayload, StatusPayload, format_timestamp};
pub use topics::{position_topic, status_topic};
pub use types::*;
