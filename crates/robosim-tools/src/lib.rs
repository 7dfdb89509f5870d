//! # Robosim Tools - 共享配置
//!
//! **依赖原则**: 只依赖 `robosim-protocol`，不依赖引擎和传输层。
//!
//! ## 包含模块
//!
//! - `config` - 模拟配置（TOML 文件）

pub mod config;

pub use config::{
    BrokerConfig, CONFIG_FILE_NAME, ConfigError, MotionDefaults, PointConfig, SimConfig,
    StatusDefaults,
};
