//! # 模拟配置
//!
//! 代理地址、机器人集合、运动与状态发布的默认参数。
//!
//! ```toml
//! robots = ["ROBOT-001", "ROBOT-002", "ROBOT-003"]
//!
//! [broker]
//! host = "localhost"
//! port = 1883
//!
//! [motion]
//! start = { x = 0.0, y = 0.0 }
//! end = { x = 100.0, y = 50.0 }
//! speed = 1.0
//! interval_secs = 0.5
//!
//! [status]
//! battery_level = 80
//! role = "EMPTY"
//! operational_status = "IDLE"
//! interval_secs = 2.0
//! ```
//!
//! 所有字段都有默认值，配置文件只需写出要覆盖的部分。

use robosim_protocol::{
    OperationalStatus, Position, ProtocolError, RobotId, RobotStatus, Role, validate_battery,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 默认配置文件名
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// 模拟配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// 机器人集合（配置顺序）
    pub robots: Vec<RobotId>,
    pub broker: BrokerConfig,
    pub motion: MotionDefaults,
    pub status: StatusDefaults,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            robots: ["ROBOT-001", "ROBOT-002", "ROBOT-003"]
                .into_iter()
                .filter_map(|id| RobotId::new(id).ok())
                .collect(),
            broker: BrokerConfig::default(),
            motion: MotionDefaults::default(),
            status: StatusDefaults::default(),
        }
    }
}

impl SimConfig {
    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 文件存在时加载，否则返回默认配置
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件（必要时创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 校验配置
    ///
    /// - 至少一个机器人，且不重复
    /// - 端口非 0
    /// - 速度、周期为有限正数，坐标有限
    /// - 电量在 0..=100
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.robots.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one robot is required".to_string(),
            ));
        }
        for (i, id) in self.robots.iter().enumerate() {
            if self.robots[..i].contains(id) {
                return Err(ConfigError::Invalid(format!("duplicate robot id: {}", id)));
            }
        }
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker host is empty".to_string()));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::Invalid("broker port must be > 0".to_string()));
        }
        if !positive(self.motion.speed) {
            return Err(ConfigError::Invalid(format!(
                "motion speed must be > 0, got {}",
                self.motion.speed
            )));
        }
        positive_secs("motion.interval_secs", self.motion.interval_secs)?;
        positive_secs("status.interval_secs", self.status.interval_secs)?;
        self.motion.start.to_position()?;
        self.motion.end.to_position()?;
        validate_battery(self.status.battery_level)?;
        Ok(())
    }

    pub fn motion_interval(&self) -> Result<Duration, ConfigError> {
        positive_secs("motion.interval_secs", self.motion.interval_secs)
    }

    pub fn status_interval(&self) -> Result<Duration, ConfigError> {
        positive_secs("status.interval_secs", self.status.interval_secs)
    }

    /// 配置的初始状态
    pub fn initial_status(&self) -> Result<RobotStatus, ConfigError> {
        Ok(RobotStatus::new(
            self.status.battery_level,
            self.status.role,
            self.status.operational_status,
        )?)
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn positive_secs(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !positive(secs) {
        return Err(ConfigError::Invalid(format!("{} must be > 0, got {}", name, secs)));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Invalid(format!("{} is out of range: {}", name, e)))
}

/// 消息代理配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "robosim".to_string(),
            keep_alive_secs: 60,
        }
    }
}

impl BrokerConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 平面坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointConfig {
    pub x: f64,
    pub y: f64,
}

impl PointConfig {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_position(self) -> Result<Position, ConfigError> {
        Ok(Position::new(self.x, self.y, 0.0)?)
    }
}

/// 运动默认参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDefaults {
    pub start: PointConfig,
    pub end: PointConfig,
    /// 米/秒
    pub speed: f64,
    pub interval_secs: f64,
}

impl Default for MotionDefaults {
    fn default() -> Self {
        Self {
            start: PointConfig::new(0.0, 0.0),
            end: PointConfig::new(100.0, 50.0),
            speed: 1.0,
            interval_secs: 0.5,
        }
    }
}

/// 状态发布默认参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusDefaults {
    pub battery_level: u32,
    pub role: Role,
    pub operational_status: OperationalStatus,
    pub interval_secs: f64,
}

impl Default for StatusDefaults {
    fn default() -> Self {
        Self {
            battery_level: 80,
            role: Role::Empty,
            operational_status: OperationalStatus::Idle,
            interval_secs: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.robots.len(), 3);
        assert_eq!(config.robots[0].as_str(), "ROBOT-001");
        assert_eq!(config.broker.address(), "localhost:1883");
        assert_eq!(config.motion.end, PointConfig::new(100.0, 50.0));
        assert_eq!(config.motion_interval().unwrap(), Duration::from_millis(500));
        assert_eq!(config.status_interval().unwrap(), Duration::from_secs(2));
        assert_eq!(config.initial_status().unwrap(), RobotStatus::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
robots = ["R1"]

[motion]
speed = 2.5

[status]
role = "WATERING"
"#,
        )
        .unwrap();
        assert_eq!(config.robots.len(), 1);
        assert_eq!(config.motion.speed, 2.5);
        assert_eq!(config.motion.interval_secs, 0.5);
        assert_eq!(config.status.role, Role::Watering);
        assert_eq!(config.status.battery_level, 80);
        assert_eq!(config.broker.port, 1883);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            "robots = []",
            "robots = [\"A\", \"A\"]",
            "[broker]\nport = 0",
            "[motion]\nspeed = 0.0",
            "[motion]\ninterval_secs = -1.0",
            "[status]\ninterval_secs = 0.0",
            "[status]\nbattery_level = 101",
        ];
        for case in cases {
            assert!(SimConfig::from_toml_str(case).is_err(), "accepted: {case}");
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            SimConfig::from_toml_str("robots = [\"bad/id\"]"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SimConfig::from_toml_str("[status]\nrole = \"FLYING\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = SimConfig::default();
        config.broker.host = "broker.local".to_string();
        config.motion.end = PointConfig::new(-20.0, 7.5);
        config.status.operational_status = OperationalStatus::Charging;
        config.save(&path).unwrap();

        let loaded = SimConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = SimConfig::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, SimConfig::default());
    }
}
