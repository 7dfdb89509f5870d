//! 核心数据类型
//!
//! 机器人标识、平面位置、作业状态等在各层之间共享的值类型。

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 机器人标识
///
/// 不透明字符串，但会被拼进发布主题（`robot/{id}/...`），
/// 因此禁止空串以及主题保留字符 `/`、`+`、`#`。
///
/// # Example
///
/// ```
/// use robosim_protocol::RobotId;
///
/// let id = RobotId::new("ROBOT-001").unwrap();
/// assert_eq!(id.as_str(), "ROBOT-001");
/// assert!(RobotId::new("robot/1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RobotId(String);

impl RobotId {
    /// 创建并校验机器人标识
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.trim().is_empty() || id.contains(['/', '+', '#']) || id.contains(char::is_whitespace)
        {
            return Err(ProtocolError::InvalidRobotId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RobotId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RobotId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RobotId> for String {
    fn from(id: RobotId) -> Self {
        id.0
    }
}

/// 三维位置（米）
///
/// 当前只做平面运动，`z` 恒为 0，保留该字段以便将来输出三维遥测。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// 原点 `(0, 0, 0)`
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// 创建平面位置（`z = 0`）
    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// 创建位置并校验坐标为有限实数
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, ProtocolError> {
        let pos = Self { x, y, z };
        if pos.is_finite() {
            Ok(pos)
        } else {
            Err(ProtocolError::NonFiniteCoordinate { x, y, z })
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// 平面欧氏距离
    pub fn distance_to(&self, other: &Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X: {:.2}, Y: {:.2}", self.x, self.y)
    }
}

/// 机器人作业角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Empty,
    Cleaning,
    Watering,
    Monitoring,
    Fertilizing,
    Transplanting,
    Harvesting,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Empty,
        Role::Cleaning,
        Role::Watering,
        Role::Monitoring,
        Role::Fertilizing,
        Role::Transplanting,
        Role::Harvesting,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Empty => "EMPTY",
            Role::Cleaning => "CLEANING",
            Role::Watering => "WATERING",
            Role::Monitoring => "MONITORING",
            Role::Fertilizing => "FERTILIZING",
            Role::Transplanting => "TRANSPLANTING",
            Role::Harvesting => "HARVESTING",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProtocolError::UnknownRole(s.to_string()))
    }
}

/// 机器人作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalStatus {
    #[default]
    Idle,
    Prepare,
    Moving,
    Working,
    Charging,
    Pause,
    Stop,
    Error,
}

impl OperationalStatus {
    pub const ALL: [OperationalStatus; 8] = [
        OperationalStatus::Idle,
        OperationalStatus::Prepare,
        OperationalStatus::Moving,
        OperationalStatus::Working,
        OperationalStatus::Charging,
        OperationalStatus::Pause,
        OperationalStatus::Stop,
        OperationalStatus::Error,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationalStatus::Idle => "IDLE",
            OperationalStatus::Prepare => "PREPARE",
            OperationalStatus::Moving => "MOVING",
            OperationalStatus::Working => "WORKING",
            OperationalStatus::Charging => "CHARGING",
            OperationalStatus::Pause => "PAUSE",
            OperationalStatus::Stop => "STOP",
            OperationalStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationalStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        OperationalStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProtocolError::UnknownOperationalStatus(s.to_string()))
    }
}

/// 电量上限（百分比）
pub const MAX_BATTERY_LEVEL: u8 = 100;

/// 机器人状态（操作员可编辑）
///
/// 默认值 `{80, EMPTY, IDLE}` 与进程启动时的初始记录一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotStatus {
    pub battery_level: u8,
    pub role: Role,
    pub operational_status: OperationalStatus,
}

impl RobotStatus {
    /// 创建状态并校验电量范围
    pub fn new(
        battery_level: u32,
        role: Role,
        operational_status: OperationalStatus,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            battery_level: validate_battery(battery_level)?,
            role,
            operational_status,
        })
    }

    /// 校验一个已有状态（字段是 pub 的，可能被直接构造）
    pub fn validate(&self) -> Result<(), ProtocolError> {
        validate_battery(u32::from(self.battery_level)).map(|_| ())
    }
}

impl Default for RobotStatus {
    fn default() -> Self {
        Self {
            battery_level: 80,
            role: Role::Empty,
            operational_status: OperationalStatus::Idle,
        }
    }
}

/// 校验电量并收窄为 `u8`
pub fn validate_battery(level: u32) -> Result<u8, ProtocolError> {
    if level > u32::from(MAX_BATTERY_LEVEL) {
        return Err(ProtocolError::BatteryOutOfRange(level));
    }
    Ok(level as u8)
}

/// 单个机器人的最新已知记录
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotRecord {
    pub position: Position,
    pub status: RobotStatus,
}
