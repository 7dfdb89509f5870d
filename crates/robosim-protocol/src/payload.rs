//! 遥测负载（JSON）
//!
//! 位置负载与状态负载分别发布到 `robot/{id}/position` 和 `robot/{id}/status`。
//! 字段顺序无意义；时间戳为 UTC、精确到秒（`YYYY-MM-DDTHH:MM:SSZ`）。

use crate::error::ProtocolError;
use crate::geometry::round_to;
use crate::types::{OperationalStatus, Position, RobotId, RobotStatus, Role};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// 时间戳格式（秒精度，UTC）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 把 UTC 时间格式化为负载时间戳
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use robosim_protocol::format_timestamp;
///
/// let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 5).unwrap();
/// assert_eq!(format_timestamp(&t), "2024-05-01T08:30:05Z");
/// ```
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// 位置遥测负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPayload {
    pub robot_id: RobotId,
    pub timestamp: String,
    #[serde(serialize_with = "serialize_planar")]
    pub position: Position,
    pub heading: f64,
}

/// 平面位置的 `z` 写成整数 `0`（`{"x": .., "y": .., "z": 0}`）
fn serialize_planar<S: Serializer>(position: &Position, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Position", 3)?;
    state.serialize_field("x", &position.x)?;
    state.serialize_field("y", &position.y)?;
    if position.z == 0.0 {
        state.serialize_field("z", &0u8)?;
    } else {
        state.serialize_field("z", &position.z)?;
    }
    state.end()
}

impl PositionPayload {
    /// 构建位置负载
    ///
    /// 坐标在此处舍入到 2 位小数，`z` 固定为 0；`heading` 由调用方预先计算并舍入。
    pub fn new(robot_id: RobotId, time: &DateTime<Utc>, position: Position, heading: f64) -> Self {
        Self {
            robot_id,
            timestamp: format_timestamp(time),
            position: Position::planar(round_to(position.x, 2), round_to(position.y, 2)),
            heading,
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 状态遥测负载
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub robot_id: RobotId,
    pub timestamp: String,
    pub battery_level: u8,
    pub role: Role,
    pub operational_status: OperationalStatus,
}

impl StatusPayload {
    pub fn new(robot_id: RobotId, time: &DateTime<Utc>, status: &RobotStatus) -> Self {
        Self {
            robot_id,
            timestamp: format_timestamp(time),
            battery_level: status.battery_level,
            role: status.role,
            operational_status: status.operational_status,
        }
    }

    /// 还原负载中携带的状态字段
    pub fn status(&self) -> Result<RobotStatus, ProtocolError> {
        RobotStatus::new(
            u32::from(self.battery_level),
            self.role,
            self.operational_status,
        )
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_position_payload_json_shape() {
        let id = RobotId::new("ROBOT-001").unwrap();
        let payload = PositionPayload::new(
            id,
            &fixed_time(),
            Position::planar(0.447_213_6, 0.223_606_8),
            26.57,
        );
        let value: Value = serde_json::from_slice(&payload.to_json_bytes().unwrap()).unwrap();

        assert_eq!(value["robot_id"], "ROBOT-001");
        assert_eq!(value["timestamp"], "2025-03-14T09:26:53Z");
        assert_eq!(value["position"]["x"], 0.45);
        assert_eq!(value["position"]["y"], 0.22);
        assert_eq!(value["position"]["z"].as_u64(), Some(0));
        assert_eq!(value["heading"], 26.57);
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_position_payload_forces_planar() {
        let id = RobotId::new("R1").unwrap();
        let payload = PositionPayload::new(
            id,
            &fixed_time(),
            Position {
                x: 1.0,
                y: 2.0,
                z: 5.0,
            },
            0.0,
        );
        assert_eq!(payload.position.z, 0.0);
    }

    #[test]
    fn test_position_payload_z_is_integer_zero() {
        let id = RobotId::new("R1").unwrap();
        let payload = PositionPayload::new(id, &fixed_time(), Position::planar(1.5, 2.0), 53.13);
        let json = String::from_utf8(payload.to_json_bytes().unwrap()).unwrap();
        assert!(json.contains(r#""position":{"x":1.5,"y":2.0,"z":0}"#), "{}", json);

        let decoded = PositionPayload::from_json_slice(json.as_bytes()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_position_payload_huge_coordinates_stay_numeric() {
        let id = RobotId::new("R1").unwrap();
        let payload = PositionPayload::new(id, &fixed_time(), Position::planar(1e307, -1e307), 0.0);
        let value: Value = serde_json::from_slice(&payload.to_json_bytes().unwrap()).unwrap();
        assert_eq!(value["position"]["x"].as_f64(), Some(1e307));
        assert_eq!(value["position"]["y"].as_f64(), Some(-1e307));
    }

    #[test]
    fn test_status_payload_json_shape() {
        let id = RobotId::new("ROBOT-002").unwrap();
        let status = RobotStatus::new(50, Role::Watering, OperationalStatus::Working).unwrap();
        let payload = StatusPayload::new(id, &fixed_time(), &status);
        let value: Value = serde_json::from_slice(&payload.to_json_bytes().unwrap()).unwrap();

        assert_eq!(value["robot_id"], "ROBOT-002");
        assert_eq!(value["timestamp"], "2025-03-14T09:26:53Z");
        assert_eq!(value["battery_level"], 50);
        assert_eq!(value["role"], "WATERING");
        assert_eq!(value["operational_status"], "WORKING");
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_status_payload_decode_external() {
        // 其他发布端写出的负载（字段顺序不同、带空格）
        let raw = br#"{"operational_status": "CHARGING", "role": "EMPTY",
                       "battery_level": 12, "timestamp": "2025-01-01T00:00:00Z",
                       "robot_id": "ROBOT-003"}"#;
        let payload = StatusPayload::from_json_slice(raw).unwrap();
        assert_eq!(payload.robot_id.as_str(), "ROBOT-003");
        let status = payload.status().unwrap();
        assert_eq!(status.battery_level, 12);
        assert_eq!(status.operational_status, OperationalStatus::Charging);
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        assert!(StatusPayload::from_json_slice(b"{}").is_err());
        assert!(
            PositionPayload::from_json_slice(
                br#"{"robot_id":"a/b","timestamp":"","position":{"x":0,"y":0,"z":0},"heading":0}"#
            )
            .is_err()
        );
    }
}
