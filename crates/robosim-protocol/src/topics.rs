//! 发布主题命名

use crate::types::RobotId;

/// 位置主题：`robot/{id}/position`
pub fn position_topic(robot: &RobotId) -> String {
    format!("robot/{robot}/position")
}

/// 状态主题：`robot/{id}/status`
pub fn status_topic(robot: &RobotId) -> String {
    format!("robot/{robot}/status")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let id = RobotId::new("ROBOT-003").unwrap();
        assert_eq!(position_topic(&id), "robot/ROBOT-003/position");
        assert_eq!(status_topic(&id), "robot/ROBOT-003/status");
    }
}
