//! 状态命令
//!
//! 周期发布一个机器人的状态（电量、角色、运行状态），发布前可以先修改状态

use crate::utils::parse_secs;
use anyhow::Result;
use clap::Args;
use robosim_driver::{OperationalStatus, RobotStatus, Role, Simulator};
use robosim_protocol::RobotId;
use robosim_tools::SimConfig;
use std::time::Duration;

/// 状态命令参数
#[derive(Args, Debug, Clone)]
pub struct StatusCommand {
    /// 机器人标识（默认：配置中的第一个）
    #[arg(short, long)]
    pub robot: Option<String>,

    /// 电量（0-100）
    #[arg(short, long)]
    pub battery: Option<u32>,

    /// 角色，例如 HARVESTING、CLEANING
    #[arg(long)]
    pub role: Option<Role>,

    /// 运行状态，例如 WORKING、CHARGING
    #[arg(long)]
    pub op_status: Option<OperationalStatus>,

    /// 发布周期（秒）
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// 发布多少条后停止（默认一直发布，Ctrl+C 停止）
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

impl StatusCommand {
    pub fn interval(&self, config: &SimConfig) -> Result<Duration> {
        match self.interval {
            Some(secs) => parse_secs(secs),
            None => Ok(config.status_interval()?),
        }
    }

    /// 发布前应用状态修改，返回修改后的状态
    pub fn apply_edits(&self, simulator: &Simulator, robot: &RobotId) -> Result<RobotStatus> {
        if let Some(level) = self.battery {
            simulator.set_battery(robot, level)?;
        }
        if let Some(role) = self.role {
            simulator.set_role(robot, role)?;
        }
        if let Some(status) = self.op_status {
            simulator.set_operational_status(robot, status)?;
        }
        Ok(simulator.status(robot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> StatusCommand {
        StatusCommand {
            robot: None,
            battery: None,
            role: None,
            op_status: None,
            interval: None,
            count: None,
        }
    }

    #[test]
    fn test_interval_default() {
        let config = SimConfig::default();
        assert_eq!(command().interval(&config).unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_apply_edits() {
        let robot = RobotId::new("ROBOT-001").unwrap();
        let simulator = Simulator::builder().robot(robot.clone()).build().unwrap();

        let cmd = StatusCommand {
            battery: Some(50),
            role: Some(Role::Harvesting),
            op_status: Some(OperationalStatus::Working),
            ..command()
        };
        let status = cmd.apply_edits(&simulator, &robot).unwrap();
        assert_eq!(status.battery_level, 50);
        assert_eq!(status.role, Role::Harvesting);
        assert_eq!(status.operational_status, OperationalStatus::Working);
    }

    #[test]
    fn test_apply_edits_rejects_battery_over_100() {
        let robot = RobotId::new("ROBOT-001").unwrap();
        let simulator = Simulator::builder().robot(robot.clone()).build().unwrap();

        let cmd = StatusCommand {
            battery: Some(101),
            ..command()
        };
        assert!(cmd.apply_edits(&simulator, &robot).is_err());
        assert_eq!(simulator.status(&robot).unwrap(), RobotStatus::default());
    }
}
