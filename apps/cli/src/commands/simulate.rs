//! 模拟命令
//!
//! 多个机器人同时运动，运动期间各自周期发布状态；运动结束时停止该机器人的状态发布

use crate::utils::{parse_point, parse_secs};
use anyhow::Result;
use clap::Args;
use robosim_driver::MotionRequest;
use robosim_protocol::RobotId;
use robosim_tools::SimConfig;
use std::time::Duration;

/// 模拟命令参数
#[derive(Args, Debug, Clone)]
pub struct SimulateCommand {
    /// 参与模拟的机器人（可重复，默认：配置中的全部机器人）
    #[arg(short, long)]
    pub robot: Vec<String>,

    /// 终点 `x,y`（默认：配置中的运动终点）
    #[arg(short, long, allow_hyphen_values = true)]
    pub end: Option<String>,

    /// 速度（米/秒）
    #[arg(long)]
    pub speed: Option<f64>,

    /// 位置发布周期（秒）
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// 状态发布周期（秒）
    #[arg(long)]
    pub status_interval: Option<f64>,

    /// 不发布状态，只运动
    #[arg(long)]
    pub no_status: bool,

    /// 每隔多少个样本打印一次（0 表示只打印结果）
    #[arg(long, default_value_t = 50)]
    pub every: u64,
}

impl SimulateCommand {
    /// 参与模拟的机器人
    pub fn robots(&self, config: &SimConfig) -> Result<Vec<RobotId>> {
        if self.robot.is_empty() {
            return Ok(config.robots.clone());
        }
        let mut robots = Vec::with_capacity(self.robot.len());
        for id in &self.robot {
            let id = RobotId::new(id.as_str())?;
            if !robots.contains(&id) {
                robots.push(id);
            }
        }
        Ok(robots)
    }

    /// 为每个机器人组装运动请求（起点取各自当前位置）
    pub fn motion_requests(&self, config: &SimConfig) -> Result<Vec<MotionRequest>> {
        let end = match &self.end {
            Some(end) => parse_point(end)?,
            None => config.motion.end.to_position()?,
        };
        let interval = match self.interval {
            Some(secs) => parse_secs(secs)?,
            None => config.motion_interval()?,
        };
        let speed = self.speed.unwrap_or(config.motion.speed);

        Ok(self
            .robots(config)?
            .into_iter()
            .map(|robot| MotionRequest::new(robot, end).speed(speed).interval(interval))
            .collect())
    }

    pub fn status_interval(&self, config: &SimConfig) -> Result<Duration> {
        match self.status_interval {
            Some(secs) => parse_secs(secs),
            None => Ok(config.status_interval()?),
        }
    }
}
