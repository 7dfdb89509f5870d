//! 移动命令
//!
//! 让一个机器人从起点匀速直线运动到终点，运动期间周期发布位置

use crate::utils::{parse_point, parse_secs};
use anyhow::Result;
use clap::Args;
use robosim_driver::MotionRequest;
use robosim_protocol::RobotId;
use robosim_tools::SimConfig;

/// 移动命令参数
#[derive(Args, Debug, Clone)]
pub struct MoveCommand {
    /// 机器人标识（默认：配置中的第一个）
    #[arg(short, long)]
    pub robot: Option<String>,

    /// 终点 `x,y`（默认：配置中的运动终点）
    /// 例如：100,50
    #[arg(short, long, allow_hyphen_values = true)]
    pub end: Option<String>,

    /// 起点 `x,y`（默认：机器人当前位置）
    #[arg(short, long, allow_hyphen_values = true)]
    pub start: Option<String>,

    /// 速度（米/秒）
    #[arg(long)]
    pub speed: Option<f64>,

    /// 发布周期（秒）
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// 每隔多少个位置样本打印一次（0 表示只打印结果）
    #[arg(long, default_value_t = 20)]
    pub every: u64,
}

impl MoveCommand {
    /// 按参数和配置默认值组装运动请求
    pub fn to_request(&self, config: &SimConfig, robot: RobotId) -> Result<MotionRequest> {
        let end = match &self.end {
            Some(end) => parse_point(end)?,
            None => config.motion.end.to_position()?,
        };
        let interval = match self.interval {
            Some(secs) => parse_secs(secs)?,
            None => config.motion_interval()?,
        };

        let mut request = MotionRequest::new(robot, end)
            .speed(self.speed.unwrap_or(config.motion.speed))
            .interval(interval);
        if let Some(start) = &self.start {
            request = request.start(parse_point(start)?);
        }
        Ok(request)
    }
}
