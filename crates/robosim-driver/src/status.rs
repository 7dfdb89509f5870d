//! 状态发布
//!
//! 按固定周期读取机器人当前的状态字段（电量、角色、作业状态）并发布，
//! 直到被停止。每次采样都从注册表实时读取，操作员在运行期间的修改
//! 在下一个采样生效。

use crate::cancel::CancelToken;
use crate::clock::WaitOutcome;
use crate::error::SimError;
use crate::run::{RunContext, RunReport};
use robosim_protocol::{RobotId, RobotStatus, StatusPayload, status_topic};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

/// 默认状态采样周期
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(2);

/// 一次状态发布运行的参数（已校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRun {
    robot: RobotId,
    interval: Duration,
}

impl StatusRun {
    pub fn new(robot: RobotId, interval: Duration) -> Result<Self, SimError> {
        if interval.is_zero() {
            return Err(SimError::InvalidParameter(
                "status interval must be > 0".to_string(),
            ));
        }
        Ok(Self { robot, interval })
    }

    pub fn robot(&self) -> &RobotId {
        &self.robot
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// 状态发布运行的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOutcome {
    /// 本次运行产生的采样数（与发布是否成功无关）
    pub emitted: u64,
    /// 停止时注册表中的状态
    pub last_status: RobotStatus,
}

/// 在当前线程上执行状态发布，直到取消
///
/// 停止时在同一把锁内重新读取并写回当前状态：如果操作员在最后一个采样之后
/// 修改过状态，这次修改会被保留，而不是被最后发布的值覆盖。
pub fn run_status(ctx: &RunContext, run: &StatusRun, cancel: &CancelToken) -> StatusOutcome {
    let robot = run.robot();
    let topic = status_topic(robot);
    ctx.metrics.runs_started.fetch_add(1, Ordering::Relaxed);
    info!(
        "Status run started for {} every {:.1}s",
        robot,
        run.interval().as_secs_f64()
    );

    let mut emitted = 0u64;
    while !cancel.is_cancelled() {
        let status = match ctx.registry.get_status(robot) {
            Ok(status) => status,
            Err(e) => {
                warn!("Status run for {} cannot read its record: {}", robot, e);
                break;
            },
        };

        let payload = StatusPayload::new(robot.clone(), &ctx.clock.now_utc(), &status);
        match payload.to_json_bytes() {
            Ok(bytes) => {
                ctx.publish(&topic, &bytes);
            },
            Err(e) => warn!("Failed to encode status payload for {}: {}", robot, e),
        }
        emitted += 1;
        ctx.metrics.status_samples.fetch_add(1, Ordering::Relaxed);

        let observers = ctx.observers.read().clone();
        observers.notify_status(robot, emitted);

        if ctx.clock.sleep(run.interval(), cancel) == WaitOutcome::Cancelled {
            break;
        }
    }

    let last_status = match ctx.registry.update_status(robot, |_| {}) {
        Ok(status) => status,
        Err(e) => {
            warn!("Failed to persist status for {}: {}", robot, e);
            RobotStatus::default()
        },
    };
    ctx.metrics.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    info!("Status run for {} stopped after {} samples", robot, emitted);

    let outcome = StatusOutcome {
        emitted,
        last_status,
    };
    let observers = ctx.observers.read().clone();
    observers.notify_finished(robot, &RunReport::Status(outcome));
    outcome
}
