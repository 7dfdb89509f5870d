//! 运动模拟
//!
//! 机器人以恒定速度从起点直线移动到终点，按固定周期发布位置。
//!
//! # 结构
//!
//! - [`MotionRun`]: 一次运行的已校验参数
//! - [`MotionPlan`]: 纯几何部分（总距离、航向、方向、步长）以及
//!   按发布顺序产生采样的迭代器 [`MotionPlan::steps`]
//! - [`run_motion`]: 把计划与时钟、传输、观察者、注册表结合起来执行
//!
//! # 采样序列
//!
//! 设总距离为 `D`、步长为 `s = speed * interval`：
//!
//! 1. 在 `traveled = 0, s, 2s, ...`（均 `< D`）处各产生一个采样
//! 2. 下一步会到达或越过终点时，位置直接对齐到终点，不做越界插值
//! 3. 最后产生一个位于终点、进度 100% 的采样
//!
//! 起点与终点重合时不产生任何采样（退化运行）。

use crate::cancel::CancelToken;
use crate::clock::WaitOutcome;
use crate::error::SimError;
use crate::registry::RobotRegistry;
use crate::run::{RunContext, RunReport};
use robosim_protocol::{
    Position, PositionPayload, RobotId, heading_degrees, position_topic, round_to,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

/// 默认速度（米/秒）
pub const DEFAULT_SPEED: f64 = 1.0;

/// 默认位置采样周期
pub const DEFAULT_POSITION_INTERVAL: Duration = Duration::from_millis(500);

/// 一次运动运行的参数（已校验）
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRun {
    robot: RobotId,
    start: Position,
    end: Position,
    speed: f64,
    interval: Duration,
}

impl MotionRun {
    /// 创建并校验运动参数
    ///
    /// # Errors
    ///
    /// `InvalidParameter`：速度或周期非正/非有限，坐标非有限，
    /// 或两点距离超出浮点范围。
    pub fn new(
        robot: RobotId,
        start: Position,
        end: Position,
        speed: f64,
        interval: Duration,
    ) -> Result<Self, SimError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "speed must be a finite number > 0, got {}",
                speed
            )));
        }
        if interval.is_zero() {
            return Err(SimError::InvalidParameter(
                "sample interval must be > 0".to_string(),
            ));
        }
        if !start.is_finite() || !end.is_finite() {
            return Err(SimError::InvalidParameter(
                "start and end coordinates must be finite".to_string(),
            ));
        }
        if !start.distance_to(&end).is_finite() {
            return Err(SimError::InvalidParameter(
                "distance between start and end is out of range".to_string(),
            ));
        }
        Ok(Self {
            robot,
            start,
            end,
            speed,
            interval,
        })
    }

    pub fn robot(&self) -> &RobotId {
        &self.robot
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 每个周期前进的距离
    pub fn step_length(&self) -> f64 {
        self.speed * self.interval.as_secs_f64()
    }

    pub fn plan(&self) -> MotionPlan {
        MotionPlan::new(self.start, self.end, self.step_length())
    }
}

/// 启动运动运行的请求
///
/// 未指定起点时使用注册表中该机器人最新的位置
/// （上一次运行结束或被停止时的位置）。
///
/// # Example
///
/// ```
/// use robosim_driver::{MotionRequest, Position, RobotId};
/// use std::time::Duration;
///
/// let request = MotionRequest::new(RobotId::new("ROBOT-001").unwrap(), Position::planar(100.0, 50.0))
///     .start(Position::ORIGIN)
///     .speed(2.0)
///     .interval(Duration::from_millis(250));
/// assert_eq!(request.speed_value(), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    robot: RobotId,
    start: Option<Position>,
    end: Position,
    speed: f64,
    interval: Duration,
}

impl MotionRequest {
    pub fn new(robot: RobotId, end: Position) -> Self {
        Self {
            robot,
            start: None,
            end,
            speed: DEFAULT_SPEED,
            interval: DEFAULT_POSITION_INTERVAL,
        }
    }

    pub fn start(mut self, start: Position) -> Self {
        self.start = Some(start);
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn robot(&self) -> &RobotId {
        &self.robot
    }

    pub fn speed_value(&self) -> f64 {
        self.speed
    }

    /// 对照注册表解析出完整的运行参数
    ///
    /// 先检查机器人是否存在，再校验参数。
    pub fn resolve(&self, registry: &RobotRegistry) -> Result<MotionRun, SimError> {
        if !registry.contains(&self.robot) {
            return Err(SimError::UnknownRobot(self.robot.clone()));
        }
        let start = match self.start {
            Some(start) => start,
            None => registry.get_position(&self.robot)?,
        };
        MotionRun::new(self.robot.clone(), start, self.end, self.speed, self.interval)
    }
}

/// 直线运动的几何计划
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    start: Position,
    end: Position,
    total: f64,
    heading: f64,
    dir_x: f64,
    dir_y: f64,
    step: f64,
}

impl MotionPlan {
    /// `step` 为每个周期前进的距离
    pub fn new(start: Position, end: Position, step: f64) -> Self {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let total = dx.hypot(dy);
        let (dir_x, dir_y) = if total > 0.0 {
            (dx / total, dy / total)
        } else {
            (0.0, 0.0)
        };
        Self {
            start,
            end,
            total,
            heading: heading_degrees(dx, dy),
            dir_x,
            dir_y,
            step,
        }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn total_distance(&self) -> f64 {
        self.total
    }

    /// 航向（度，`[0, 360)`，2 位小数），整个运行保持不变
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn step_length(&self) -> f64 {
        self.step
    }

    /// 起点与终点重合
    pub fn is_degenerate(&self) -> bool {
        self.total == 0.0
    }

    /// 按发布顺序产生采样
    pub fn steps(&self) -> MotionSteps {
        MotionSteps {
            plan: *self,
            current: self.start,
            traveled: 0.0,
            started: false,
            finished: self.is_degenerate(),
        }
    }
}

/// 单个位置采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    /// 全精度位置（发布时才舍入）
    pub position: Position,
    pub traveled: f64,
    /// 进度百分比（1 位小数）
    pub progress: f64,
    /// 位于终点的最后一个采样
    pub is_final: bool,
}

/// [`MotionPlan::steps`] 返回的迭代器
///
/// 前进在下一次 `next()` 开始时才应用，因此调用方在两次 `next()`
/// 之间取消时，最后计算出的位置就是最后产生的采样位置。
#[derive(Debug, Clone)]
pub struct MotionSteps {
    plan: MotionPlan,
    current: Position,
    traveled: f64,
    started: bool,
    finished: bool,
}

impl MotionSteps {
    fn advance(&mut self) {
        let plan = &self.plan;
        if self.traveled + plan.step >= plan.total {
            self.current = plan.end;
            self.traveled = plan.total;
        } else {
            self.current = Position::planar(
                self.current.x + plan.dir_x * plan.step,
                self.current.y + plan.dir_y * plan.step,
            );
            self.traveled += plan.step;
        }
    }
}

impl Iterator for MotionSteps {
    type Item = MotionStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.started {
            self.advance();
        }
        self.started = true;

        if self.traveled < self.plan.total {
            return Some(MotionStep {
                position: self.current,
                traveled: self.traveled,
                progress: round_to(self.traveled / self.plan.total * 100.0, 1),
                is_final: false,
            });
        }

        self.finished = true;
        Some(MotionStep {
            position: self.plan.end,
            traveled: self.plan.total,
            progress: 100.0,
            is_final: true,
        })
    }
}

/// 运动运行的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionOutcome {
    /// 到达终点
    Completed { position: Position, samples: u64 },
    /// 被取消，`position` 为最后产生的位置
    Cancelled { position: Position, samples: u64 },
    /// 起点与终点重合，没有采样
    Degenerate { position: Position },
}

impl MotionOutcome {
    /// 写回注册表的位置
    pub fn position(&self) -> Position {
        match *self {
            MotionOutcome::Completed { position, .. }
            | MotionOutcome::Cancelled { position, .. }
            | MotionOutcome::Degenerate { position } => position,
        }
    }

    pub fn samples(&self) -> u64 {
        match *self {
            MotionOutcome::Completed { samples, .. } | MotionOutcome::Cancelled { samples, .. } => {
                samples
            },
            MotionOutcome::Degenerate { .. } => 0,
        }
    }
}

/// 在当前线程上执行一次运动运行
///
/// 每个采样：检查取消 → 发布位置负载 → 通知观察者 → 等待一个周期。
/// 发布失败只记录日志，运行继续；没有配置传输时照常推进并通知观察者。
/// 结束时把结果位置写回注册表（完成：终点；取消：最后位置；退化：起点），
/// 然后通知 `on_run_finished`。
pub fn run_motion(ctx: &RunContext, run: &MotionRun, cancel: &CancelToken) -> MotionOutcome {
    let robot = run.robot();
    let plan = run.plan();
    ctx.metrics.runs_started.fetch_add(1, Ordering::Relaxed);
    info!(
        "Motion run started for {}: ({}) -> ({}), distance {:.2}, heading {:.2}",
        robot,
        plan.start(),
        plan.end(),
        plan.total_distance(),
        plan.heading()
    );

    let outcome = if plan.is_degenerate() {
        MotionOutcome::Degenerate {
            position: run.start(),
        }
    } else {
        drive(ctx, run, &plan, cancel)
    };

    if let Err(e) = ctx.registry.set_position(robot, outcome.position()) {
        warn!("Failed to persist position for {}: {}", robot, e);
    }

    let counter = match outcome {
        MotionOutcome::Completed { .. } => &ctx.metrics.runs_completed,
        MotionOutcome::Cancelled { .. } => &ctx.metrics.runs_cancelled,
        MotionOutcome::Degenerate { .. } => &ctx.metrics.runs_degenerate,
    };
    counter.fetch_add(1, Ordering::Relaxed);

    match outcome {
        MotionOutcome::Completed { samples, .. } => {
            info!("Motion run for {} reached the endpoint after {} samples", robot, samples)
        },
        MotionOutcome::Cancelled { position, samples } => {
            info!("Motion run for {} stopped at ({}) after {} samples", robot, position, samples)
        },
        MotionOutcome::Degenerate { .. } => {
            info!("Motion run for {} has identical start and end, nothing to do", robot)
        },
    }

    let observers = ctx.observers.read().clone();
    observers.notify_finished(robot, &RunReport::Motion(outcome));
    outcome
}

fn drive(
    ctx: &RunContext,
    run: &MotionRun,
    plan: &MotionPlan,
    cancel: &CancelToken,
) -> MotionOutcome {
    let robot = run.robot();
    let topic = position_topic(robot);
    let mut steps = plan.steps();
    let mut samples = 0u64;
    let mut last = plan.start();

    loop {
        if cancel.is_cancelled() {
            return MotionOutcome::Cancelled {
                position: last,
                samples,
            };
        }
        let Some(step) = steps.next() else {
            return MotionOutcome::Completed {
                position: plan.end(),
                samples,
            };
        };

        let payload = PositionPayload::new(
            robot.clone(),
            &ctx.clock.now_utc(),
            step.position,
            plan.heading(),
        );
        match payload.to_json_bytes() {
            Ok(bytes) => {
                ctx.publish(&topic, &bytes);
            },
            Err(e) => warn!("Failed to encode position payload for {}: {}", robot, e),
        }
        ctx.metrics.position_samples.fetch_add(1, Ordering::Relaxed);
        samples += 1;
        last = step.position;

        let observers = ctx.observers.read().clone();
        observers.notify_position(robot, step.position.x, step.position.y, step.progress);

        if step.is_final {
            return MotionOutcome::Completed {
                position: plan.end(),
                samples,
            };
        }
        if ctx.clock.sleep(run.interval(), cancel) == WaitOutcome::Cancelled {
            return MotionOutcome::Cancelled {
                position: last,
                samples,
            };
        }
    }
}
