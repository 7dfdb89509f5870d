//! 模拟引擎模块
//!
//! 本模块提供移动机器人遥测模拟的核心功能，包括：
//! - 机器人注册表（每个机器人最新的位置/状态，进程内共享）
//! - 运动模拟（两点间匀速直线插值，周期发布位置）
//! - 状态发布（周期读取可编辑的状态字段并发布）
//! - 可取消的运行线程、时钟抽象、观察者钩子、原子指标
//!
//! # 使用场景
//!
//! 大多数调用方应使用 [`Simulator`]：它负责参数校验、每个机器人
//! 同类运行互斥、线程生命周期管理。需要逐步驱动或做确定性测试时，
//! 可以直接调用 [`motion::run_motion`] / [`status::run_status`]。

pub mod builder;
pub mod cancel;
pub mod clock;
mod error;
pub mod metrics;
pub mod motion;
pub mod observer;
pub mod registry;
pub mod run;
mod simulator;
pub mod status;

pub use builder::SimulatorBuilder;
pub use cancel::CancelToken;
pub use clock::{Clock, SimulatedClock, SystemClock, WaitOutcome};
pub use error::SimError;
pub use metrics::{MetricsSnapshot, SimMetrics};
pub use motion::{
    DEFAULT_POSITION_INTERVAL, DEFAULT_SPEED, MotionOutcome, MotionPlan, MotionRequest, MotionRun,
    MotionStep, MotionSteps,
};
pub use observer::{ChannelObserver, ObserverSet, RunEvent, RunObserver};
pub use registry::RobotRegistry;
pub use run::{RunContext, RunHandle, RunKind, RunReport, SinkSlot};
pub use simulator::Simulator;
pub use status::{DEFAULT_STATUS_INTERVAL, StatusOutcome, StatusRun};

// 常用的协议/传输类型
pub use robosim_protocol::{OperationalStatus, Position, RobotId, RobotRecord, RobotStatus, Role};
pub use robosim_sink::{SinkError, TelemetrySink};
