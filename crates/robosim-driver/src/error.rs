//! 引擎错误类型定义

use crate::run::RunKind;
use robosim_protocol::{ProtocolError, RobotId};
use robosim_sink::SinkError;
use thiserror::Error;

/// 引擎错误类型
///
/// 参数/状态类错误（`InvalidParameter`、`UnknownRobot`、`RunAlreadyActive`、
/// `SinkNotReady`）都在启动线程之前同步返回，不会留下任何部分状态。
/// 运行中的发布失败不会中止运行，只记录日志和指标。
#[derive(Error, Debug)]
pub enum SimError {
    /// 参数非法（速度/周期非正、坐标非有限值等）
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// 机器人不在配置的集合中
    #[error("Unknown robot: {0}")]
    UnknownRobot(RobotId),

    /// 同一机器人的同类运行已经在进行
    #[error("A {kind} run is already active for robot {robot}")]
    RunAlreadyActive { robot: RobotId, kind: RunKind },

    /// 没有配置传输或传输未就绪
    #[error("Telemetry sink not ready")]
    SinkNotReady,

    /// 传输错误
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// 协议错误（负载编码、状态字段校验）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 运行线程启动失败或 panic
    #[error("Run thread error: {0}")]
    RunThread(String),

    /// 等待运行结束超时
    #[error("Timed out waiting for run to finish")]
    Timeout,
}
