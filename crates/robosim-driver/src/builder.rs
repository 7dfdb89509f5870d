//! Builder 模式实现
//!
//! 提供链式构造 [`Simulator`] 实例的便捷方式。

use crate::clock::{Clock, SystemClock};
use crate::error::SimError;
use crate::observer::RunObserver;
use crate::registry::RobotRegistry;
use crate::run::RunContext;
use crate::simulator::Simulator;
use robosim_protocol::{Position, RobotId, RobotRecord, RobotStatus};
use robosim_sink::TelemetrySink;
use std::sync::Arc;
use std::time::Duration;

/// 默认的线程退出等待时间
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Simulator Builder（链式构造）
///
/// # Example
///
/// ```
/// use robosim_driver::{RobotId, RobotStatus, Role, OperationalStatus, SimulatorBuilder};
/// use robosim_sink::LogSink;
///
/// let robots = ["ROBOT-001", "ROBOT-002", "ROBOT-003"].map(|s| RobotId::new(s).unwrap());
/// let sim = SimulatorBuilder::new()
///     .robots(robots)
///     .default_status(RobotStatus::new(90, Role::Cleaning, OperationalStatus::Idle).unwrap())
///     .sink(LogSink::new())
///     .build()
///     .unwrap();
/// assert_eq!(sim.robots().len(), 3);
/// assert!(sim.sink_ready());
/// ```
pub struct SimulatorBuilder {
    robots: Vec<RobotId>,
    /// 所有机器人的初始状态（默认 `{80, EMPTY, IDLE}`）
    default_status: RobotStatus,
    initial_status: Vec<(RobotId, RobotStatus)>,
    initial_position: Vec<(RobotId, Position)>,
    sink: Option<Arc<dyn TelemetrySink>>,
    clock: Option<Arc<dyn Clock>>,
    observers: Vec<Arc<dyn RunObserver>>,
    join_timeout: Duration,
}

impl SimulatorBuilder {
    pub fn new() -> Self {
        Self {
            robots: Vec::new(),
            default_status: RobotStatus::default(),
            initial_status: Vec::new(),
            initial_position: Vec::new(),
            sink: None,
            clock: None,
            observers: Vec::new(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// 添加一个机器人（重复添加只保留一次）
    pub fn robot(mut self, id: RobotId) -> Self {
        self.robots.push(id);
        self
    }

    pub fn robots(mut self, ids: impl IntoIterator<Item = RobotId>) -> Self {
        self.robots.extend(ids);
        self
    }

    pub fn default_status(mut self, status: RobotStatus) -> Self {
        self.default_status = status;
        self
    }

    /// 单个机器人的初始状态（覆盖 `default_status`）
    pub fn initial_status(mut self, id: RobotId, status: RobotStatus) -> Self {
        self.initial_status.push((id, status));
        self
    }

    /// 单个机器人的初始位置（默认原点）
    pub fn initial_position(mut self, id: RobotId, position: Position) -> Self {
        self.initial_position.push((id, position));
        self
    }

    /// 设置传输（可选，之后也可以用 `Simulator::set_sink` 设置）
    pub fn sink(self, sink: impl TelemetrySink + 'static) -> Self {
        self.shared_sink(Arc::new(sink))
    }

    /// 设置共享的传输（调用方保留一份引用，例如读取统计）
    pub fn shared_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 设置时钟（可选，默认 [`SystemClock`]）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// shutdown 时等待每个运行线程的最长时间（默认 2 秒）
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// 构建 Simulator
    ///
    /// # Errors
    /// - `InvalidParameter`: 没有配置机器人，或初始位置非有限
    /// - `UnknownRobot`: 初始值指向未配置的机器人
    /// - `Protocol`: 初始电量超出范围
    pub fn build(self) -> Result<Simulator, SimError> {
        if self.robots.is_empty() {
            return Err(SimError::InvalidParameter(
                "at least one robot is required".to_string(),
            ));
        }
        self.default_status.validate()?;

        let record = RobotRecord {
            position: Position::ORIGIN,
            status: self.default_status,
        };
        let registry = RobotRegistry::with_records(self.robots.into_iter().map(|id| (id, record)));
        for (id, status) in &self.initial_status {
            registry.set_status(id, *status)?;
        }
        for (id, position) in &self.initial_position {
            registry.set_position(id, *position)?;
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let mut ctx = RunContext::new(Arc::new(registry)).with_clock(clock);
        if let Some(sink) = self.sink {
            ctx = ctx.with_sink(sink);
        }
        for observer in self.observers {
            ctx = ctx.with_observer(observer);
        }

        Ok(Simulator::new(ctx, self.join_timeout))
    }
}

impl Default for SimulatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robosim_protocol::{OperationalStatus, Role};
    use robosim_sink::ChannelSink;

    fn id(s: &str) -> RobotId {
        RobotId::new(s).unwrap()
    }

    #[test]
    fn test_build_requires_robots() {
        assert!(matches!(
            SimulatorBuilder::new().build(),
            Err(SimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_build_with_initial_values() {
        let status = RobotStatus::new(33, Role::Watering, OperationalStatus::Working).unwrap();
        let sim = SimulatorBuilder::new()
            .robots([id("A"), id("B")])
            .initial_status(id("B"), status)
            .initial_position(id("A"), Position::planar(1.0, 2.0))
            .build()
            .unwrap();

        assert_eq!(sim.position(&id("A")).unwrap(), Position::planar(1.0, 2.0));
        assert_eq!(sim.status(&id("A")).unwrap(), RobotStatus::default());
        assert_eq!(sim.status(&id("B")).unwrap(), status);
        assert!(!sim.sink_ready());
    }

    #[test]
    fn test_build_rejects_unknown_initial_robot() {
        let err = SimulatorBuilder::new()
            .robot(id("A"))
            .initial_position(id("Z"), Position::ORIGIN)
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownRobot(_)));
    }

    #[test]
    fn test_build_rejects_invalid_default_status() {
        let err = SimulatorBuilder::new()
            .robot(id("A"))
            .default_status(RobotStatus {
                battery_level: 150,
                ..RobotStatus::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::Protocol(_)));
    }

    #[test]
    fn test_build_with_sink() {
        let (sink, _rx) = ChannelSink::unbounded();
        let sim = SimulatorBuilder::new()
            .robot(id("A"))
            .sink(sink)
            .join_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        assert!(sim.sink_ready());
    }
}
