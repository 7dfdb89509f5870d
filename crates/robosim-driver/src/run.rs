//! 运行的公共部件
//!
//! - [`RunKind`]: 运动 / 状态两类运行
//! - [`RunReport`]: 运行结束时的结果
//! - [`RunHandle`]: 调用方持有的句柄（取消、等待结果）
//! - [`RunContext`]: 运行线程共享的依赖（注册表、传输、时钟、观察者、指标）
//! - [`SinkSlot`]: 可在运行期间替换的传输插槽

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::error::SimError;
use crate::metrics::SimMetrics;
use crate::motion::MotionOutcome;
use crate::observer::{ObserverSet, RunObserver};
use crate::registry::RobotRegistry;
use crate::status::StatusOutcome;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::RwLock;
use robosim_protocol::RobotId;
use robosim_sink::TelemetrySink;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// 运行类型
///
/// 每个机器人同一时刻每种类型最多一个活动运行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunKind {
    Motion,
    Status,
}

impl RunKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunKind::Motion => "motion",
            RunKind::Status => "status",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 运行结果
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Motion(MotionOutcome),
    Status(StatusOutcome),
}

impl RunReport {
    pub fn kind(&self) -> RunKind {
        match self {
            RunReport::Motion(_) => RunKind::Motion,
            RunReport::Status(_) => RunKind::Status,
        }
    }

    /// 是否因取消而结束（状态运行总是由取消结束）
    pub fn was_cancelled(&self) -> bool {
        match self {
            RunReport::Motion(outcome) => matches!(outcome, MotionOutcome::Cancelled { .. }),
            RunReport::Status(_) => true,
        }
    }
}

/// 传输插槽
///
/// 运行线程每次采样时克隆出当前传输再发布，不会跨越等待持有读锁，
/// 因此连接/断开（`set`/`clear`）对正在进行的运行在下一个采样生效。
#[derive(Clone, Default)]
pub struct SinkSlot {
    inner: Arc<RwLock<Option<Arc<dyn TelemetrySink>>>>,
}

impl SinkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn TelemetrySink>) -> Self {
        let slot = Self::new();
        slot.set(sink);
        slot
    }

    pub fn set(&self, sink: Arc<dyn TelemetrySink>) {
        *self.inner.write() = Some(sink);
    }

    /// 移除传输，返回原来的传输
    pub fn clear(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.inner.write().take()
    }

    pub fn current(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.inner.read().clone()
    }

    /// 已配置且就绪
    pub fn is_ready(&self) -> bool {
        self.inner.read().as_ref().is_some_and(|sink| sink.is_ready())
    }
}

impl fmt::Debug for SinkSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.read();
        f.debug_struct("SinkSlot")
            .field("sink", &guard.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

/// 运行上下文
///
/// 所有字段都是共享句柄，克隆很便宜；每个运行线程持有一份克隆。
#[derive(Clone)]
pub struct RunContext {
    pub registry: Arc<RobotRegistry>,
    pub sink: SinkSlot,
    pub clock: Arc<dyn Clock>,
    pub observers: Arc<RwLock<ObserverSet>>,
    pub metrics: Arc<SimMetrics>,
}

impl RunContext {
    /// 使用墙上时钟、无传输、无观察者的上下文
    pub fn new(registry: Arc<RobotRegistry>) -> Self {
        Self {
            registry,
            sink: SinkSlot::new(),
            clock: Arc::new(SystemClock),
            observers: Arc::new(RwLock::new(ObserverSet::new())),
            metrics: Arc::new(SimMetrics::new()),
        }
    }

    pub fn with_sink(self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink.set(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.write().add(observer);
        self
    }

    /// 通过当前传输发布一条负载
    ///
    /// 发布失败只记录日志和指标，不返回错误（单次丢失不应中止运行）。
    /// 没有配置传输时返回 `false`。
    pub(crate) fn publish(&self, topic: &str, payload: &[u8]) -> bool {
        let Some(sink) = self.sink.current() else {
            return false;
        };
        match sink.publish(topic, payload) {
            Ok(()) => {
                debug!("Published {} bytes to {} via {}", payload.len(), topic, sink.name());
            },
            Err(e) => {
                self.metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to publish to {} via {}: {}", topic, sink.name(), e);
            },
        }
        true
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("robots", &self.registry.len())
            .field("sink", &self.sink)
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// 分配进程内唯一的运行编号
pub(crate) fn next_run_id() -> u64 {
    NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed)
}

/// 运行句柄
///
/// 丢弃句柄不会取消运行；取消请调用 [`RunHandle::cancel`] 或
/// `Simulator::stop_motion` / `stop_status`。
#[derive(Debug)]
pub struct RunHandle {
    robot: RobotId,
    kind: RunKind,
    run_id: u64,
    cancel: CancelToken,
    finished: Arc<AtomicBool>,
    done: Receiver<RunReport>,
}

impl RunHandle {
    pub(crate) fn new(
        robot: RobotId,
        kind: RunKind,
        run_id: u64,
        cancel: CancelToken,
        finished: Arc<AtomicBool>,
        done: Receiver<RunReport>,
    ) -> Self {
        Self {
            robot,
            kind,
            run_id,
            cancel,
            finished,
            done,
        }
    }

    pub fn robot(&self) -> &RobotId {
        &self.robot
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// 请求取消（非阻塞）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 运行线程是否已经退出（包括 panic）
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// 阻塞等待运行结束
    pub fn join(self) -> Result<RunReport, SimError> {
        self.done.recv().map_err(|_| {
            SimError::RunThread(format!(
                "{} run for {} exited without a report",
                self.kind, self.robot
            ))
        })
    }

    /// 等待运行结束，最多 `timeout`
    pub fn join_timeout(&self, timeout: Duration) -> Result<RunReport, SimError> {
        match self.done.recv_timeout(timeout) {
            Ok(report) => Ok(report),
            Err(RecvTimeoutError::Timeout) => Err(SimError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(SimError::RunThread(format!(
                "{} run for {} exited without a report",
                self.kind, self.robot
            ))),
        }
    }
}

/// 运行线程退出时（包括 panic 展开）设置完成标志
pub(crate) struct FinishGuard(pub(crate) Arc<AtomicBool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}
