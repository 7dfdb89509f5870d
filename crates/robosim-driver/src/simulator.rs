//! 模拟器（对外 API）
//!
//! 负责参数校验、运行互斥和线程生命周期：每个运行在独立线程上执行，
//! 启动时分配取消令牌，停止时只发信号不阻塞，`shutdown`/`Drop`
//! 取消所有运行并带超时地等待线程退出。

use crate::builder::SimulatorBuilder;
use crate::cancel::CancelToken;
use crate::error::SimError;
use crate::metrics::MetricsSnapshot;
use crate::motion::{MotionRequest, run_motion};
use crate::observer::RunObserver;
use crate::registry::RobotRegistry;
use crate::run::{FinishGuard, RunContext, RunHandle, RunKind, RunReport, next_run_id};
use crate::status::{StatusRun, run_status};
use crossbeam_channel::{RecvTimeoutError, bounded};
use parking_lot::Mutex;
use robosim_protocol::{
    OperationalStatus, Position, RobotId, RobotRecord, RobotStatus, Role, validate_battery,
};
use robosim_sink::TelemetrySink;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), SimError>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<(), SimError> {
        let (tx, rx) = bounded(1);

        // 看门狗线程代为 join，主线程带超时等待结果
        thread::spawn(move || {
            let _ = tx.send(self.join().is_ok());
        });

        match rx.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SimError::RunThread("run thread panicked".to_string())),
            Err(RecvTimeoutError::Timeout) => Err(SimError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(SimError::RunThread(
                "run thread panicked during join".to_string(),
            )),
        }
    }
}

type RunKey = (RobotId, RunKind);

struct ActiveRun {
    run_id: u64,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

/// 机器人遥测模拟器
///
/// # Example
///
/// ```
/// use robosim_driver::{MotionRequest, Position, RobotId, SimulatedClock, Simulator};
/// use std::sync::Arc;
///
/// let robot = RobotId::new("ROBOT-001").unwrap();
/// let sim = Simulator::builder()
///     .robot(robot.clone())
///     .clock(Arc::new(SimulatedClock::default()))
///     .build()
///     .unwrap();
///
/// let handle = sim
///     .start_motion(MotionRequest::new(robot.clone(), Position::planar(3.0, 4.0)))
///     .unwrap();
/// handle.join().unwrap();
/// assert_eq!(sim.position(&robot).unwrap(), Position::planar(3.0, 4.0));
/// ```
pub struct Simulator {
    ctx: RunContext,
    /// 活动运行表，键为 (机器人, 运行类型)
    active: Arc<Mutex<HashMap<RunKey, ActiveRun>>>,
    /// shutdown 时等待每个线程的最长时间
    join_timeout: Duration,
}

impl Simulator {
    pub fn builder() -> SimulatorBuilder {
        SimulatorBuilder::new()
    }

    pub(crate) fn new(ctx: RunContext, join_timeout: Duration) -> Self {
        Self {
            ctx,
            active: Arc::new(Mutex::new(HashMap::new())),
            join_timeout,
        }
    }

    /// 启动运动运行
    ///
    /// # Errors
    ///
    /// 按顺序检查，全部在启动线程之前同步返回：
    /// - `UnknownRobot`
    /// - `InvalidParameter`: 速度/周期非正，坐标非有限
    /// - `RunAlreadyActive`: 该机器人已有运动运行
    ///
    /// 没有配置传输时运行照常进行（只更新观察者和注册表）。
    pub fn start_motion(&self, request: MotionRequest) -> Result<RunHandle, SimError> {
        let run = request.resolve(&self.ctx.registry)?;
        let robot = run.robot().clone();
        self.spawn_run(robot, RunKind::Motion, move |ctx, cancel| {
            RunReport::Motion(run_motion(ctx, &run, cancel))
        })
    }

    /// 启动状态发布运行
    ///
    /// # Errors
    ///
    /// - `UnknownRobot`
    /// - `InvalidParameter`: 周期为 0
    /// - `SinkNotReady`: 没有配置传输或传输未就绪
    /// - `RunAlreadyActive`: 该机器人已有状态运行
    pub fn start_status(&self, robot: &RobotId, interval: Duration) -> Result<RunHandle, SimError> {
        if !self.ctx.registry.contains(robot) {
            return Err(SimError::UnknownRobot(robot.clone()));
        }
        let run = StatusRun::new(robot.clone(), interval)?;
        if !self.ctx.sink.is_ready() {
            return Err(SimError::SinkNotReady);
        }
        self.spawn_run(robot.clone(), RunKind::Status, move |ctx, cancel| {
            RunReport::Status(run_status(ctx, &run, cancel))
        })
    }

    fn spawn_run<F>(&self, robot: RobotId, kind: RunKind, body: F) -> Result<RunHandle, SimError>
    where
        F: FnOnce(&RunContext, &CancelToken) -> RunReport + Send + 'static,
    {
        let key = (robot.clone(), kind);
        let mut active = self.active.lock();

        if let Some(existing) = active.get(&key) {
            if !existing.thread.is_finished() {
                warn!("Rejected {} run for {}: one is already active", kind, robot);
                return Err(SimError::RunAlreadyActive { robot, kind });
            }
            // 线程 panic 时不会自行移除记录
            if let Some(stale) = active.remove(&key) {
                debug!("Reaping stale {} run {} for {}", kind, stale.run_id, robot);
                let _ = stale.thread.join();
            }
        }

        let run_id = next_run_id();
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = bounded(1);

        let mut ctx = self.ctx.clone();
        if let Some(clock) = ctx.clock.fork() {
            ctx.clock = clock;
        }
        let table = self.active.clone();
        let thread_cancel = cancel.clone();
        let thread_finished = finished.clone();
        let thread_key = key.clone();

        let thread = thread::Builder::new()
            .name(format!("robosim-{}-{}", kind, robot))
            .spawn(move || {
                let _guard = FinishGuard(thread_finished);
                let report = body(&ctx, &thread_cancel);
                {
                    let mut table = table.lock();
                    if table
                        .get(&thread_key)
                        .is_some_and(|run| run.run_id == run_id)
                    {
                        table.remove(&thread_key);
                    }
                }
                let _ = done_tx.send(report);
            })
            .map_err(|e| SimError::RunThread(format!("failed to spawn {} run: {}", kind, e)))?;

        active.insert(
            key,
            ActiveRun {
                run_id,
                cancel: cancel.clone(),
                thread,
            },
        );
        debug!("Spawned {} run {} for {}", kind, run_id, robot);

        Ok(RunHandle::new(robot, kind, run_id, cancel, finished, done_rx))
    }

    fn signal(&self, robot: &RobotId, kind: RunKind) -> bool {
        let active = self.active.lock();
        match active.get(&(robot.clone(), kind)) {
            Some(run) => {
                run.cancel.cancel();
                info!("Stop requested for {} run of {}", kind, robot);
                true
            },
            None => false,
        }
    }

    /// 请求停止运动运行（非阻塞），返回是否有活动运行
    pub fn stop_motion(&self, robot: &RobotId) -> bool {
        self.signal(robot, RunKind::Motion)
    }

    /// 请求停止状态运行（非阻塞），返回是否有活动运行
    pub fn stop_status(&self, robot: &RobotId) -> bool {
        self.signal(robot, RunKind::Status)
    }

    /// 请求停止该机器人的所有运行
    pub fn stop(&self, robot: &RobotId) -> bool {
        let motion = self.stop_motion(robot);
        let status = self.stop_status(robot);
        motion || status
    }

    /// 请求停止所有运行（非阻塞），返回被通知的运行数
    pub fn stop_all(&self) -> usize {
        let active = self.active.lock();
        for run in active.values() {
            run.cancel.cancel();
        }
        active.len()
    }

    pub fn is_active(&self, robot: &RobotId, kind: RunKind) -> bool {
        self.active
            .lock()
            .get(&(robot.clone(), kind))
            .is_some_and(|run| !run.thread.is_finished())
    }

    /// 当前活动的运行（按机器人、类型排序）
    pub fn active_runs(&self) -> Vec<(RobotId, RunKind)> {
        let mut runs: Vec<_> = self
            .active
            .lock()
            .iter()
            .filter(|(_, run)| !run.thread.is_finished())
            .map(|(key, _)| key.clone())
            .collect();
        runs.sort();
        runs
    }

    /// 取消所有运行并等待线程退出（每个线程最多 `join_timeout`）
    ///
    /// 可以重复调用；`Drop` 时自动调用。
    pub fn shutdown(&self) {
        let runs: Vec<(RunKey, ActiveRun)> = self.active.lock().drain().collect();
        if runs.is_empty() {
            return;
        }
        for (_, run) in &runs {
            run.cancel.cancel();
        }
        info!("Shutting down {} active run(s)", runs.len());

        for ((robot, kind), run) in runs {
            if let Err(e) = run.thread.join_timeout(self.join_timeout) {
                error!(
                    "{} run for {} failed to shut down within {:?}: {}",
                    kind, robot, self.join_timeout, e
                );
            }
        }
    }

    // ==================== 传输 ====================

    /// 设置（或替换）传输，对正在进行的运行在下一个采样生效
    pub fn set_sink(&self, sink: Arc<dyn TelemetrySink>) {
        info!("Telemetry sink set to {}", sink.name());
        self.ctx.sink.set(sink);
    }

    /// 移除传输（断开），返回原来的传输
    ///
    /// 正在进行的状态运行不会停止，之后的采样不再发布。
    pub fn clear_sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        let previous = self.ctx.sink.clear();
        if let Some(sink) = &previous {
            info!("Telemetry sink {} removed", sink.name());
        }
        previous
    }

    pub fn sink_ready(&self) -> bool {
        self.ctx.sink.is_ready()
    }

    // ==================== 操作员编辑 ====================

    /// 原地修改机器人状态，结果不合法时不做修改
    pub fn update_status<F>(&self, robot: &RobotId, edit: F) -> Result<RobotStatus, SimError>
    where
        F: FnOnce(&mut RobotStatus),
    {
        self.ctx.registry.update_status(robot, edit)
    }

    pub fn set_battery(&self, robot: &RobotId, level: u32) -> Result<RobotStatus, SimError> {
        let level = validate_battery(level)?;
        self.update_status(robot, |s| s.battery_level = level)
    }

    pub fn set_role(&self, robot: &RobotId, role: Role) -> Result<RobotStatus, SimError> {
        self.update_status(robot, |s| s.role = role)
    }

    pub fn set_operational_status(
        &self,
        robot: &RobotId,
        status: OperationalStatus,
    ) -> Result<RobotStatus, SimError> {
        self.update_status(robot, |s| s.operational_status = status)
    }

    // ==================== 读取 ====================

    pub fn position(&self, robot: &RobotId) -> Result<Position, SimError> {
        self.ctx.registry.get_position(robot)
    }

    pub fn status(&self, robot: &RobotId) -> Result<RobotStatus, SimError> {
        self.ctx.registry.get_status(robot)
    }

    pub fn record(&self, robot: &RobotId) -> Result<RobotRecord, SimError> {
        self.ctx.registry.get(robot)
    }

    pub fn robots(&self) -> &[RobotId] {
        self.ctx.registry.ids()
    }

    pub fn registry(&self) -> &Arc<RobotRegistry> {
        &self.ctx.registry
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    // ==================== 观察者与指标 ====================

    pub fn add_observer(&self, observer: Arc<dyn RunObserver>) {
        self.ctx.observers.write().add(observer);
    }

    pub fn clear_observers(&self) {
        self.ctx.observers.write().clear();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.ctx.metrics.reset();
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("ctx", &self.ctx)
            .field("active_runs", &self.active_runs())
            .finish()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
