//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置
//! 2. 创建遥测后端与模拟器
//! 3. 启动运行，在终端打印进度，等待结束
//! 4. 打印统计后退出（Drop 时关闭模拟器）

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use robosim_driver::{
    ChannelObserver, MotionRun, RunEvent, RunObserver, RunReport, SimError, Simulator,
};
use robosim_protocol::RobotId;
use robosim_tools::SimConfig;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::commands::{MoveCommand, SimulateCommand, StatusCommand};
use crate::utils::{
    EventPrinter, GlobalArgs, build_simulator, build_sink, install_ctrlc, pick_robot,
};

/// 等待事件的轮询周期
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 发布指定条数后停止状态运行
///
/// 在运行线程内同步调用，第 `count` 条样本之后的睡眠会立即被取消。
struct StopAfterStatus {
    robot: RobotId,
    count: u64,
    simulator: Weak<Simulator>,
}

impl RunObserver for StopAfterStatus {
    fn on_status_sample(&self, robot: &RobotId, emitted: u64) {
        if *robot == self.robot
            && emitted >= self.count
            && let Some(simulator) = self.simulator.upgrade()
        {
            simulator.stop_status(robot);
        }
    }
}

/// One-shot 模式
pub struct OneShotMode {
    config: SimConfig,
    simulator: Arc<Simulator>,
    simulated: bool,
}

impl OneShotMode {
    /// 创建新的 One-shot 模式实例
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let config = global.load_config()?;
        let sink = build_sink(global, &config)?;
        let simulator = Arc::new(build_simulator(global, &config, Some(sink))?);
        install_ctrlc(&simulator)?;

        Ok(Self {
            config,
            simulator,
            simulated: global.simulated,
        })
    }

    /// 运动模拟
    pub fn move_to(&self, args: MoveCommand) -> Result<()> {
        let robot = pick_robot(&self.config, args.robot.as_deref())?;
        let request = args.to_request(&self.config, robot.clone())?;
        let run = request.resolve(self.simulator.registry())?;

        println!(
            "⏳ {} 开始运动: ({:.2}, {:.2}) → ({:.2}, {:.2})，航向 {:.2}°，距离 {:.2} m",
            robot,
            run.start().x,
            run.start().y,
            run.end().x,
            run.end().y,
            run.plan().heading(),
            run.plan().total_distance()
        );

        let events = self.subscribe();
        let handle = self.simulator.start_motion(request)?;
        self.pump(&events, &mut EventPrinter::new(args.every), 1, |_| {});
        handle.join()?;

        self.print_metrics();
        Ok(())
    }

    /// 状态发布
    pub fn publish_status(&self, args: StatusCommand) -> Result<()> {
        if args.count == Some(0) {
            anyhow::bail!("--count 必须大于 0");
        }
        if self.simulated && args.count.is_none() {
            anyhow::bail!("--simulated 模式下必须指定 --count");
        }

        let robot = pick_robot(&self.config, args.robot.as_deref())?;
        let interval = args.interval(&self.config)?;
        let status = args.apply_edits(&self.simulator, &robot)?;

        println!(
            "⏳ {} 开始发布状态: 电量 {}%，{} / {}，每 {:?}",
            robot, status.battery_level, status.role, status.operational_status, interval
        );

        if let Some(count) = args.count {
            self.simulator.add_observer(Arc::new(StopAfterStatus {
                robot: robot.clone(),
                count,
                simulator: Arc::downgrade(&self.simulator),
            }));
        }

        let events = self.subscribe();
        let handle = self
            .simulator
            .start_status(&robot, interval)
            .map_err(|e| match e {
                SimError::SinkNotReady => anyhow::anyhow!("遥测后端未就绪，无法发布状态"),
                other => other.into(),
            })?;
        self.pump(&events, &mut EventPrinter::new(1), 1, |_| {});
        handle.join()?;

        self.print_metrics();
        Ok(())
    }

    /// 多机器人运动 + 状态发布
    ///
    /// 模拟时钟下每个运行有独立的虚拟时间线，状态运行按运动的虚拟时长
    /// 发布固定条数，输出可复现。
    pub fn simulate(&self, args: SimulateCommand) -> Result<()> {
        let requests = args.motion_requests(&self.config)?;
        let status_interval = args.status_interval(&self.config)?;
        // 先校验全部请求，避免部分机器人已经开始运动
        let mut runs = Vec::with_capacity(requests.len());
        for request in &requests {
            runs.push(request.resolve(self.simulator.registry())?);
        }

        if self.simulated && !args.no_status {
            for run in &runs {
                self.simulator.add_observer(Arc::new(StopAfterStatus {
                    robot: run.robot().clone(),
                    count: status_samples_during(run, status_interval),
                    simulator: Arc::downgrade(&self.simulator),
                }));
            }
        }

        let events = self.subscribe();
        let mut handles = Vec::new();
        for request in requests {
            let robot = request.robot().clone();
            if !args.no_status {
                handles.push(
                    self.simulator
                        .start_status(&robot, status_interval)
                        .with_context(|| format!("{} 状态发布启动失败", robot))?,
                );
            }
            handles.push(self.simulator.start_motion(request)?);
            println!("⏳ {} 开始运动", robot);
        }

        let simulator = &self.simulator;
        let simulated = self.simulated;
        self.pump(
            &events,
            &mut EventPrinter::new(args.every),
            handles.len(),
            |event| {
                // 运动结束时停止该机器人的状态发布（模拟时钟下由条数决定）
                if let RunEvent::Finished {
                    robot,
                    report: RunReport::Motion(_),
                } = event
                    && !simulated
                {
                    simulator.stop_status(robot);
                }
            },
        );
        for handle in handles {
            handle.join()?;
        }

        self.print_metrics();
        Ok(())
    }

    fn subscribe(&self) -> Receiver<RunEvent> {
        let (observer, events) = ChannelObserver::unbounded();
        self.simulator.add_observer(Arc::new(observer));
        events
    }

    /// 打印事件直到 `runs` 个运行结束
    ///
    /// 运行线程在移除活动记录之前发出结束事件，所以活动运行为空时事件已全部入队。
    fn pump<F>(
        &self,
        events: &Receiver<RunEvent>,
        printer: &mut EventPrinter,
        runs: usize,
        mut on_event: F,
    ) where
        F: FnMut(&RunEvent),
    {
        let mut finished = 0;
        while finished < runs {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    printer.print(&event);
                    on_event(&event);
                    if matches!(event, RunEvent::Finished { .. }) {
                        finished += 1;
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    if self.simulator.active_runs().is_empty() {
                        for event in events.try_iter() {
                            printer.print(&event);
                        }
                        break;
                    }
                },
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn print_metrics(&self) {
        let metrics = self.simulator.metrics();
        println!(
            "📊 位置样本 {}，状态样本 {}，发布失败 {}",
            metrics.position_samples, metrics.status_samples, metrics.publish_failures
        );
    }
}

/// 运动虚拟时长内应发布的状态条数（含起点时刻的一条）
fn status_samples_during(run: &MotionRun, status_interval: Duration) -> u64 {
    let ticks = u32::try_from(run.plan().steps().count().saturating_sub(1)).unwrap_or(u32::MAX);
    let duration = run.interval().saturating_mul(ticks);
    let status_ticks = duration.as_nanos() / status_interval.as_nanos().max(1);
    u64::try_from(status_ticks).unwrap_or(u64::MAX).saturating_add(1)
}
