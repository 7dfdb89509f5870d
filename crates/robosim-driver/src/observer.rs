//! 观察者钩子
//!
//! 运行线程在每次采样和运行结束时通知观察者。回调在运行线程上同步执行，
//! 因此实现必须很快返回；需要在其他线程渲染（终端、UI）时，
//! 用 [`ChannelObserver`] 把事件转发出去。
//!
//! # 使用示例
//!
//! ```rust
//! use robosim_driver::{ChannelObserver, ObserverSet, RunObserver};
//! use std::sync::Arc;
//!
//! let mut observers = ObserverSet::new();
//! let (observer, rx) = ChannelObserver::unbounded();
//! observers.add(Arc::new(observer));
//! assert_eq!(observers.len(), 1);
//! # drop(rx);
//! ```

use crate::run::RunReport;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use robosim_protocol::RobotId;
use std::sync::Arc;

/// 运行观察者
///
/// 所有方法都有空的默认实现，只需覆盖关心的事件。
///
/// # 要求
///
/// - 不要阻塞：回调返回前运行线程不会继续
/// - 可以在回调里取消运行（例如测试中在第 N 个采样后取消），
///   取消在下一次检查点生效
pub trait RunObserver: Send + Sync {
    /// 每个位置采样之后调用
    ///
    /// `x`、`y` 为全精度坐标（发布的负载是舍入后的值），
    /// `progress` 为 0..=100 的百分比（一位小数）。
    fn on_position_sample(&self, robot: &RobotId, x: f64, y: f64, progress: f64) {
        let _ = (robot, x, y, progress);
    }

    /// 每个状态采样之后调用，`emitted` 为本次运行累计的采样数
    fn on_status_sample(&self, robot: &RobotId, emitted: u64) {
        let _ = (robot, emitted);
    }

    /// 运行结束（完成、取消或退化）时调用一次
    ///
    /// 此时该运行仍登记为活动运行，在回调里为同一机器人启动同类运行会得到
    /// `RunAlreadyActive`。
    fn on_run_finished(&self, robot: &RobotId, report: &RunReport) {
        let _ = (robot, report);
    }
}

/// 观察者集合
///
/// 列表本身不做同步，由调用方包在 `RwLock` 中共享（运行线程只读）。
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify_position(&self, robot: &RobotId, x: f64, y: f64, progress: f64) {
        for observer in &self.observers {
            observer.on_position_sample(robot, x, y, progress);
        }
    }

    pub fn notify_status(&self, robot: &RobotId, emitted: u64) {
        for observer in &self.observers {
            observer.on_status_sample(robot, emitted);
        }
    }

    pub fn notify_finished(&self, robot: &RobotId, report: &RunReport) {
        for observer in &self.observers {
            observer.on_run_finished(robot, report);
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.observers.len())
            .finish()
    }
}

/// 观察者事件
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    PositionSample {
        robot: RobotId,
        x: f64,
        y: f64,
        progress: f64,
    },
    StatusSample {
        robot: RobotId,
        emitted: u64,
    },
    Finished {
        robot: RobotId,
        report: RunReport,
    },
}

/// 通过 channel 转发事件的观察者
///
/// 使用 `try_send`：有界 channel 满了或接收端已关闭时丢弃事件，不阻塞运行线程。
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<RunEvent>,
}

impl ChannelObserver {
    pub fn unbounded() -> (Self, Receiver<RunEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<RunEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl RunObserver for ChannelObserver {
    fn on_position_sample(&self, robot: &RobotId, x: f64, y: f64, progress: f64) {
        let _ = self.tx.try_send(RunEvent::PositionSample {
            robot: robot.clone(),
            x,
            y,
            progress,
        });
    }

    fn on_status_sample(&self, robot: &RobotId, emitted: u64) {
        let _ = self.tx.try_send(RunEvent::StatusSample {
            robot: robot.clone(),
            emitted,
        });
    }

    fn on_run_finished(&self, robot: &RobotId, report: &RunReport) {
        let _ = self.tx.try_send(RunEvent::Finished {
            robot: robot.clone(),
            report: report.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusOutcome;
    use robosim_protocol::RobotStatus;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counting {
        positions: AtomicU64,
        statuses: AtomicU64,
    }

    impl RunObserver for Counting {
        fn on_position_sample(&self, _robot: &RobotId, _x: f64, _y: f64, _progress: f64) {
            self.positions.fetch_add(1, Ordering::Relaxed);
        }

        fn on_status_sample(&self, _robot: &RobotId, _emitted: u64) {
            self.statuses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_notify_all_observers() {
        let robot = RobotId::new("R1").unwrap();
        let a = Arc::new(Counting {
            positions: AtomicU64::new(0),
            statuses: AtomicU64::new(0),
        });
        let b = Arc::new(Counting {
            positions: AtomicU64::new(0),
            statuses: AtomicU64::new(0),
        });

        let mut set = ObserverSet::new();
        set.add(a.clone());
        set.add(b.clone());
        set.notify_position(&robot, 1.0, 2.0, 10.0);
        set.notify_position(&robot, 1.5, 2.5, 20.0);
        set.notify_status(&robot, 1);

        assert_eq!(a.positions.load(Ordering::Relaxed), 2);
        assert_eq!(b.positions.load(Ordering::Relaxed), 2);
        assert_eq!(a.statuses.load(Ordering::Relaxed), 1);

        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl RunObserver for Silent {}

        let robot = RobotId::new("R1").unwrap();
        let mut set = ObserverSet::new();
        set.add(Arc::new(Silent));
        set.notify_position(&robot, 0.0, 0.0, 0.0);
        set.notify_status(&robot, 3);
    }

    #[test]
    fn test_channel_observer_forwards_events() {
        let robot = RobotId::new("R1").unwrap();
        let (observer, rx) = ChannelObserver::unbounded();

        observer.on_position_sample(&robot, 3.0, 4.0, 50.0);
        observer.on_status_sample(&robot, 7);
        let report = RunReport::Status(StatusOutcome {
            emitted: 7,
            last_status: RobotStatus::default(),
        });
        observer.on_run_finished(&robot, &report);

        assert_eq!(
            rx.try_recv().unwrap(),
            RunEvent::PositionSample {
                robot: robot.clone(),
                x: 3.0,
                y: 4.0,
                progress: 50.0
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            RunEvent::StatusSample {
                robot: robot.clone(),
                emitted: 7
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), RunEvent::Finished { .. }));
    }

    #[test]
    fn test_bounded_channel_observer_drops_when_full() {
        let robot = RobotId::new("R1").unwrap();
        let (observer, rx) = ChannelObserver::bounded(1);
        observer.on_status_sample(&robot, 1);
        observer.on_status_sample(&robot, 2);
        assert_eq!(rx.len(), 1);
    }
}
