//! 模拟引擎集成测试
//!
//! 通过 `Simulator` 公共 API 驱动完整运行，使用虚拟时钟保证确定性，
//! 使用 `ChannelSink` 收集发布的负载。

mod common;

use common::{CancelAfterPositions, FailingSink, robot, simulated_clock};
use robosim_driver::motion::run_motion;
use robosim_driver::{
    CancelToken, ChannelObserver, MotionOutcome, MotionRequest, MotionRun, OperationalStatus,
    Position, RobotRegistry, RunContext, RunEvent, RunKind, RunObserver, RunReport, SimError,
    Simulator, StatusOutcome,
};
use robosim_protocol::{PositionPayload, RobotId, StatusPayload};
use robosim_sink::ChannelSink;
use std::sync::Arc;
use std::time::{Duration, Instant};

const JOIN: Duration = Duration::from_secs(10);

#[test]
fn reference_scenario_emits_224_samples_then_snaps_to_end() {
    let r1 = robot("ROBOT-001");
    let (sink, rx) = ChannelSink::unbounded();
    let (observer, events) = ChannelObserver::unbounded();
    let sim = Simulator::builder()
        .robot(r1.clone())
        .sink(sink)
        .clock(simulated_clock())
        .observer(Arc::new(observer))
        .build()
        .unwrap();

    let handle = sim
        .start_motion(
            MotionRequest::new(r1.clone(), Position::planar(100.0, 50.0))
                .start(Position::ORIGIN)
                .speed(1.0)
                .interval(Duration::from_millis(500)),
        )
        .unwrap();
    let report = handle.join_timeout(JOIN).unwrap();

    assert_eq!(
        report,
        RunReport::Motion(MotionOutcome::Completed {
            position: Position::planar(100.0, 50.0),
            samples: 225,
        })
    );

    let payloads: Vec<PositionPayload> = rx
        .try_iter()
        .map(|m| {
            assert_eq!(m.topic, "robot/ROBOT-001/position");
            PositionPayload::from_json_slice(&m.payload).unwrap()
        })
        .collect();
    assert_eq!(payloads.len(), 225);
    assert!(payloads.iter().all(|p| p.heading == 26.57));
    assert!(payloads.iter().all(|p| p.position.z == 0.0));
    assert_eq!(payloads[0].position, Position::ORIGIN);
    // 第二个采样：前进 0.5 米
    assert_eq!(payloads[1].position, Position::planar(0.45, 0.22));
    assert_eq!(payloads[224].position, Position::planar(100.0, 50.0));

    // 时间戳为秒精度、非递减，覆盖 224 个 0.5 秒周期
    assert_eq!(payloads[0].timestamp, "2025-01-01T00:00:00Z");
    assert_eq!(payloads[224].timestamp, "2025-01-01T00:01:52Z");
    assert!(payloads.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    assert_eq!(sim.position(&r1).unwrap(), Position::planar(100.0, 50.0));
    assert!(!sim.is_active(&r1, RunKind::Motion));

    let progress: Vec<f64> = events
        .try_iter()
        .filter_map(|e| match e {
            RunEvent::PositionSample { progress, .. } => Some(progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 225);
    assert_eq!(progress[0], 0.0);
    assert_eq!(*progress.last().unwrap(), 100.0);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    let metrics = sim.metrics();
    assert_eq!(metrics.position_samples, 225);
    assert_eq!(metrics.runs_completed, 1);
}

#[test]
fn next_run_starts_from_last_position() {
    let r1 = robot("ROBOT-001");
    let sim = Simulator::builder()
        .robot(r1.clone())
        .clock(simulated_clock())
        .build()
        .unwrap();

    sim.start_motion(MotionRequest::new(r1.clone(), Position::planar(3.0, 4.0)))
        .unwrap()
        .join_timeout(JOIN)
        .unwrap();

    let (sink, rx) = ChannelSink::unbounded();
    sim.set_sink(Arc::new(sink));
    sim.start_motion(MotionRequest::new(r1.clone(), Position::planar(3.0, 0.0)))
        .unwrap()
        .join_timeout(JOIN)
        .unwrap();

    let first = PositionPayload::from_json_slice(&rx.try_recv().unwrap().payload).unwrap();
    assert_eq!(first.position, Position::planar(3.0, 4.0));
    assert_eq!(first.heading, 270.0);
    assert_eq!(sim.position(&r1).unwrap(), Position::planar(3.0, 0.0));
}

#[test]
fn degenerate_run_emits_nothing() {
    let r1 = robot("ROBOT-001");
    let (sink, rx) = ChannelSink::unbounded();
    let sim = Simulator::builder()
        .robot(r1.clone())
        .sink(sink)
        .clock(simulated_clock())
        .initial_position(r1.clone(), Position::planar(5.0, 5.0))
        .build()
        .unwrap();

    let report = sim
        .start_motion(MotionRequest::new(r1.clone(), Position::planar(5.0, 5.0)))
        .unwrap()
        .join_timeout(JOIN)
        .unwrap();

    assert_eq!(
        report,
        RunReport::Motion(MotionOutcome::Degenerate {
            position: Position::planar(5.0, 5.0)
        })
    );
    assert!(rx.try_recv().is_err());
    assert_eq!(sim.metrics().runs_degenerate, 1);
}

#[test]
fn cancelled_run_persists_last_emitted_position() {
    let r1 = robot("ROBOT-001");
    let registry = Arc::new(RobotRegistry::new([r1.clone()]));
    let (sink, rx) = ChannelSink::unbounded();
    let cancel = CancelToken::new();
    let ctx = RunContext::new(registry.clone())
        .with_sink(Arc::new(sink))
        .with_clock(simulated_clock())
        .with_observer(Arc::new(CancelAfterPositions::new(10, cancel.clone())));

    let run = MotionRun::new(
        r1.clone(),
        Position::ORIGIN,
        Position::planar(100.0, 0.0),
        1.0,
        Duration::from_millis(500),
    )
    .unwrap();
    let outcome = run_motion(&ctx, &run, &cancel);

    assert_eq!(
        outcome,
        MotionOutcome::Cancelled {
            position: Position::planar(4.5, 0.0),
            samples: 10,
        }
    );
    assert_eq!(rx.try_iter().count(), 10);
    assert_eq!(registry.get_position(&r1).unwrap(), Position::planar(4.5, 0.0));
    assert_eq!(ctx.metrics.snapshot().runs_cancelled, 1);
}

#[test]
fn stop_motion_takes_effect_within_one_interval() {
    let r1 = robot("ROBOT-001");
    let (sink, rx) = ChannelSink::unbounded();
    let (observer, events) = ChannelObserver::unbounded();
    let sim = Simulator::builder()
        .robot(r1.clone())
        .sink(sink)
        .observer(Arc::new(observer))
        .build()
        .unwrap();

    let interval = Duration::from_millis(200);
    let handle = sim
        .start_motion(
            MotionRequest::new(r1.clone(), Position::planar(1000.0, 0.0))
                .start(Position::ORIGIN)
                .speed(10.0)
                .interval(interval),
        )
        .unwrap();

    // 等到第二个采样之后再停止
    let mut seen = 0;
    while seen < 2 {
        if let Ok(RunEvent::PositionSample { .. }) = events.recv_timeout(JOIN) {
            seen += 1;
        }
    }
    let requested = Instant::now();
    assert!(sim.stop_motion(&r1));
    let report = handle.join_timeout(JOIN).unwrap();
    assert!(requested.elapsed() < interval * 3);

    let RunReport::Motion(MotionOutcome::Cancelled { position, samples }) = report else {
        panic!("Expected cancelled motion run, got {report:?}");
    };
    let published: Vec<PositionPayload> = rx
        .try_iter()
        .map(|m| PositionPayload::from_json_slice(&m.payload).unwrap())
        .collect();
    assert_eq!(published.len() as u64, samples);
    assert_eq!(published.last().unwrap().position, position);
    assert_ne!(position, Position::planar(1000.0, 0.0));
    assert_eq!(sim.position(&r1).unwrap(), position);
}

#[test]
fn second_motion_run_is_rejected_without_disturbing_first() {
    let r1 = robot("ROBOT-001");
    let (sink, _rx) = ChannelSink::unbounded();
    let sim = Simulator::builder().robot(r1.clone()).sink(sink).build().unwrap();

    let first = sim
        .start_motion(
            MotionRequest::new(r1.clone(), Position::planar(500.0, 0.0))
                .interval(Duration::from_millis(10)),
        )
        .unwrap();
    let err = sim
        .start_motion(MotionRequest::new(r1.clone(), Position::planar(-5.0, 0.0)))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "A motion run is already active for robot ROBOT-001"
    );
    assert!(sim.is_active(&r1, RunKind::Motion));
    assert!(!first.is_finished());

    first.cancel();
    let report = first.join_timeout(JOIN).unwrap();
    let position = match report {
        RunReport::Motion(MotionOutcome::Cancelled { position, .. }) => position,
        other => panic!("Expected cancelled motion run, got {other:?}"),
    };
    // 第一个运行朝 +x 方向前进，没有被第二个请求改向
    assert!(position.x >= 0.0);
    assert_eq!(position.y, 0.0);
}

#[test]
fn status_run_reflects_operator_edit_on_next_sample() {
    struct EditAfterFirst {
        registry: Arc<RobotRegistry>,
    }
    impl RunObserver for EditAfterFirst {
        fn on_status_sample(&self, robot: &RobotId, emitted: u64) {
            if emitted == 1 {
                self.registry
                    .update_status(robot, |s| s.battery_level = 50)
                    .unwrap();
            }
        }
    }

    let r2 = robot("ROBOT-002");
    let (sink, rx) = ChannelSink::unbounded();
    let (observer, events) = ChannelObserver::unbounded();
    let sim = Simulator::builder()
        .robot(r2.clone())
        .sink(sink)
        .build()
        .unwrap();
    sim.add_observer(Arc::new(EditAfterFirst {
        registry: sim.registry().clone(),
    }));
    sim.add_observer(Arc::new(observer));

    let handle = sim.start_status(&r2, Duration::from_millis(20)).unwrap();
    loop {
        if let Ok(RunEvent::StatusSample { emitted, .. }) = events.recv_timeout(JOIN)
            && emitted >= 2
        {
            break;
        }
    }
    sim.set_operational_status(&r2, OperationalStatus::Charging)
        .unwrap();
    assert!(sim.stop_status(&r2));

    let report = handle.join_timeout(JOIN).unwrap();
    let RunReport::Status(StatusOutcome {
        emitted,
        last_status,
    }) = report
    else {
        panic!("Expected status report, got {report:?}");
    };
    assert!(emitted >= 2);
    assert_eq!(last_status.battery_level, 50);
    assert_eq!(last_status.operational_status, OperationalStatus::Charging);

    let payloads: Vec<StatusPayload> = rx
        .try_iter()
        .map(|m| {
            assert_eq!(m.topic, "robot/ROBOT-002/status");
            StatusPayload::from_json_slice(&m.payload).unwrap()
        })
        .collect();
    assert_eq!(payloads.len() as u64, emitted);
    assert_eq!(payloads[0].battery_level, 80);
    assert_eq!(payloads[1].battery_level, 50);

    // 停止后注册表保留操作员最后的修改
    assert_eq!(
        sim.status(&r2).unwrap().operational_status,
        OperationalStatus::Charging
    );
}

#[test]
fn status_run_without_sink_is_rejected() {
    let r1 = robot("ROBOT-001");
    let sim = Simulator::builder().robot(r1.clone()).build().unwrap();
    assert!(matches!(
        sim.start_status(&r1, Duration::from_secs(2)),
        Err(SimError::SinkNotReady)
    ));
    assert!(matches!(
        sim.start_status(&robot("NOPE"), Duration::from_secs(2)),
        Err(SimError::UnknownRobot(_))
    ));
    assert!(sim.active_runs().is_empty());
}

#[test]
fn publish_failures_do_not_abort_the_run() {
    let r1 = robot("ROBOT-001");
    let sink = Arc::new(FailingSink::default());
    let sim = Simulator::builder()
        .robot(r1.clone())
        .shared_sink(sink.clone())
        .clock(simulated_clock())
        .build()
        .unwrap();

    let report = sim
        .start_motion(
            MotionRequest::new(r1.clone(), Position::planar(0.0, 10.0)).start(Position::ORIGIN),
        )
        .unwrap()
        .join_timeout(JOIN)
        .unwrap();

    // 距离 10，步长 0.5：20 个循环内采样 + 1 个终点采样
    assert_eq!(report, RunReport::Motion(MotionOutcome::Completed {
        position: Position::planar(0.0, 10.0),
        samples: 21,
    }));
    assert_eq!(sink.attempts.load(std::sync::atomic::Ordering::Relaxed), 21);
    assert_eq!(sim.metrics().publish_failures, 21);
    assert_eq!(sim.position(&r1).unwrap(), Position::planar(0.0, 10.0));
}

#[test]
fn robots_run_independently() {
    let robots = [robot("ROBOT-001"), robot("ROBOT-002"), robot("ROBOT-003")];
    let (sink, rx) = ChannelSink::unbounded();
    let sim = Simulator::builder()
        .robots(robots.clone())
        .sink(sink)
        .clock(simulated_clock())
        .build()
        .unwrap();

    let handles: Vec<_> = robots
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let end = Position::planar(10.0 * (i as f64 + 1.0), 0.0);
            sim.start_motion(MotionRequest::new(r.clone(), end).speed(2.0))
                .unwrap()
        })
        .collect();
    for handle in handles {
        handle.join_timeout(JOIN).unwrap();
    }

    let messages: Vec<_> = rx.try_iter().collect();
    for (i, r) in robots.iter().enumerate() {
        let topic = format!("robot/{}/position", r);
        let count = messages.iter().filter(|m| m.topic == topic).count();
        // 距离 10(i+1)，步长 1：10(i+1) 个循环内采样 + 终点
        assert_eq!(count, 10 * (i + 1) + 1);
        assert_eq!(
            sim.position(r).unwrap(),
            Position::planar(10.0 * (i as f64 + 1.0), 0.0)
        );
    }
}

#[test]
fn shutdown_stops_every_run() {
    let robots = [robot("A"), robot("B")];
    let (sink, _rx) = ChannelSink::unbounded();
    let sim = Simulator::builder()
        .robots(robots.clone())
        .sink(sink)
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for r in &robots {
        handles.push(sim.start_status(r, Duration::from_secs(30)).unwrap());
        handles.push(
            sim.start_motion(
                MotionRequest::new(r.clone(), Position::planar(1e6, 0.0))
                    .interval(Duration::from_secs(30)),
            )
            .unwrap(),
        );
    }
    assert_eq!(sim.active_runs().len(), 4);

    let started = Instant::now();
    sim.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(sim.active_runs().is_empty());
    for handle in handles {
        assert!(handle.is_finished());
        assert!(handle.join().unwrap().was_cancelled());
    }
}

#[test]
fn concurrent_runs_on_simulated_clock_keep_their_own_timeline() {
    let r1 = robot("ROBOT-001");
    let (sink, rx) = ChannelSink::unbounded();
    let sim = Simulator::builder()
        .robot(r1.clone())
        .sink(sink)
        .clock(simulated_clock())
        .build()
        .unwrap();

    // 状态运行在虚拟时钟上不阻塞，会在运动运行期间产生大量采样
    let status = sim.start_status(&r1, Duration::from_secs(2)).unwrap();
    let motion = sim
        .start_motion(
            MotionRequest::new(r1.clone(), Position::planar(100.0, 50.0))
                .start(Position::ORIGIN)
                .speed(1.0)
                .interval(Duration::from_millis(500)),
        )
        .unwrap();
    motion.join_timeout(JOIN).unwrap();
    sim.stop_status(&r1);
    status.join_timeout(JOIN).unwrap();

    let positions: Vec<PositionPayload> = rx
        .try_iter()
        .filter(|m| m.topic == "robot/ROBOT-001/position")
        .map(|m| PositionPayload::from_json_slice(&m.payload).unwrap())
        .collect();
    assert_eq!(positions.len(), 225);
    assert_eq!(positions[0].timestamp, "2025-01-01T00:00:00Z");
    assert_eq!(positions[224].timestamp, "2025-01-01T00:01:52Z");
}
