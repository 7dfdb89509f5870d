//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道：rustyline 在输入线程内常驻（保留历史），
//! 主线程处理命令。运行事件由后台打印线程输出，不阻塞输入。

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded};
use robosim_driver::{
    ChannelObserver, MotionRequest, OperationalStatus, Role, RunKind, Simulator,
};
use robosim_protocol::RobotId;
use robosim_tools::SimConfig;
use rustyline::Editor;
use std::panic;
use std::sync::Arc;
use std::thread;

use crate::utils::{
    EventPrinter, GlobalArgs, build_simulator, build_sink, parse_point, parse_secs,
};

/// REPL 会话（模拟器在会话内常驻）
pub struct ReplSession {
    global: GlobalArgs,
    config: SimConfig,
    simulator: Arc<Simulator>,
    selected: RobotId,
}

impl ReplSession {
    /// 创建新会话（未连接遥测后端）
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let config = global.load_config()?;
        let simulator = Arc::new(build_simulator(global, &config, None)?);
        let selected = config
            .robots
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("配置中没有机器人"))?;

        Ok(Self {
            global: global.clone(),
            config,
            simulator,
            selected,
        })
    }

    /// 启动后台打印线程，只打印运行结果
    pub fn spawn_event_printer(&self) -> Result<thread::JoinHandle<()>> {
        let (observer, events) = ChannelObserver::unbounded();
        self.simulator.add_observer(Arc::new(observer));
        thread::Builder::new()
            .name("robosim-repl-events".to_string())
            .spawn(move || {
                let mut printer = EventPrinter::new(0);
                // 模拟器释放后通道断开，线程退出
                for event in events.iter() {
                    printer.print(&event);
                }
            })
            .context("启动事件打印线程失败")
    }

    /// 连接遥测后端
    pub fn connect(&mut self) -> Result<()> {
        if self.simulator.sink_ready() {
            println!("⚠️  已经连接");
            return Ok(());
        }

        println!("⏳ 连接遥测后端 ({:?})...", self.global.sink);
        let sink = build_sink(&self.global, &self.config)?;
        self.simulator.set_sink(sink);
        println!("✅ 已连接");
        Ok(())
    }

    /// 断开遥测后端（正在进行的运行继续，但不再发布）
    pub fn disconnect(&mut self) -> Result<()> {
        match self.simulator.clear_sink() {
            Some(sink) => println!("✅ 已断开 {}", sink.name()),
            None => println!("⚠️  未连接"),
        }
        Ok(())
    }

    /// 选择当前机器人
    pub fn select(&mut self, id: &str) -> Result<()> {
        let robot = RobotId::new(id)?;
        if !self.simulator.robots().contains(&robot) {
            anyhow::bail!("未知机器人: {}", robot);
        }
        println!("✅ 当前机器人: {}", robot);
        self.selected = robot;
        Ok(())
    }

    /// 获取会话状态描述
    pub fn status(&self) -> String {
        let connection = if self.simulator.sink_ready() {
            "已连接"
        } else {
            "未连接"
        };
        let runs = self.simulator.active_runs();
        format!(
            "{}，当前机器人 {}，活动运行 {} 个",
            connection,
            self.selected,
            runs.len()
        )
    }

    pub fn selected(&self) -> &RobotId {
        &self.selected
    }

    pub fn simulator(&self) -> &Arc<Simulator> {
        &self.simulator
    }
}

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        // 在专用线程内创建 Editor（生命周期 = REPL 会话）
        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;

            let history_path = ".robosim_history";
            rl.load_history(history_path).ok(); // 首次运行没有历史文件

            println!("Robosim CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
            println!("输入 'help' 查看帮助，'exit' 退出");
            println!();

            loop {
                match rl.readline("robosim> ") {
                    Ok(line) => {
                        let line: String = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        if line == "exit" || line == "quit" {
                            rl.save_history(history_path).ok();
                            let _ = command_tx.send(line);
                            break;
                        }

                        let _ = rl.add_history_entry(line.clone());

                        if command_tx.send(line).is_err() {
                            break; // 主线程已退出
                        }
                    },
                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        // Ctrl+C：在主线程停止所有运行
                        println!("^C");
                        let _ = command_tx.send("SIGINT".to_string());
                    },
                    Err(rustyline::error::ReadlineError::Eof) => {
                        rl.save_history(history_path).ok();
                        let _ = command_tx.send("exit".to_string());
                        break;
                    },
                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }

    /// 阻塞等待用户输入，输入线程退出后返回 `None`
    pub fn recv_command(&self) -> Option<String> {
        self.command_rx.recv().ok()
    }
}

/// 运行 REPL 模式
pub fn run_repl(global: &GlobalArgs) -> Result<()> {
    let mut session = ReplSession::new(global)?;
    let _printer = session.spawn_event_printer()?;
    let input = ReplInput::new();

    println!();
    println!("💡 提示: 使用 'connect' 连接遥测后端，然后 'move 10,5' 开始运动");
    println!();

    while let Some(line) = input.recv_command() {
        if line == "SIGINT" {
            let stopped = session.simulator().stop_all();
            eprintln!("\n🛑 已停止 {} 个运行", stopped);
            continue;
        }

        match line.as_str() {
            "exit" | "quit" => {
                println!("👋 再见！");
                break;
            },
            "help" => {
                print_help();
            },
            "status" => {
                println!("📊 状态: {}", session.status());
            },
            _ => {
                // 错误隔离：命令 panic 不终止 REPL
                match panic::catch_unwind(panic::AssertUnwindSafe(|| {
                    handle_command(&line, &mut session)
                })) {
                    Ok(Ok(())) => {},
                    Ok(Err(err)) => {
                        eprintln!("❌ Error: {}", err);
                        print_help_hint(&line);
                    },
                    Err(panic_err) => {
                        eprintln!("❌ Command panicked: {:?}", panic_err);
                    },
                }
            },
        }
    }

    session.simulator().shutdown();
    Ok(())
}

/// 处理命令
fn handle_command(line: &str, session: &mut ReplSession) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(());
    }

    match parts[0] {
        "connect" => {
            session.connect()?;
        },
        "disconnect" => {
            session.disconnect()?;
        },
        "robots" => {
            handle_robots(session);
        },
        "select" => {
            let id = parts.get(1).ok_or_else(|| anyhow::anyhow!("缺少机器人标识"))?;
            session.select(id)?;
        },
        "show" => {
            handle_show(session, parts.get(1).copied())?;
        },
        "move" => {
            handle_move(session, &parts)?;
        },
        "status" => {
            handle_status(session, &parts)?;
        },
        "battery" => {
            let level: u32 = parts
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("缺少电量"))?
                .parse()
                .context("电量必须是 0-100 的整数")?;
            let status = session.simulator().set_battery(session.selected(), level)?;
            println!("✅ {} 电量: {}%", session.selected(), status.battery_level);
        },
        "role" => {
            let role: Role = parts
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("缺少角色"))?
                .parse()?;
            session.simulator().set_role(session.selected(), role)?;
            println!("✅ {} 角色: {}", session.selected(), role);
        },
        "op" => {
            let status: OperationalStatus = parts
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("缺少运行状态"))?
                .parse()?;
            session
                .simulator()
                .set_operational_status(session.selected(), status)?;
            println!("✅ {} 运行状态: {}", session.selected(), status);
        },
        "stop" => {
            handle_stop(session, parts.get(1).copied())?;
        },
        "metrics" => {
            handle_metrics(session, parts.get(1).copied())?;
        },
        _ => {
            anyhow::bail!("未知命令: {}", parts[0]);
        },
    }

    Ok(())
}

/// 取 `--flag value` 形式的参数值
fn flag_value<'a>(parts: &[&'a str], flag: &str) -> Option<&'a str> {
    parts
        .iter()
        .position(|&s| s == flag)
        .and_then(|idx| parts.get(idx + 1))
        .copied()
}

/// 处理 move 命令：`move <x,y> [--start x,y] [--speed v] [--interval s]`
fn handle_move(session: &ReplSession, parts: &[&str]) -> Result<()> {
    let end = parts
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .ok_or_else(|| anyhow::anyhow!("缺少终点坐标"))?;
    let end = parse_point(end)?;

    let speed = match flag_value(parts, "--speed") {
        Some(v) => v.parse::<f64>().context("无效的速度")?,
        None => session.config.motion.speed,
    };
    let interval = match flag_value(parts, "--interval") {
        Some(v) => parse_secs(v.parse::<f64>().context("无效的周期")?)?,
        None => session.config.motion_interval()?,
    };

    let mut request = MotionRequest::new(session.selected().clone(), end)
        .speed(speed)
        .interval(interval);
    if let Some(start) = flag_value(parts, "--start") {
        request = request.start(parse_point(start)?);
    }

    let handle = session.simulator().start_motion(request)?;
    println!(
        "⏳ {} 开始运动 → ({:.2}, {:.2})（运行 #{}）",
        handle.robot(),
        end.x,
        end.y,
        handle.run_id()
    );
    Ok(())
}

/// 处理 status 命令：`status on [秒]` / `status off`
fn handle_status(session: &ReplSession, parts: &[&str]) -> Result<()> {
    let robot = session.selected();
    match parts.get(1).copied() {
        Some("on") => {
            let interval = match parts.get(2) {
                Some(v) => parse_secs(v.parse::<f64>().context("无效的周期")?)?,
                None => session.config.status_interval()?,
            };
            let handle = session.simulator().start_status(robot, interval)?;
            println!(
                "✅ {} 开始发布状态，每 {:?}（运行 #{}）",
                robot,
                interval,
                handle.run_id()
            );
        },
        Some("off") => {
            if session.simulator().stop_status(robot) {
                println!("✅ {} 状态发布停止中", robot);
            } else {
                println!("⚠️  {} 没有状态发布", robot);
            }
        },
        Some(other) => anyhow::bail!("未知的 status 子命令: {}", other),
        None => println!("📊 状态: {}", session.status()),
    }
    Ok(())
}

/// 处理 stop 命令：`stop [motion|status|all]`
fn handle_stop(session: &ReplSession, target: Option<&str>) -> Result<()> {
    let simulator = session.simulator();
    let robot = session.selected();
    match target {
        None => {
            if simulator.stop(robot) {
                println!("🛑 {} 停止中", robot);
            } else {
                println!("⚠️  {} 没有活动运行", robot);
            }
        },
        Some("motion") => {
            if simulator.stop_motion(robot) {
                println!("🛑 {} 运动停止中", robot);
            } else {
                println!("⚠️  {} 没有运动", robot);
            }
        },
        Some("status") => {
            if simulator.stop_status(robot) {
                println!("🛑 {} 状态发布停止中", robot);
            } else {
                println!("⚠️  {} 没有状态发布", robot);
            }
        },
        Some("all") => {
            let stopped = simulator.stop_all();
            println!("🛑 已停止 {} 个运行", stopped);
        },
        Some(other) => anyhow::bail!("未知的停止目标: {}", other),
    }
    Ok(())
}

/// 列出所有机器人
fn handle_robots(session: &ReplSession) {
    let simulator = session.simulator();
    let active = simulator.active_runs();
    println!("🤖 机器人:");
    for (id, record) in simulator.registry().snapshot() {
        let marker = if id == *session.selected() { "*" } else { " " };
        let runs: Vec<String> = [RunKind::Motion, RunKind::Status]
            .into_iter()
            .filter(|kind| active.contains(&(id.clone(), *kind)))
            .map(|kind| kind.to_string())
            .collect();
        println!(
            " {} {}  {}  电量 {}%  {} / {}  {}",
            marker,
            id,
            record.position,
            record.status.battery_level,
            record.status.role,
            record.status.operational_status,
            if runs.is_empty() {
                "-".to_string()
            } else {
                runs.join(",")
            }
        );
    }
}

/// 显示机器人记录
fn handle_show(session: &ReplSession, id: Option<&str>) -> Result<()> {
    let robot = match id {
        Some(id) => RobotId::new(id)?,
        None => session.selected().clone(),
    };
    let record = session.simulator().record(&robot)?;
    println!("📍 {}", robot);
    println!("  位置: {}", record.position);
    println!("  电量: {}%", record.status.battery_level);
    println!("  角色: {}", record.status.role);
    println!("  运行状态: {}", record.status.operational_status);
    Ok(())
}

/// 显示或重置统计
fn handle_metrics(session: &ReplSession, arg: Option<&str>) -> Result<()> {
    match arg {
        Some("reset") => {
            session.simulator().reset_metrics();
            println!("✅ 统计已重置");
        },
        Some(other) => anyhow::bail!("未知的 metrics 参数: {}", other),
        None => {
            let m = session.simulator().metrics();
            println!("📊 统计:");
            println!("  位置样本: {}", m.position_samples);
            println!("  状态样本: {}", m.status_samples);
            println!(
                "  发布失败: {} ({:.1}%)",
                m.publish_failures,
                m.publish_failure_rate() * 100.0
            );
            println!(
                "  运行: 启动 {}，完成 {}，取消 {}，原地 {}",
                m.runs_started, m.runs_completed, m.runs_cancelled, m.runs_degenerate
            );
        },
    }
    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("可用命令:");
    println!("  connect                       连接遥测后端（--sink 指定类型）");
    println!("  disconnect                    断开遥测后端");
    println!("  robots                        列出所有机器人");
    println!("  select <ID>                   选择当前机器人");
    println!("  show [ID]                     显示机器人位置与状态");
    println!("  move <x,y> [--start x,y] [--speed v] [--interval s]");
    println!("                                运动到目标点");
    println!("  status on [秒]                开始周期发布状态（需要先 connect）");
    println!("  status off                    停止发布状态");
    println!("  battery <0-100>               修改电量");
    println!("  role <ROLE>                   修改角色（EMPTY, CLEANING, HARVESTING, ...）");
    println!("  op <STATUS>                   修改运行状态（IDLE, WORKING, CHARGING, ...）");
    println!("  stop [motion|status|all]      停止运行（默认当前机器人的全部运行）");
    println!("  metrics [reset]               显示或重置统计");
    println!("  status                        显示会话状态");
    println!("  help                          显示帮助");
    println!("  exit / quit                   退出");
    println!();
    println!("快捷键:");
    println!("  Ctrl+C                        停止所有运行");
    println!("  Ctrl+D                        退出");
    println!();
}

/// 提供基于错误的帮助提示
fn print_help_hint(command: &str) {
    if command.starts_with("move") {
        eprintln!("💡 提示: 使用 'move 100,50 --speed 1.0' 运动到目标点");
    } else if command.starts_with("status") {
        eprintln!("💡 提示: 先使用 'connect' 连接遥测后端，再 'status on'");
    } else if command.starts_with("battery") {
        eprintln!("💡 提示: 电量范围 0-100，例如 'battery 42'");
    } else if command.starts_with("role") || command.starts_with("op") {
        eprintln!("💡 提示: 使用 'help' 查看可用的角色和运行状态");
    } else {
        eprintln!("💡 提示: 输入 'help' 查看可用命令");
    }
}
