//! 公共工具
//!
//! 全局参数、配置路径、后端与模拟器的构造，以及终端输出辅助函数

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use robosim_driver::{
    MotionOutcome, Position, RunEvent, RunReport, SimulatedClock, Simulator, SystemClock,
    TelemetrySink,
};
use robosim_protocol::RobotId;
use robosim_sink::{JsonLinesSink, LogSink};
use robosim_tools::{CONFIG_FILE_NAME, SimConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// 全局参数（所有子命令共享）
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// 配置文件路径（默认：<系统配置目录>/robosim/config.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 遥测输出后端
    #[arg(long, value_enum, global = true, default_value_t = SinkKind::Log)]
    pub sink: SinkKind,

    /// jsonl 后端的输出文件（`-` 表示标准输出）
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// 使用模拟时钟（不真实等待，立即跑完）
    #[arg(long, global = true)]
    pub simulated: bool,
}

/// 遥测输出后端
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// 通过日志打印
    Log,
    /// 写入 JSON Lines 文件
    Jsonl,
    /// 发布到 MQTT 代理（需要 `mqtt` feature）
    Mqtt,
}

impl GlobalArgs {
    /// 配置文件路径
    pub fn config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config {
            return Ok(path.clone());
        }
        let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
        path.push("robosim");
        path.push(CONFIG_FILE_NAME);
        Ok(path)
    }

    /// 加载配置（文件不存在时使用默认配置）
    pub fn load_config(&self) -> Result<SimConfig> {
        let path = self.config_path()?;
        SimConfig::load_or_default(&path)
            .with_context(|| format!("加载配置文件失败: {}", path.display()))
    }
}

/// 按全局参数创建遥测后端
pub fn build_sink(global: &GlobalArgs, config: &SimConfig) -> Result<Arc<dyn TelemetrySink>> {
    match global.sink {
        SinkKind::Log => Ok(Arc::new(LogSink::new())),
        SinkKind::Jsonl => {
            let output = global
                .output
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("jsonl 后端需要 --output 参数"))?;
            if output == Path::new("-") {
                return Ok(Arc::new(JsonLinesSink::new(std::io::stdout())));
            }
            let sink = JsonLinesSink::create(output)
                .with_context(|| format!("创建输出文件失败: {}", output.display()))?;
            Ok(Arc::new(sink))
        },
        SinkKind::Mqtt => connect_mqtt(config),
    }
}

#[cfg(feature = "mqtt")]
fn connect_mqtt(config: &SimConfig) -> Result<Arc<dyn TelemetrySink>> {
    use robosim_sink::{MqttSink, MqttSinkConfig};

    let sink_config = MqttSinkConfig {
        host: config.broker.host.clone(),
        port: config.broker.port,
        client_id: config.broker.client_id.clone(),
        keep_alive: Duration::from_secs(config.broker.keep_alive_secs),
        ..MqttSinkConfig::default()
    };
    println!("⏳ 连接到 MQTT 代理 {}...", config.broker.address());
    let sink = MqttSink::connect(&sink_config)?;
    if sink.wait_connected(Duration::from_secs(5)) {
        println!("✅ 已连接");
    } else {
        println!("⚠️  暂未连接到 {}，后台会继续重试", sink.broker());
    }
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "mqtt"))]
fn connect_mqtt(_config: &SimConfig) -> Result<Arc<dyn TelemetrySink>> {
    anyhow::bail!("该版本未启用 MQTT 支持，请使用 `--features mqtt` 重新编译")
}

/// 按配置创建模拟器
///
/// 每个机器人的初始位置取配置中的运动起点。`sink` 为 `None` 时处于未连接状态。
pub fn build_simulator(
    global: &GlobalArgs,
    config: &SimConfig,
    sink: Option<Arc<dyn TelemetrySink>>,
) -> Result<Simulator> {
    let start = config.motion.start.to_position()?;
    let mut builder = Simulator::builder()
        .robots(config.robots.iter().cloned())
        .default_status(config.initial_status()?);
    if let Some(sink) = sink {
        builder = builder.shared_sink(sink);
    }
    for id in &config.robots {
        builder = builder.initial_position(id.clone(), start);
    }
    builder = if global.simulated {
        builder.clock(Arc::new(SimulatedClock::starting_now()))
    } else {
        builder.clock(Arc::new(SystemClock))
    };
    Ok(builder.build()?)
}

/// 选择机器人：未指定时取配置中的第一个
pub fn pick_robot(config: &SimConfig, robot: Option<&str>) -> Result<RobotId> {
    match robot {
        Some(id) => Ok(RobotId::new(id)?),
        None => config
            .robots
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("配置中没有机器人")),
    }
}

/// 解析平面坐标 `x,y`
pub fn parse_point(input: &str) -> Result<Position> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        anyhow::bail!("坐标格式应为 x,y，得到 '{}'", input);
    }
    let x: f64 = parts[0]
        .parse()
        .with_context(|| format!("无效的 x 坐标: '{}'", parts[0]))?;
    let y: f64 = parts[1]
        .parse()
        .with_context(|| format!("无效的 y 坐标: '{}'", parts[1]))?;
    Ok(Position::new(x, y, 0.0)?)
}

/// 解析秒数（必须为有限正数）
pub fn parse_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        anyhow::bail!("周期必须大于 0 秒，得到 {}", secs);
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("周期超出范围: {}", secs))
}

/// 安装 Ctrl+C 处理：停止所有运行，运行线程自行收尾
pub fn install_ctrlc(simulator: &Arc<Simulator>) -> Result<()> {
    let simulator = Arc::downgrade(simulator);
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 收到 Ctrl+C，停止所有运行...");
        if let Some(simulator) = simulator.upgrade() {
            simulator.stop_all();
        }
    })
    .context("安装 Ctrl+C 处理失败")
}

/// 终端事件打印
///
/// 位置样本和状态样本每 `every` 条打印一次，最后一个位置样本和结束事件总会打印；
/// `every == 0` 时只打印结束事件。
#[derive(Debug)]
pub struct EventPrinter {
    every: u64,
    positions: u64,
}

impl EventPrinter {
    pub fn new(every: u64) -> Self {
        Self {
            every,
            positions: 0,
        }
    }

    pub fn print(&mut self, event: &RunEvent) {
        match event {
            RunEvent::PositionSample {
                robot,
                x,
                y,
                progress,
            } => {
                self.positions += 1;
                let is_last = *progress >= 100.0;
                if self.every > 0 && ((self.positions - 1) % self.every == 0 || is_last) {
                    println!("📍 {} X: {:.2}, Y: {:.2} ({:.1}%)", robot, x, y, progress);
                }
            },
            RunEvent::StatusSample { robot, emitted } => {
                if self.every > 0 && emitted % self.every == 0 {
                    println!("🔋 {} 已发布 {} 条状态", robot, emitted);
                }
            },
            RunEvent::Finished { robot, report } => {
                if let RunReport::Motion(_) = report {
                    self.positions = 0;
                }
                print_report(robot, report);
            },
        }
    }
}

/// 打印运行结果
pub fn print_report(robot: &RobotId, report: &RunReport) {
    match report {
        RunReport::Motion(outcome) => {
            let position = outcome.position();
            match outcome {
                MotionOutcome::Completed { samples, .. } => println!(
                    "✅ {} 到达终点 ({:.2}, {:.2})，共 {} 个位置样本",
                    robot, position.x, position.y, samples
                ),
                MotionOutcome::Cancelled { samples, .. } => println!(
                    "⚠️  {} 运动已停止于 ({:.2}, {:.2})，共 {} 个位置样本",
                    robot, position.x, position.y, samples
                ),
                MotionOutcome::Degenerate { .. } => println!(
                    "⚠️  {} 起点与终点重合 ({:.2}, {:.2})，未发布位置",
                    robot, position.x, position.y
                ),
            }
        },
        RunReport::Status(outcome) => {
            println!(
                "✅ {} 状态发布已停止，共 {} 条（电量 {}%，{} / {}）",
                robot,
                outcome.emitted,
                outcome.last_status.battery_level,
                outcome.last_status.role,
                outcome.last_status.operational_status
            );
        },
    }
}
