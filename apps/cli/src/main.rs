//! # Robosim CLI
//!
//! Command-line interface for the robosim telemetry simulator.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于 CI/脚本）
//!
//! ```bash
//! # 生成默认配置
//! robosim-cli config init
//!
//! # 让 ROBOT-001 从原点走到 (100, 50)，结果写入 JSON Lines 文件
//! robosim-cli --sink jsonl --output telemetry.jsonl move --robot ROBOT-001 --end 100,50
//!
//! # 发布 5 条状态后退出
//! robosim-cli status --robot ROBOT-002 --battery 50 --count 5
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ robosim-cli shell
//! robosim> select ROBOT-001
//! robosim> move 10,5
//! robosim> status start
//! robosim> battery 42
//! robosim> stop
//! robosim> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod modes;
mod utils;

use commands::{ConfigCommand, MoveCommand, SimulateCommand, StatusCommand};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;
use utils::GlobalArgs;

/// Robosim CLI - 移动机器人遥测模拟器
#[derive(Parser, Debug)]
#[command(name = "robosim-cli")]
#[command(about = "Command-line interface for the robosim telemetry simulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 模拟一次直线运动
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 周期发布机器人状态
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 运动与状态发布同时进行
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell,
}

fn main() -> Result<()> {
    // 日志输出到 stderr，stdout 留给命令输出
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("robosim_cli=info".parse()?)
                .add_directive("robosim_driver=info".parse()?)
                .add_directive("robosim::telemetry=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => {
            // One-shot 模式：配置管理
            cmd.execute(&cli.global)
        },

        Commands::Move { args } => {
            // One-shot 模式：运动模拟
            let mode = OneShotMode::new(&cli.global)?;
            mode.move_to(args)
        },

        Commands::Status { args } => {
            // One-shot 模式：状态发布
            let mode = OneShotMode::new(&cli.global)?;
            mode.publish_status(args)
        },

        Commands::Simulate { args } => {
            // One-shot 模式：运动 + 状态
            let mode = OneShotMode::new(&cli.global)?;
            mode.simulate(args)
        },

        Commands::Shell => {
            // REPL 模式：交互式 Shell
            run_repl(&cli.global)
        },
    }
}
