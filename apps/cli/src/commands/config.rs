//! 配置管理命令
//!
//! 管理模拟器配置文件（机器人列表、代理地址、运动与状态默认值）

use crate::utils::GlobalArgs;
use anyhow::{Context, Result};
use clap::Subcommand;
use robosim_tools::SimConfig;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写入默认配置文件
    Init {
        /// 覆盖已存在的配置文件
        #[arg(long)]
        force: bool,
    },

    /// 显示当前生效的配置
    Show,

    /// 显示配置文件路径
    Path,

    /// 检查配置文件
    Check,
}

impl ConfigCommand {
    pub fn execute(self, global: &GlobalArgs) -> Result<()> {
        match self {
            ConfigCommand::Init { force } => Self::init_(global, force),
            ConfigCommand::Show => Self::show_(global),
            ConfigCommand::Path => Self::path_(global),
            ConfigCommand::Check => Self::check_(global),
        }
    }

    fn init_(global: &GlobalArgs, force: bool) -> Result<()> {
        let path = global.config_path()?;
        if path.exists() && !force {
            anyhow::bail!(
                "配置文件已存在: {}（使用 --force 覆盖）",
                path.display()
            );
        }

        SimConfig::default()
            .save(&path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;

        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }

    fn show_(global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        println!("{}", config.to_toml_string()?);
        Ok(())
    }

    fn path_(global: &GlobalArgs) -> Result<()> {
        println!("{}", global.config_path()?.display());
        Ok(())
    }

    fn check_(global: &GlobalArgs) -> Result<()> {
        let path = global.config_path()?;

        println!("🔍 检查配置: {}", path.display());
        if !path.exists() {
            println!("⚠️  配置文件不存在，将使用默认配置");
            return Ok(());
        }

        let config = SimConfig::load(&path)
            .with_context(|| format!("配置文件无效: {}", path.display()))?;

        let robots: Vec<&str> = config.robots.iter().map(|id| id.as_str()).collect();
        println!("✅ 配置有效");
        println!("  机器人: {}", robots.join(", "));
        println!("  代理: {}", config.broker.address());
        println!(
            "  运动: ({}, {}) → ({}, {})，{} m/s，每 {} s",
            config.motion.start.x,
            config.motion.start.y,
            config.motion.end.x,
            config.motion.end.y,
            config.motion.speed,
            config.motion.interval_secs
        );
        println!(
            "  状态: 电量 {}%，{} / {}，每 {} s",
            config.status.battery_level,
            config.status.role,
            config.status.operational_status,
            config.status.interval_secs
        );
        Ok(())
    }
}
