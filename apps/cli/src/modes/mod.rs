//! 运行模式
//!
//! 支持两种模式：
//! - One-shot 模式：每次命令独立创建模拟器，运行结束即退出
//! - REPL 模式：交互式 Shell，模拟器在会话内常驻

pub mod oneshot;
pub mod repl;
