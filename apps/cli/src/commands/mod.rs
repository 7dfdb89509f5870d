//! 命令定义和实现

pub mod config;
pub mod r#move;
pub mod simulate;
pub mod status;

pub use config::ConfigCommand;
pub use r#move::MoveCommand;
pub use simulate::SimulateCommand;
pub use status::StatusCommand;
