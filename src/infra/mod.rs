//! 基础设施模块
//!
//! 封装外部依赖（HTTP client、命令执行等）

pub mod command;
pub mod source_server;

pub use command::{CommandError, CommandOutput, CommandRunner};
pub use source_server::{SourceError, SourceServerClient};
