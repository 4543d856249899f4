//! 命令执行器
//!
//! 提供统一的外部命令执行接口：
//! - 合并 stdout/stderr 作为诊断输出
//! - 可选超时控制

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// 命令执行器
pub struct CommandRunner;

/// 命令执行错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 命令启动失败
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 命令超时
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// 命令执行结果
#[derive(Debug)]
pub struct CommandOutput {
    /// 退出状态
    pub status: ExitStatus,
    /// stdout 与 stderr 合并后的输出
    pub combined: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// 退出码（被信号终止时为 None）
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

impl CommandRunner {
    /// 执行命令直到结束，收集合并输出
    ///
    /// `timeout` 为 None 时一直等待；超时后子进程会被 kill
    pub async fn run_simple(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        let output = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, output).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(CommandError::Timeout {
                        program: program.to_string(),
                        timeout: limit,
                    })
                }
            },
            None => output.await,
        };

        let output = result.map_err(|source| CommandError::SpawnFailed {
            program: program.to_string(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            status: output.status,
            combined,
        })
    }
}
