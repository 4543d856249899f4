//! Container stack control
//!
//! Rebuilds/restarts the compose stack and prunes dangling images, always with
//! the deployment tree as working directory.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::infra::{CommandError, CommandRunner};

/// Stack operation error
#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("`{command}` exited with {}: {output}", describe_exit(.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// The two operations the update sequence needs from the container tooling
#[async_trait]
pub trait StackController: Send + Sync {
    /// Rebuild images and force-recreate every service, detached
    async fn rebuild_and_restart(&self, work_dir: &Path) -> Result<(), StackError>;

    /// Remove dangling images left behind by previous builds
    async fn prune_unused(&self, work_dir: &Path) -> Result<(), StackError>;
}

/// Compose invocation, e.g. `docker compose` or `docker-compose`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeCommand {
    pub program: String,
    pub base_args: Vec<String>,
}

impl ComposeCommand {
    pub fn new(program: impl Into<String>, base_args: &[&str]) -> Self {
        Self {
            program: program.into(),
            base_args: base_args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Parse a whitespace separated override such as `docker-compose`
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: program.to_string(),
            base_args: parts.map(str::to_string).collect(),
        })
    }

    /// Detect which compose command is installed (prefer the docker plugin)
    pub async fn detect() -> Self {
        let plugin = Self::new("docker", &["compose"]);
        let standalone = Self::new("docker-compose", &[]);

        for candidate in [&plugin, &standalone] {
            let mut args: Vec<&str> = candidate.base_args.iter().map(String::as_str).collect();
            args.push("version");
            let probe = CommandRunner::run_simple(
                &candidate.program,
                &args,
                Path::new("."),
                Some(Duration::from_secs(10)),
            )
            .await;
            if probe.map(|o| o.success()).unwrap_or(false) {
                return candidate.clone();
            }
        }

        plugin
    }

    fn with_args(&self, extra: &[&str]) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(extra.iter().map(|a| a.to_string()));
        args
    }
}

fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Arguments appended to the compose command for a rebuild
pub const REBUILD_ARGS: [&str; 4] = ["up", "--force-recreate", "--build", "-d"];
/// `docker image prune -f`
pub const PRUNE_ARGS: [&str; 3] = ["image", "prune", "-f"];

/// Stack controller backed by the docker CLI
pub struct ComposeStackController {
    compose: ComposeCommand,
    docker_program: String,
    timeout: Option<Duration>,
}

impl ComposeStackController {
    pub fn new(compose: ComposeCommand, timeout: Option<Duration>) -> Self {
        Self {
            compose,
            docker_program: "docker".to_string(),
            timeout,
        }
    }

    /// Use a different binary for `image prune`
    #[cfg(test)]
    pub(crate) fn with_docker_program(mut self, program: impl Into<String>) -> Self {
        self.docker_program = program.into();
        self
    }

    async fn run(&self, program: &str, args: &[String], work_dir: &Path) -> Result<(), StackError> {
        let command = render_command(program, args);
        info!(command = %command, work_dir = %work_dir.display(), "Running stack command");

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = CommandRunner::run_simple(program, &arg_refs, work_dir, self.timeout).await?;

        if !output.success() {
            return Err(StackError::Failed {
                command,
                exit_code: output.code(),
                output: output.combined,
            });
        }

        debug!(command = %command, output = %output.combined, "Stack command finished");
        Ok(())
    }
}

#[async_trait]
impl StackController for ComposeStackController {
    async fn rebuild_and_restart(&self, work_dir: &Path) -> Result<(), StackError> {
        let args = self.compose.with_args(&REBUILD_ARGS);
        self.run(&self.compose.program, &args, work_dir).await
    }

    async fn prune_unused(&self, work_dir: &Path) -> Result<(), StackError> {
        let args: Vec<String> = PRUNE_ARGS.iter().map(|a| a.to_string()).collect();
        self.run(&self.docker_program, &args, work_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compose_override() {
        assert_eq!(
            ComposeCommand::parse("docker-compose"),
            Some(ComposeCommand::new("docker-compose", &[]))
        );
        assert_eq!(
            ComposeCommand::parse(" podman  compose "),
            Some(ComposeCommand::new("podman", &["compose"]))
        );
        assert_eq!(ComposeCommand::parse("   "), None);
    }

    #[test]
    fn test_rebuild_args() {
        let compose = ComposeCommand::new("docker", &["compose"]);
        let args = compose.with_args(&REBUILD_ARGS);
        assert_eq!(
            render_command(&compose.program, &args),
            "docker compose up --force-recreate --build -d"
        );
    }

    #[tokio::test]
    async fn test_rebuild_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        // $1.. 是追加的 up 参数；把它们写到当前目录下
        let compose = ComposeCommand::new("sh", &["-c", "echo \"$@\" > invoked", "compose"]);
        let controller = ComposeStackController::new(compose, None);

        controller.rebuild_and_restart(dir.path()).await.unwrap();

        let invoked = std::fs::read_to_string(dir.path().join("invoked")).unwrap();
        assert_eq!(invoked.trim(), "up --force-recreate --build -d");
    }

    #[tokio::test]
    async fn test_rebuild_failure_carries_output() {
        let dir = tempfile::tempdir().unwrap();
        let compose = ComposeCommand::new("sh", &["-c", "echo no such file >&2; exit 1", "compose"]);
        let controller = ComposeStackController::new(compose, None);

        let err = controller.rebuild_and_restart(dir.path()).await.unwrap_err();
        match err {
            StackError::Failed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(output.contains("no such file"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_prune_uses_docker_program() {
        let dir = tempfile::tempdir().unwrap();
        let controller = ComposeStackController::new(ComposeCommand::new("true", &[]), None)
            .with_docker_program("false");

        let err = controller.prune_unused(dir.path()).await.unwrap_err();
        assert!(matches!(err, StackError::Failed { ref command, .. } if command == "false image prune -f"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let controller = ComposeStackController::new(
            ComposeCommand::new("nonexistent_compose_12345", &[]),
            None,
        );

        let err = controller.rebuild_and_restart(dir.path()).await.unwrap_err();
        assert!(matches!(err, StackError::Command(CommandError::SpawnFailed { .. })));
    }
}
