//! Compose Update Agent - 自托管部署代理
//!
//! 收到带密钥的触发请求后，拉取最新的发布归档，替换部署目录，
//! 然后重建并重启容器栈。

pub mod error;
pub mod middleware;
pub mod infra;
pub mod domain;
pub mod config;
pub mod state;
pub mod api;
pub mod services;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::env::constants::{DEFAULT_CONFIG_DIR, VERSION};
use crate::config::{CredentialStore, EnvConfig};
use crate::infra::SourceServerClient;
use crate::services::{
    ArchiveFetcher, ComposeCommand, ComposeStackController, UpdateCoordinator,
};
use crate::state::AppState;

/// 命令行覆盖的运行时配置
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// 凭据目录
    pub config_dir: PathBuf,
    /// 覆盖监听端口
    pub port_override: Option<u16>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            port_override: None,
        }
    }
}

/// 初始化并运行 agent，直到收到关闭信号
pub async fn init_and_run_agent_with_config(
    runtime: RuntimeConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env = EnvConfig::from_env();
    let port = runtime.port_override.unwrap_or(env.port);

    // 启动时先校验一次配置目录，缺文件直接退出
    let credentials = CredentialStore::new(&runtime.config_dir);
    let deployment = credentials.load().await?;

    tracing::info!(
        version = VERSION,
        config_dir = %credentials.dir().display(),
        source_location = %deployment.source_location.display(),
        source_server = %deployment.source_server,
        trigger_secret_len = deployment.trigger_secret.len(),
        port,
        command_timeout = ?env.command_timeout,
        "Loaded configuration"
    );

    let compose = match env.compose_command.as_deref().and_then(ComposeCommand::parse) {
        Some(command) => command,
        None => ComposeCommand::detect().await,
    };
    tracing::info!(
        program = %compose.program,
        args = ?compose.base_args,
        "Using compose command"
    );

    let controller = ComposeStackController::new(compose, env.command_timeout);
    let fetcher = ArchiveFetcher::new(SourceServerClient::new(env.connect_timeout)?);
    let coordinator = UpdateCoordinator::new(credentials.clone(), fetcher, Arc::new(controller));
    let state = Arc::new(AppState::new(credentials, coordinator));

    let app = api::router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Update agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let uptime = chrono::Utc::now() - state.started_at;
    tracing::info!(uptime_secs = uptime.num_seconds(), "Update agent stopped");
    Ok(())
}

/// 等待 Ctrl-C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
