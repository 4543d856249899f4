//! Compose Update Agent - 自托管部署代理
//!
//! Usage:
//! - Default config dir: `compose-update-agent`
//! - Custom config dir: `compose-update-agent /etc/compose-update-agent`
//! - With custom port: `compose-update-agent --port 8080 /etc/compose-update-agent`

use std::path::PathBuf;

use compose_update_agent::RuntimeConfig;
use tracing_subscriber::EnvFilter;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other if !other.starts_with('-') => {
                // 第一个位置参数是配置目录
                config.config_dir = PathBuf::from(other);
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Compose Update Agent - 自托管部署代理");
    println!();
    println!("USAGE:");
    println!("    compose-update-agent [OPTIONS] [CONFIG_DIR]");
    println!();
    println!("ARGS:");
    println!("    <CONFIG_DIR>     Directory holding source_location, source_server,");
    println!("                     source_password and orchestrator_password [default: config]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port (env PORT, default 1337)");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    COMPOSE_COMMAND               Compose invocation, e.g. docker-compose");
    println!("    COMPOSE_TIMEOUT_SECS          Timeout for each docker command (0 = none)");
    println!("    SOURCE_CONNECT_TIMEOUT_SECS   Connect timeout for the source server");
    println!("    RUST_LOG                      Log filter (default info)");
}

fn main() {
    let config = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(compose_update_agent::init_and_run_agent_with_config(config)) {
        tracing::error!(error = %e, "Update agent exited with error");
        std::process::exit(1);
    }
}
