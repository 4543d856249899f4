//! 环境变量配置加载

use std::env;
use std::time::Duration;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 服务监听端口
    pub port: u16,
    /// 单次 compose 命令超时（None 表示不限制）
    pub command_timeout: Option<Duration>,
    /// 连接源服务器的超时
    pub connect_timeout: Duration,
    /// 显式指定的 compose 命令（如 `docker-compose`）
    pub compose_command: Option<String>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_PORT);

        let command_timeout = env::var("COMPOSE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let connect_timeout = env::var("SOURCE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(constants::DEFAULT_CONNECT_TIMEOUT_SECS));

        let compose_command = env::var("COMPOSE_COMMAND")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            port,
            command_timeout,
            connect_timeout,
            compose_command,
        }
    }
}

/// 常量
pub mod constants {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 1337;

    /// 连接源服务器的默认超时（秒）
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

    /// 默认配置目录
    pub const DEFAULT_CONFIG_DIR: &str = "config";

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env() {
        env::set_var("PORT", "4242");
        env::set_var("COMPOSE_TIMEOUT_SECS", "0");
        env::set_var("SOURCE_CONNECT_TIMEOUT_SECS", "not-a-number");
        env::set_var("COMPOSE_COMMAND", " docker-compose ");

        let config = EnvConfig::from_env();
        assert_eq!(config.port, 4242);
        assert_eq!(config.command_timeout, None);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.compose_command.as_deref(), Some("docker-compose"));

        env::set_var("COMPOSE_TIMEOUT_SECS", "600");
        env::remove_var("PORT");
        env::remove_var("COMPOSE_COMMAND");

        let config = EnvConfig::from_env();
        assert_eq!(config.port, constants::DEFAULT_PORT);
        assert_eq!(config.command_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.compose_command, None);

        env::remove_var("COMPOSE_TIMEOUT_SECS");
        env::remove_var("SOURCE_CONNECT_TIMEOUT_SECS");
    }
}
