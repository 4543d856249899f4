//! 配置模块
//!
//! 环境变量与凭据目录

pub mod env;
pub mod credentials;

pub use env::EnvConfig;
pub use credentials::{ConfigError, CredentialStore, DeploymentConfig};
