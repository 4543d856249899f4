//! 凭据目录加载
//!
//! 配置目录中包含四个纯文本文件，每次更新都会重新读取，
//! 因此轮换密钥无需重启 agent。

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;

/// 部署目录路径
pub const SOURCE_LOCATION_FILE: &str = "source_location";
/// 源服务器地址
pub const SOURCE_SERVER_FILE: &str = "source_server";
/// 源服务器密钥
pub const SOURCE_PASSWORD_FILE: &str = "source_password";
/// 触发密钥
pub const TRIGGER_PASSWORD_FILE: &str = "orchestrator_password";

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is empty", path.display())]
    Empty { path: PathBuf },

    /// 部署目录每次更新都会被整体删除，不允许是 `/`、`.` 这类路径
    #[error("refusing to use {} as the deployment directory", path.display())]
    UnsafeLocation { path: PathBuf },
}

/// 单次加载得到的部署配置，加载后不再修改
#[derive(Clone)]
pub struct DeploymentConfig {
    /// 部署目录（Deployment Tree）
    pub source_location: PathBuf,
    /// 源服务器地址
    pub source_server: String,
    /// 拉取归档时携带的密钥
    pub source_password: String,
    /// 触发接口的密钥
    pub trigger_secret: String,
}

impl DeploymentConfig {
    /// 拉取归档的完整 URL
    ///
    /// 未带 scheme 的地址默认走 http
    pub fn source_url(&self) -> String {
        if self.source_server.starts_with("http://") || self.source_server.starts_with("https://")
        {
            self.source_server.clone()
        } else {
            format!("http://{}", self.source_server)
        }
    }
}

impl fmt::Debug for DeploymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentConfig")
            .field("source_location", &self.source_location)
            .field("source_server", &self.source_server)
            .field("source_password", &"[REDACTED]")
            .field("trigger_secret", &"[REDACTED]")
            .finish()
    }
}

/// 凭据存储（配置目录）
#[derive(Clone, Debug)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 读取全部四项配置
    pub async fn load(&self) -> Result<DeploymentConfig, ConfigError> {
        let source_location = self.read_required(SOURCE_LOCATION_FILE).await?;
        let source_server = self.read_required(SOURCE_SERVER_FILE).await?;
        let source_password = self.read_value(SOURCE_PASSWORD_FILE).await?;
        let trigger_secret = self.read_required(TRIGGER_PASSWORD_FILE).await?;

        let source_location = PathBuf::from(source_location);
        // `..` 可能让路径退回到 `/`，直接拒绝
        let has_name = source_location
            .components()
            .any(|c| matches!(c, Component::Normal(_)));
        let climbs = source_location
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if !has_name || climbs {
            return Err(ConfigError::UnsafeLocation {
                path: source_location,
            });
        }

        Ok(DeploymentConfig {
            source_location,
            source_server,
            source_password,
            trigger_secret,
        })
    }

    /// 只读取触发密钥（每个请求鉴权时调用）
    pub async fn load_trigger_secret(&self) -> Result<String, ConfigError> {
        self.read_required(TRIGGER_PASSWORD_FILE).await
    }

    async fn read_value(&self, name: &str) -> Result<String, ConfigError> {
        let path = self.dir.join(name);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content.trim().to_string()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    async fn read_required(&self, name: &str) -> Result<String, ConfigError> {
        let value = self.read_value(name).await?;
        if value.is_empty() {
            return Err(ConfigError::Empty {
                path: self.dir.join(name),
            });
        }
        Ok(value)
    }
}
