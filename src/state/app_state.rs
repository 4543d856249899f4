//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::CredentialStore;
use crate::services::UpdateCoordinator;

/// 应用状态
pub struct AppState {
    /// 凭据目录（鉴权时读取触发密钥）
    pub credentials: CredentialStore,
    /// 更新协调器
    pub coordinator: Arc<UpdateCoordinator>,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(credentials: CredentialStore, coordinator: UpdateCoordinator) -> Self {
        Self {
            credentials,
            coordinator: Arc::new(coordinator),
            started_at: Utc::now(),
        }
    }
}
