//! 更新协调器
//!
//! 串行执行一次完整更新：重新加载配置 → 清空部署目录 → 拉取解包 →
//! 重建并重启 → 清理镜像。同一时刻最多只有一个更新在运行，
//! 第二个请求直接返回 `Busy`，不排队。

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{ConfigError, CredentialStore, DeploymentConfig};
use crate::domain::{UnpackSummary, UpdateReport, UpdateStage};

use super::fetch::{ArchiveFetcher, FetchError};
use super::stack::{StackController, StackError};

/// 更新失败原因
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("an update is already in progress")]
    Busy,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to remove {}: {source}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Deploy(StackError),

    /// 部署本身已经成功，只是镜像清理失败
    #[error(transparent)]
    Prune(StackError),
}

impl UpdateError {
    /// 稳定的错误类别标识
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::Busy => "busy",
            UpdateError::Config(_) => "config_error",
            UpdateError::Clean { .. } => "clean_error",
            UpdateError::Fetch(_) => "fetch_error",
            UpdateError::Deploy(_) => "deploy_error",
            UpdateError::Prune(_) => "prune_error",
        }
    }
}

const STAGE_CLEAN: usize = 0;
const STAGE_FETCH: usize = 1;
const STAGE_REBUILD: usize = 2;
const STAGE_PRUNE: usize = 3;

/// 更新协调器
pub struct UpdateCoordinator {
    store: CredentialStore,
    fetcher: ArchiveFetcher,
    controller: Arc<dyn StackController>,
    /// 更新槽位，持有即表示有更新在运行
    slot: Mutex<()>,
}

impl UpdateCoordinator {
    pub fn new(
        store: CredentialStore,
        fetcher: ArchiveFetcher,
        controller: Arc<dyn StackController>,
    ) -> Self {
        Self {
            store,
            fetcher,
            controller,
            slot: Mutex::new(()),
        }
    }

    /// 是否有更新正在运行（会短暂占用槽位，只在测试里观察状态）
    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// 尝试执行一次更新
    ///
    /// 槽位被占用时立即返回 `Busy`；否则运行到结束，期间任何一步失败都会中止，
    /// 槽位在所有路径上都会释放
    pub async fn attempt_update(&self) -> Result<UpdateReport, UpdateError> {
        let Ok(_slot) = self.slot.try_lock() else {
            warn!("Update already in progress, rejecting trigger");
            return Err(UpdateError::Busy);
        };

        let started_at = Utc::now();
        info!("Starting update");

        let config = self.store.load().await.map_err(|e| {
            error!(error = %e, "Failed to load deployment config");
            UpdateError::from(e)
        })?;

        let mut stages = vec![
            UpdateStage::new("clean"),
            UpdateStage::new("fetch"),
            UpdateStage::new("rebuild"),
            UpdateStage::new("prune"),
        ];

        let result = self.run_stages(&config, &mut stages).await;

        let summary: Vec<String> = stages.iter().map(UpdateStage::summary).collect();
        match &result {
            Ok(_) => info!(
                stages = %summary.join(", "),
                source_location = %config.source_location.display(),
                "Update complete"
            ),
            Err(e) => error!(
                kind = e.kind(),
                error = %e,
                stages = %summary.join(", "),
                "Update failed"
            ),
        }

        result.map(|unpacked| UpdateReport {
            started_at,
            finished_at: Utc::now(),
            stages,
            unpacked,
        })
    }

    async fn run_stages(
        &self,
        config: &DeploymentConfig,
        stages: &mut [UpdateStage],
    ) -> Result<UnpackSummary, UpdateError> {
        let tree = config.source_location.as_path();

        stages[STAGE_CLEAN].start();
        let cleaned = remove_tree(tree).await;
        stages[STAGE_CLEAN].finish(cleaned.is_ok());
        cleaned?;

        stages[STAGE_FETCH].start();
        let fetched = self.fetcher.fetch_into(config, tree).await;
        stages[STAGE_FETCH].finish(fetched.is_ok());
        let unpacked = fetched?;

        stages[STAGE_REBUILD].start();
        let rebuilt = self.controller.rebuild_and_restart(tree).await;
        stages[STAGE_REBUILD].finish(rebuilt.is_ok());
        rebuilt.map_err(UpdateError::Deploy)?;

        stages[STAGE_PRUNE].start();
        let pruned = self.controller.prune_unused(tree).await;
        stages[STAGE_PRUNE].finish(pruned.is_ok());
        pruned.map_err(UpdateError::Prune)?;

        Ok(unpacked)
    }
}

/// 删除整个部署目录，不存在视为已清空
async fn remove_tree(tree: &Path) -> Result<(), UpdateError> {
    match tokio::fs::remove_dir_all(tree).await {
        Ok(()) => {
            info!(path = %tree.display(), "Removed previous deployment tree");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UpdateError::Clean {
            path: tree.to_path_buf(),
            source,
        }),
    }
}
