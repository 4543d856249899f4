//! 触发更新 API
//!
//! 任意方法、任意路径都会进入此 handler

use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireTriggerSecret;
use crate::state::AppState;

/// 触发一次更新
///
/// 调用方会一直阻塞到更新完成；更新在独立任务中运行，
/// 客户端断开连接不会中断正在进行的更新
pub async fn trigger_update(
    _auth: RequireTriggerSecret,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let coordinator = state.coordinator.clone();
    let report = tokio::spawn(async move { coordinator.attempt_update().await })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Update task aborted");
            ApiError::internal(format!("update task aborted: {}", e))
        })??;

    tracing::info!(
        duration_ms = report.duration_ms(),
        files = report.unpacked.files,
        directories = report.unpacked.directories,
        "Trigger handled"
    );
    Ok(StatusCode::OK)
}
