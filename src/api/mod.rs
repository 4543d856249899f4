//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod trigger;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// 构建完整的 API 路由
///
/// 不做路由区分，所有请求都进入触发 handler
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(trigger::trigger_update)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
