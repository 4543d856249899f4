//! 触发密钥认证
//!
//! 提供 `RequireTriggerSecret` extractor：校验 `Password` header 与配置目录中的触发密钥

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// 携带触发密钥的请求头
pub const TRIGGER_HEADER: &str = "Password";

/// 触发密钥认证 Extractor
///
/// 每个请求都会重新读取触发密钥，轮换后无需重启；
/// 密钥文件缺失或为空时一律返回 401
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(
///     _auth: RequireTriggerSecret,
///     State(state): State<Arc<AppState>>,
/// ) -> impl IntoResponse {
///     // handler 逻辑...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireTriggerSecret;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireTriggerSecret {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // 读不到触发密钥时没有任何调用方能通过认证
        let expected = state.credentials.load_trigger_secret().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load trigger secret, rejecting request");
            ApiError::unauthorized()
        })?;
        verify_trigger_secret(&parts.headers, &expected)
    }
}

/// 校验触发密钥
///
/// 比较不会因为前缀匹配而提前返回
pub fn verify_trigger_secret(
    headers: &HeaderMap,
    expected: &str,
) -> Result<RequireTriggerSecret, ApiError> {
    let provided = headers.get(TRIGGER_HEADER).map(|v| v.as_bytes());

    match provided {
        Some(secret) if secrets_match(secret, expected.as_bytes()) => Ok(RequireTriggerSecret),
        Some(_) => {
            tracing::warn!("Invalid trigger secret provided");
            Err(ApiError::unauthorized())
        }
        None => {
            tracing::warn!("Missing {} header", TRIGGER_HEADER);
            Err(ApiError::unauthorized())
        }
    }
}

fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    // 空密钥永远不匹配
    if expected.is_empty() {
        return false;
    }
    provided.ct_eq(expected).into()
}
