//! 统一错误处理
//!
//! `ApiError` 实现 `IntoResponse`，响应体是给运维看的纯文本诊断

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::services::UpdateError;

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 401 - 触发密钥缺失或错误
    Unauthorized,
    /// 500 - 更新失败（包括 Busy）
    Update(UpdateError),
    /// 500 - 内部错误
    Internal(String),
}

impl ApiError {
    /// 创建未授权错误
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 响应体文本
    pub fn body(&self) -> String {
        match self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Update(e) => format!("{}: {}", e.kind(), e),
            ApiError::Internal(msg) => format!("internal_error: {}", msg),
        }
    }
}

impl From<UpdateError> for ApiError {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Update(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.body()).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.body())
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;
