//! 源服务器 HTTP Client
//!
//! 以流的方式拉取最新的 tar 归档

use std::time::Duration;

use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::info;

use crate::config::DeploymentConfig;

/// 携带密钥的请求头
pub const PASSWORD_HEADER: &str = "Password";

/// 源服务器请求错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to source server failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 源服务器拒绝（密钥错误等）
    #[error("source server responded {status}")]
    Rejected { status: StatusCode },
}

/// 源服务器客户端
#[derive(Clone)]
pub struct SourceServerClient {
    client: Client,
}

impl SourceServerClient {
    /// 创建客户端
    ///
    /// 只限制建连时间，归档下载本身不设总超时
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self { client })
    }

    /// 请求归档并返回响应体的字节流
    pub async fn open_archive(
        &self,
        config: &DeploymentConfig,
    ) -> Result<impl AsyncRead + Send + Unpin + 'static, SourceError> {
        let url = config.source_url();
        info!(url = %url, "Requesting release archive");

        let response = self
            .client
            .get(&url)
            .header(PASSWORD_HEADER, &config.source_password)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Rejected { status });
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(StreamReader::new(Box::pin(body)))
    }
}
