//! 归档拉取与解包
//!
//! 从源服务器流式读取 tar 归档，按流中顺序逐条落盘。
//! 每个条目解析后的路径必须留在目标目录之内。

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info};

use crate::config::DeploymentConfig;
use crate::domain::{EntryKind, UnpackSummary};
use crate::infra::{SourceError, SourceServerClient};

/// 拉取错误
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// 读取归档流或复制条目内容失败
    #[error("archive stream failed: {0}")]
    Stream(#[source] io::Error),

    #[error("archive entry {entry:?} resolves outside the deployment directory")]
    PathEscape { entry: String },

    #[error("failed to write {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unpack task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 归档拉取器
#[derive(Clone)]
pub struct ArchiveFetcher {
    client: SourceServerClient,
}

impl ArchiveFetcher {
    pub fn new(client: SourceServerClient) -> Self {
        Self { client }
    }

    /// 拉取最新归档并解包到 `dest`
    ///
    /// 不删除任何已有内容；失败时已写入的条目保留
    pub async fn fetch_into(
        &self,
        config: &DeploymentConfig,
        dest: &Path,
    ) -> Result<UnpackSummary, FetchError> {
        let body = self.client.open_archive(config).await?;

        // tar 解码是阻塞的，放到 blocking 线程里通过桥接读取响应流
        let reader = SyncIoBridge::new(body);
        let dest = dest.to_path_buf();
        let summary = tokio::task::spawn_blocking(move || unpack_archive(reader, &dest)).await??;

        info!(
            directories = summary.directories,
            files = summary.files,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "Archive unpacked"
        );
        Ok(summary)
    }
}

/// 将 tar 流逐条解包到 `dest`
pub fn unpack_archive<R: Read>(reader: R, dest: &Path) -> Result<UnpackSummary, FetchError> {
    fs::create_dir_all(dest).map_err(|source| FetchError::Filesystem {
        path: dest.to_path_buf(),
        source,
    })?;
    let root = dest.canonicalize().map_err(|source| FetchError::Filesystem {
        path: dest.to_path_buf(),
        source,
    })?;

    let mut archive = tar::Archive::new(reader);
    let mut summary = UnpackSummary::default();
    // 目录权限最后再设置，避免只读目录挡住后续条目
    let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

    for entry in archive.entries().map_err(FetchError::Stream)? {
        let mut entry = entry.map_err(FetchError::Stream)?;
        let entry_type = entry.header().entry_type();
        let name = entry.path().map_err(FetchError::Stream)?.into_owned();

        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            debug!(entry = %name.display(), entry_type = ?entry_type, "Skipping unsupported entry");
            summary.skipped += 1;
            continue;
        };

        let relative = sanitize_entry_path(&name)?;
        if relative.as_os_str().is_empty() {
            // "./" 之类指向根目录本身
            continue;
        }

        let mode = entry.header().mode().map_err(FetchError::Stream)? & 0o7777;
        let target = root.join(&relative);
        let parent = target.parent().unwrap_or(root.as_path());
        create_dir_all(parent)?;
        ensure_contained(&root, parent, &name)?;

        let bytes = match kind {
            EntryKind::Directory => {
                create_dir_all(&target)?;
                ensure_contained(&root, &target, &name)?;
                dir_modes.push((target.clone(), mode));
                0
            }
            EntryKind::File => {
                let mut file = File::create(&target).map_err(|source| FetchError::Filesystem {
                    path: target.clone(),
                    source,
                })?;
                let copied = io::copy(&mut entry, &mut file).map_err(FetchError::Stream)?;
                if copied != entry.size() {
                    return Err(FetchError::Stream(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "{}: expected {} bytes, got {}",
                            name.display(),
                            entry.size(),
                            copied
                        ),
                    )));
                }
                set_mode(&target, mode)?;
                copied
            }
        };

        debug!(entry = %name.display(), kind = %kind, mode = %format!("{:o}", mode), "Unpacked entry");
        summary.record(kind, bytes);
    }

    for (path, mode) in dir_modes.iter().rev() {
        set_mode(path, *mode)?;
    }

    Ok(summary)
}

/// 把条目名规范成相对路径，拒绝绝对路径和 `..`
fn sanitize_entry_path(name: &Path) -> Result<PathBuf, FetchError> {
    let mut relative = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FetchError::PathEscape {
                    entry: name.display().to_string(),
                });
            }
        }
    }
    Ok(relative)
}

/// 解析真实路径后必须仍在根目录下
fn ensure_contained(root: &Path, path: &Path, name: &Path) -> Result<(), FetchError> {
    let resolved = path.canonicalize().map_err(|source| FetchError::Filesystem {
        path: path.to_path_buf(),
        source,
    })?;
    if !resolved.starts_with(root) {
        return Err(FetchError::PathEscape {
            entry: name.display().to_string(),
        });
    }
    Ok(())
}

fn create_dir_all(path: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(path).map_err(|source| FetchError::Filesystem {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), FetchError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| {
        FetchError::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), FetchError> {
    Ok(())
}
