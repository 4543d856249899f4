//! 测试辅助：内存 tar 构造和本地上游服务器

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Router,
};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::config::credentials::{
    CredentialStore, SOURCE_LOCATION_FILE, SOURCE_PASSWORD_FILE, SOURCE_SERVER_FILE,
    TRIGGER_PASSWORD_FILE,
};
use crate::infra::SourceServerClient;
use crate::services::coordinator::UpdateCoordinator;
use crate::services::fetch::ArchiveFetcher;
use crate::services::stack::{StackController, StackError};

/// 上游服务器使用的密钥
pub const UPSTREAM_PASSWORD: &str = "upstream-secret";

/// 在目录中写入完整的四项配置
pub fn write_config(dir: &Path, source_location: &Path, server: &str, trigger: &str) {
    std::fs::write(
        dir.join(SOURCE_LOCATION_FILE),
        format!("{}\n", source_location.display()),
    )
    .unwrap();
    std::fs::write(dir.join(SOURCE_SERVER_FILE), format!("{}\n", server)).unwrap();
    std::fs::write(dir.join(SOURCE_PASSWORD_FILE), format!("{}\n", UPSTREAM_PASSWORD)).unwrap();
    std::fs::write(dir.join(TRIGGER_PASSWORD_FILE), format!("  {}  \n", trigger)).unwrap();
}

pub type ArchiveBuilder = tar::Builder<Vec<u8>>;

pub fn append_dir(builder: &mut ArchiveBuilder, path: &str, mode: u32) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(mode);
    builder
        .append_data(&mut header, path, std::io::empty())
        .unwrap();
}

pub fn append_file(builder: &mut ArchiveBuilder, path: &str, mode: u32, content: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    builder.append_data(&mut header, path, content).unwrap();
}

/// 直接写入条目名，绕过 tar builder 对 `..` 和绝对路径的校验
pub fn append_raw_file(builder: &mut ArchiveBuilder, name: &str, mode: u32, content: &[u8]) {
    let mut header = tar::Header::new_old();
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append(&header, content).unwrap();
}

/// 本地上游归档服务器
pub struct Upstream {
    /// `host:port`，不带 scheme
    pub address: String,
    /// 成功返回归档的次数
    pub hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct UpstreamState {
    archive: Arc<Vec<u8>>,
    password: String,
    hits: Arc<AtomicUsize>,
}

async fn serve_archive(State(state): State<UpstreamState>, headers: HeaderMap) -> impl IntoResponse {
    let provided = headers.get("Password").and_then(|v| v.to_str().ok());
    if provided != Some(state.password.as_str()) {
        return (StatusCode::UNAUTHORIZED, Vec::new());
    }
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, state.archive.as_ref().clone())
}

/// 在 127.0.0.1 随机端口启动上游
pub async fn spawn_upstream(archive: Vec<u8>, password: &str) -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = UpstreamState {
        archive: Arc::new(archive),
        password: password.to_string(),
        hits: hits.clone(),
    };
    let app = Router::new().fallback(serve_archive).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Upstream {
        address: addr.to_string(),
        hits,
    }
}

/// 记录调用的假 StackController
#[derive(Default)]
pub struct FakeController {
    pub calls: Mutex<Vec<(&'static str, PathBuf)>>,
    pub rebuild_failure: Option<String>,
    pub prune_failure: Option<String>,
    /// (entered, release)：rebuild 开始时通知 entered，并等待 release
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeController {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(op, _)| *op).collect()
    }

    pub fn work_dirs(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(_, dir)| dir.clone()).collect()
    }

    fn failure(command: &str, output: &Option<String>) -> Result<(), StackError> {
        match output {
            Some(output) => Err(StackError::Failed {
                command: command.to_string(),
                exit_code: Some(1),
                output: output.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StackController for FakeController {
    async fn rebuild_and_restart(&self, work_dir: &Path) -> Result<(), StackError> {
        self.calls
            .lock()
            .unwrap()
            .push(("rebuild", work_dir.to_path_buf()));
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        Self::failure("docker compose up", &self.rebuild_failure)
    }

    async fn prune_unused(&self, work_dir: &Path) -> Result<(), StackError> {
        self.calls
            .lock()
            .unwrap()
            .push(("prune", work_dir.to_path_buf()));
        Self::failure("docker image prune -f", &self.prune_failure)
    }
}

/// 完整的更新环境：配置目录、部署目录、上游服务器
pub struct Fixture {
    pub config_dir: TempDir,
    pub root: TempDir,
    pub tree: PathBuf,
    pub upstream: Upstream,
}

impl Fixture {
    pub async fn new(archive: Vec<u8>, trigger: &str) -> Self {
        let config_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let tree = root.path().join("app");
        let upstream = spawn_upstream(archive, UPSTREAM_PASSWORD).await;
        write_config(config_dir.path(), &tree, &upstream.address, trigger);

        Self {
            config_dir,
            root,
            tree,
            upstream,
        }
    }

    pub fn store(&self) -> CredentialStore {
        CredentialStore::new(self.config_dir.path())
    }

    pub fn coordinator(&self, controller: Arc<FakeController>) -> UpdateCoordinator {
        let client = SourceServerClient::new(std::time::Duration::from_secs(5)).unwrap();
        UpdateCoordinator::new(self.store(), ArchiveFetcher::new(client), controller)
    }
}

/// `app/` + `app/main.sh`
pub fn sample_archive() -> Vec<u8> {
    let mut builder = ArchiveBuilder::new(Vec::new());
    append_dir(&mut builder, "app/", 0o755);
    append_file(&mut builder, "app/main.sh", 0o755, b"echo hi");
    builder.into_inner().unwrap()
}
