//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod archive;
pub mod update;

pub use archive::{EntryKind, UnpackSummary};
pub use update::{StageStatus, UpdateReport, UpdateStage};
