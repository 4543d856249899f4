//! 更新流程领域模型

use chrono::{DateTime, Utc};

use super::archive::UnpackSummary;

/// 阶段状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl StageStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            StageStatus::Success => "✓",
            StageStatus::Failed => "✗",
            StageStatus::Running => "⟳",
            StageStatus::Pending => "○",
        }
    }
}

/// 更新阶段信息
#[derive(Clone, Debug)]
pub struct UpdateStage {
    /// 阶段标识 (clean, fetch, rebuild, prune)
    pub name: &'static str,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
}

impl UpdateStage {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 单行摘要，如 `✓ fetch (120ms)`
    pub fn summary(&self) -> String {
        let duration = self
            .duration_ms
            .map(|d| format!("{}ms", d))
            .unwrap_or_else(|| "-".to_string());
        format!("{} {} ({})", self.status.icon(), self.name, duration)
    }
}

/// 一次成功更新的结果
#[derive(Clone, Debug)]
pub struct UpdateReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<UpdateStage>,
    pub unpacked: UnpackSummary,
}

impl UpdateReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
