//! 归档条目模型

use std::fmt;

/// 会被落盘的条目类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "dir"),
            EntryKind::File => write!(f, "file"),
        }
    }
}

/// 解包统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub directories: usize,
    pub files: usize,
    /// 跳过的条目（符号链接、设备文件等）
    pub skipped: usize,
    /// 写入的文件字节数
    pub bytes: u64,
}

impl UnpackSummary {
    pub fn record(&mut self, kind: EntryKind, bytes: u64) {
        match kind {
            EntryKind::Directory => self.directories += 1,
            EntryKind::File => {
                self.files += 1;
                self.bytes += bytes;
            }
        }
    }

    pub fn entries(&self) -> usize {
        self.directories + self.files
    }
}
