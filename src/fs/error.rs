use std::path::PathBuf;

use thiserror::Error;

/// 镜像构建错误类型
#[derive(Debug, Error)]
pub enum AdfError {
    #[error("Disk I/O error: {0}")]
    Io(#[from] std::io::Error), // 底层 I/O 错误

    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Unsupported disk format: {0}")]
    InvalidFormat(String),

    #[error("Disk is full: {needed} blocks needed, {free} free")]
    DiskFull { needed: u64, free: u32 },

    #[error("Sector {index} is outside the disk (0..{total})")]
    OutOfRange { index: u32, total: u32 },

    #[error("Source file missing: {}", .0.display())]
    SourceFileMissing(PathBuf),

    #[error("Name cannot be stored on an Amiga volume: {0:?}")]
    InvalidName(String),

    #[error("Sector {0} is not a directory")]
    NotADirectory(u32),

    #[error("Sector {0} is not a file header")]
    NotAFile(u32),

    #[error("File system corrupted: {0}")]
    Corrupted(String),

    #[error("Checksum of sector {0} was not recomputed")]
    ChecksumMismatch(u32),

    #[error("Output file {0:?} is already produced by another target")]
    DuplicateOutput(String),

    #[error("Invalid packaging description: {0}")]
    Config(#[from] serde_json::Error),
}

impl AdfError {
    /// 只影响单个条目的错误：跳过该条目，继续构建。
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceFileMissing(_) | Self::InvalidName(_))
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, AdfError>;
