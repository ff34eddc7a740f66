use thiserror::Error;
use std::path::{Path, PathBuf};

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum EspError {
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Record incomplete: {0}")]
    TruncatedRecord(String),

    #[error("Subrecord incomplete at offset {offset}: expected {expected} bytes, {available} available")]
    TruncatedSubRecord {
        offset: u64,
        expected: usize,
        available: usize,
    },

    #[error("Subrecord data too large: {0} bytes (max 65535)")]
    SubrecordTooLarge(usize),

    #[error("Record data too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error("Destination is the source file: {0}")]
    SameFile(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<PathBuf, EspError> {
    if !file_path.exists() {
        return Err(EspError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "原文件不存在"
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("esp");
    let backup_path = file_path.with_extension(format!("{}.{}.bak", extension, timestamp));

    std::fs::copy(file_path, &backup_path)?;

    Ok(backup_path)
}
