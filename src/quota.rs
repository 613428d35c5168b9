//! Disk usage accounting for the upload directory and the upload acceptance
//! policy.
//!
//! Usage is recomputed by walking the directory on every call. Concurrent
//! writers can make the figure stale by the time it is used, so the quota is
//! a best-effort bound.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;
pub const DEFAULT_STORAGE_LIMIT: u64 = 30 * 1024 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "rar",
];

const MIB: u64 = 1024 * 1024;

/// Sum of the sizes of every regular file below `path`. Entries that vanish
/// or cannot be read while walking are skipped; a missing root counts as 0.
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageStats {
    pub total: u64,
    pub used: u64,
    /// Negative once usage has gone past the limit.
    pub free: i64,
    pub usage_percent: f64,
}

impl StorageStats {
    pub fn from_usage(limit: u64, used: u64) -> Self {
        let free = i128::from(limit) - i128::from(used);
        let free = i64::try_from(free).unwrap_or(if free < 0 { i64::MIN } else { i64::MAX });
        let usage_percent = if limit == 0 {
            100.0
        } else {
            used as f64 / limit as f64 * 100.0
        };
        Self {
            total: limit,
            used,
            free,
            usage_percent,
        }
    }

    pub fn has_room_for(&self, incoming: u64) -> bool {
        i128::from(self.free) >= i128::from(incoming)
    }
}

pub fn storage_stats(path: &Path, limit: u64) -> StorageStats {
    StorageStats::from_usage(limit, directory_size(path))
}

pub fn is_file_size_allowed(len: u64, max: u64) -> bool {
    len <= max
}

pub fn is_storage_available(path: &Path, limit: u64, incoming: u64) -> bool {
    storage_stats(path, limit).has_room_for(incoming)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("invalid file type")]
    InvalidFileType,
    #[error("file size exceeds {} MB limit", .max / MIB)]
    TooLarge { max: u64 },
    #[error("not enough storage space")]
    InsufficientStorage,
}

/// Upload limits, fixed at startup from configuration.
#[derive(Debug, Clone)]
pub struct StorageLimits {
    pub max_file_size: u64,
    pub storage_limit: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            storage_limit: DEFAULT_STORAGE_LIMIT,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl StorageLimits {
    pub fn allows_extension(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.allowed_extensions.iter().any(|allowed| *allowed == ext)
            }
            _ => false,
        }
    }

    pub fn stats(&self, used: u64) -> StorageStats {
        StorageStats::from_usage(self.storage_limit, used)
    }

    /// Runs the three acceptance checks independently and reports every one
    /// that fails.
    pub fn check_upload(
        &self,
        filename: &str,
        size: u64,
        used: u64,
    ) -> Result<(), Vec<UploadRejection>> {
        let mut rejections = Vec::new();
        if !self.allows_extension(filename) {
            rejections.push(UploadRejection::InvalidFileType);
        }
        if !is_file_size_allowed(size, self.max_file_size) {
            rejections.push(UploadRejection::TooLarge {
                max: self.max_file_size,
            });
        }
        if !self.stats(used).has_room_for(size) {
            rejections.push(UploadRejection::InsufficientStorage);
        }

        if rejections.is_empty() {
            Ok(())
        } else {
            Err(rejections)
        }
    }
}
