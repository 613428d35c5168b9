use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::fs;

use crate::quota::directory_size;

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// `None` when no object is stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns `false` when the object was already gone.
    async fn delete_object(&self, key: &str) -> Result<bool>;

    /// Bytes currently occupied by every stored object.
    async fn used_bytes(&self) -> Result<u64>;
}

/// Objects stored as flat files in one directory.
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload directory {}", self.root.display()))
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('.') || key.contains(|c: char| c == '/' || c == '\\') {
            bail!("invalid object key {key:?}");
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalDiskStorage {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_path(key)?;
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write object {key}"))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read object {key}")),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("failed to delete object {key}")),
        }
    }

    async fn used_bytes(&self) -> Result<u64> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || directory_size(&root))
            .await
            .context("directory walk panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_reads_and_deletes_objects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalDiskStorage::new(dir.path());

        storage
            .put_object("20240101_120000_brief.pdf", b"%PDF-1.7".to_vec())
            .await
            .expect("put");
        assert_eq!(storage.used_bytes().await.expect("usage"), 8);
        assert_eq!(
            storage
                .get_object("20240101_120000_brief.pdf")
                .await
                .expect("get")
                .as_deref(),
            Some(&b"%PDF-1.7"[..])
        );

        assert!(storage
            .delete_object("20240101_120000_brief.pdf")
            .await
            .expect("delete"));
        assert!(!storage
            .delete_object("20240101_120000_brief.pdf")
            .await
            .expect("second delete"));
        assert_eq!(
            storage.get_object("20240101_120000_brief.pdf").await.expect("get"),
            None
        );
        assert_eq!(storage.used_bytes().await.expect("usage"), 0);
    }

    #[tokio::test]
    async fn rejects_keys_outside_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalDiskStorage::new(dir.path());

        for key in ["", "../escape.txt", "nested/file.txt", "..\\file.txt", ".hidden"] {
            assert!(
                storage.put_object(key, b"x".to_vec()).await.is_err(),
                "{key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn ensure_root_creates_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalDiskStorage::new(dir.path().join("uploads"));
        storage.ensure_root().await.expect("create root");
        assert!(storage.root().is_dir());
    }
}
