//! Local disk implementation using `tokio::fs`.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::traits::ManifestFs;

/// Manifest storage on the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskFs;

#[async_trait]
impl ManifestFs for DiskFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, io::Error> {
        tokio::fs::read(path).await
    }

    async fn modified(&self, path: &Path) -> Result<SystemTime, io::Error> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), io::Error> {
        tokio::fs::write(path, contents).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), io::Error> {
        tokio::fs::rename(from, to).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<(), io::Error> {
        let _ = tokio::fs::copy(from, to).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), io::Error> {
        tokio::fs::remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), io::Error> {
        tokio::fs::create_dir_all(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiskFs.read(&dir.path().join("missing.json")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn write_rename_read() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("m.json.tmp");
        let target = dir.path().join("m.json");

        DiskFs.write(&tmp, b"{}").await.unwrap();
        DiskFs.rename(&tmp, &target).await.unwrap();

        assert_eq!(DiskFs.read(&target).await.unwrap(), b"{}");
        assert!(!tmp.exists());
        assert!(DiskFs.modified(&target).await.is_ok());
    }

    #[tokio::test]
    async fn copy_overwrites_target() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        DiskFs.write(&src, b"new").await.unwrap();
        DiskFs.write(&dst, b"old contents").await.unwrap();

        DiskFs.copy(&src, &dst).await.unwrap();
        assert_eq!(DiskFs.read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn create_dir_all_nested_and_repeated() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        DiskFs.create_dir_all(&nested).await.unwrap();
        DiskFs.create_dir_all(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiskFs.remove_file(&dir.path().join("gone")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
