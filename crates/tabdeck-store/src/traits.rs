//! Filesystem seam used by the writer and reader.
//!
//! The store never calls `tokio::fs` directly. Production code uses
//! [`DiskFs`](crate::providers::DiskFs); tests swap in
//! [`MemFs`](crate::testutil::MemFs) to inject faults per path.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;

/// Filesystem operations needed to persist and load manifests.
#[async_trait]
pub trait ManifestFs: Send + Sync {
    /// Read the full contents of a file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>, io::Error>;

    /// Last modification time of a file.
    async fn modified(&self, path: &Path) -> Result<SystemTime, io::Error>;

    /// Create or truncate a file and write `contents` to it.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), io::Error>;

    /// Atomically replace `to` with `from`.
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), io::Error>;

    /// Copy the contents of `from` over `to`.
    async fn copy(&self, from: &Path, to: &Path) -> Result<(), io::Error>;

    /// Delete a file.
    async fn remove_file(&self, path: &Path) -> Result<(), io::Error>;

    /// Create a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<(), io::Error>;
}
