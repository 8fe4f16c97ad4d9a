//! Freshest-wins manifest reader.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::errors::{ErrorClass, ReadError};
use crate::metrics::MANIFEST_READS_TOTAL;
use crate::traits::ManifestFs;

/// The manifest a read selected.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadOutcome {
    /// Stored document as raw JSON.
    pub manifest: Value,
    /// File it came from.
    pub path: PathBuf,
    /// Modification time of that file.
    pub modified: SystemTime,
}

impl ReadOutcome {
    /// Modification time in milliseconds since the Unix epoch.
    pub fn modified_ms(&self) -> u64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// Loads the most recently modified manifest among the configured paths.
#[derive(Clone)]
pub struct ManifestReader {
    config: StoreConfig,
    fs: Arc<dyn ManifestFs>,
}

impl ManifestReader {
    /// Reader over `fs` for the given locations.
    pub fn new(config: StoreConfig, fs: Arc<dyn ManifestFs>) -> Self {
        Self { config, fs }
    }

    /// Read every candidate and return the newest.
    ///
    /// Missing and access-denied candidates are skipped. A candidate that
    /// exists but fails to parse, or fails for any other reason, aborts the
    /// read rather than falling back to an older file. Modification-time
    /// ties go to the fallback path. `Ok(None)` means no candidate exists.
    pub async fn read(&self) -> Result<Option<ReadOutcome>, ReadError> {
        let result = self.select().await;
        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(e) => {
                warn!(error = %e, "manifest read failed");
                "error"
            }
        };
        counter!(MANIFEST_READS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn select(&self) -> Result<Option<ReadOutcome>, ReadError> {
        let mut chosen: Option<ReadOutcome> = None;
        for candidate in self.config.candidates() {
            let Some(found) = self.read_candidate(candidate).await? else {
                continue;
            };
            if chosen.as_ref().is_none_or(|c| found.modified > c.modified) {
                chosen = Some(found);
            }
        }
        if let Some(c) = &chosen {
            debug!(path = %c.path.display(), mtime_ms = c.modified_ms(), "selected manifest");
        }
        Ok(chosen)
    }

    async fn read_candidate(&self, path: &Path) -> Result<Option<ReadOutcome>, ReadError> {
        let (bytes, modified) = tokio::join!(self.fs.read(path), self.fs.modified(path));

        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) if skippable(&e) => return Ok(None),
            Err(e) => return Err(ReadError::from_io(path, e)),
        };
        let modified = match modified {
            Ok(modified) => modified,
            Err(e) if skippable(&e) => return Ok(None),
            Err(e) => return Err(ReadError::from_io(path, e)),
        };
        let manifest = serde_json::from_slice(&bytes).map_err(|source| ReadError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(ReadOutcome {
            manifest,
            path: path.to_path_buf(),
            modified,
        }))
    }
}

fn skippable(err: &std::io::Error) -> bool {
    let class = ErrorClass::classify(err);
    if class == ErrorClass::AccessDenied {
        debug!(error = %err, "skipping unreadable manifest candidate");
    }
    matches!(class, ErrorClass::Absent | ErrorClass::AccessDenied)
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::testutil::{MemFs, Op};

    const PRIMARY: &str = "/data/manifest.json";
    const FALLBACK: &str = "/tmp/manifest.json";

    fn reader(fs: &Arc<MemFs>, fallback: Option<&str>) -> ManifestReader {
        let config = StoreConfig::new(PRIMARY).with_fallback(fallback.map(PathBuf::from));
        ManifestReader::new(config, Arc::clone(fs) as Arc<dyn ManifestFs>)
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn nothing_stored_is_not_found() {
        let fs = Arc::new(MemFs::new());
        assert!(reader(&fs, Some(FALLBACK)).read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn primary_only() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        let out = reader(&fs, None).read().await.unwrap().unwrap();
        assert_eq!(out.path, PathBuf::from(PRIMARY));
        assert_eq!(out.manifest["rev"], 1);
    }

    #[tokio::test]
    async fn newer_fallback_wins() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        fs.insert_json(FALLBACK, &json!({"rev": 2}));
        fs.set_modified(Path::new(PRIMARY), at(100));
        fs.set_modified(Path::new(FALLBACK), at(200));

        let out = reader(&fs, Some(FALLBACK)).read().await.unwrap().unwrap();
        assert_eq!(out.path, PathBuf::from(FALLBACK));
        assert_eq!(out.manifest["rev"], 2);
        assert_eq!(out.modified_ms(), 200_000);
    }

    #[tokio::test]
    async fn newer_primary_wins() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 5}));
        fs.insert_json(FALLBACK, &json!({"rev": 4}));
        fs.set_modified(Path::new(PRIMARY), at(300));
        fs.set_modified(Path::new(FALLBACK), at(200));

        let out = reader(&fs, Some(FALLBACK)).read().await.unwrap().unwrap();
        assert_eq!(out.path, PathBuf::from(PRIMARY));
    }

    #[tokio::test]
    async fn tie_goes_to_fallback() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        fs.insert_json(FALLBACK, &json!({"rev": 2}));
        fs.set_modified(Path::new(PRIMARY), at(100));
        fs.set_modified(Path::new(FALLBACK), at(100));

        let out = reader(&fs, Some(FALLBACK)).read().await.unwrap().unwrap();
        assert_eq!(out.path, PathBuf::from(FALLBACK));
    }

    #[tokio::test]
    async fn fallback_equal_to_primary_read_once() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        let _ = reader(&fs, Some(PRIMARY)).read().await.unwrap().unwrap();
        assert_eq!(fs.calls(Op::Read), [PathBuf::from(PRIMARY)]);
    }

    #[tokio::test]
    async fn denied_candidate_is_skipped() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        fs.insert_json(FALLBACK, &json!({"rev": 2}));
        fs.fail(Op::Read, FALLBACK, ErrorKind::PermissionDenied);

        let out = reader(&fs, Some(FALLBACK)).read().await.unwrap().unwrap();
        assert_eq!(out.path, PathBuf::from(PRIMARY));
    }

    #[tokio::test]
    async fn corrupt_candidate_is_fatal() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        fs.insert(FALLBACK, "{oops");

        let err = reader(&fs, Some(FALLBACK)).read().await.unwrap_err();
        assert_matches!(&err, ReadError::Corrupt { .. });
        assert_eq!(err.path(), Path::new(FALLBACK));
    }

    #[tokio::test]
    async fn other_io_error_is_fatal() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        fs.fail(Op::Read, PRIMARY, ErrorKind::IsADirectory);

        let err = reader(&fs, None).read().await.unwrap_err();
        assert_matches!(err, ReadError::Io { code: "EISDIR", .. });
    }

    #[tokio::test]
    async fn vanished_between_read_and_stat_is_skipped() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 1}));
        fs.fail(Op::Modified, PRIMARY, ErrorKind::NotFound);
        assert!(reader(&fs, None).read().await.unwrap().is_none());
    }
}
