//! Tiered durable manifest writer.
//!
//! A save walks down three tiers, moving on only when the current one is
//! denied access ([`ErrorClass::AccessDenied`]). Any other failure aborts the
//! save.
//!
//! | Tier | Action |
//! |---|---|
//! | Atomic | write `<path>.tmp`, rename onto `<path>`; a contended rename is replaced by copy + delete |
//! | Direct | write `<path>` in place |
//! | Alternate | write the fallback path, or retry `<path>` once when none is configured |
//!
//! Only the atomic tier guarantees readers see the old or the new file and
//! never a partial one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tabdeck_core::{Manifest, next_rev, parse_active_index, sanitize_tabs};
use tracing::{debug, info, warn};

use crate::config::{StoreConfig, temp_path};
use crate::errors::{ErrorClass, WriteError, error_code};
use crate::metrics::{MANIFEST_WRITE_FAILURES_TOTAL, MANIFEST_WRITES_TOTAL};
use crate::traits::ManifestFs;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome types
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy that persisted a manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteTier {
    /// Temp file plus rename (or copy over a contended target).
    Atomic,
    /// In-place overwrite of the primary path.
    Direct,
    /// Overwrite of the configured fallback path.
    Alternate,
    /// Second in-place attempt at the primary path, used when no fallback
    /// path is configured.
    PrimaryRetry,
}

impl WriteTier {
    /// Metric and log label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Direct => "direct",
            Self::Alternate => "alternate",
            Self::PrimaryRetry => "primary_retry",
        }
    }
}

/// Kind of degraded save reported to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    /// Written in place at the requested path.
    Direct,
    /// Written to the alternate path.
    Alternate,
}

/// Why and where a save left the atomic tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackInfo {
    /// Degraded strategy used.
    #[serde(rename = "type")]
    pub kind: FallbackKind,
    /// Error code that ended the atomic attempt.
    pub reason: String,
    /// Path the save was meant for.
    pub original_path: PathBuf,
    /// Path actually written, for alternate saves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Human-readable summary.
    pub message: String,
}

impl FallbackInfo {
    fn direct(original_path: &Path, reason: &str) -> Self {
        Self {
            kind: FallbackKind::Direct,
            reason: reason.to_string(),
            original_path: original_path.to_path_buf(),
            path: None,
            message: "Atomic manifest write failed; wrote directly to manifest path instead."
                .to_string(),
        }
    }

    fn alternate(original_path: &Path, path: &Path, reason: &str) -> Self {
        Self {
            kind: FallbackKind::Alternate,
            reason: reason.to_string(),
            original_path: original_path.to_path_buf(),
            path: Some(path.to_path_buf()),
            message: "Atomic manifest write failed; wrote to alternate manifest path instead."
                .to_string(),
        }
    }
}

/// Result of a successful save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Manifest as persisted.
    pub manifest: Manifest,
    /// Path written.
    pub path: PathBuf,
    /// Tier that succeeded.
    pub tier: WriteTier,
    /// Present for every tier except [`WriteTier::Atomic`].
    pub fallback: Option<FallbackInfo>,
}

impl WriteOutcome {
    /// Whether the save bypassed the atomic tier.
    pub fn is_degraded(&self) -> bool {
        self.fallback.is_some()
    }
}

struct Persisted {
    path: PathBuf,
    tier: WriteTier,
    fallback: Option<FallbackInfo>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Persists manifests with tiered fallback.
///
/// Holds no state between saves. Concurrent saves against the same path are
/// not serialized.
#[derive(Clone)]
pub struct ManifestWriter {
    config: StoreConfig,
    fs: Arc<dyn ManifestFs>,
}

impl ManifestWriter {
    /// Writer over `fs` for the given locations.
    pub fn new(config: StoreConfig, fs: Arc<dyn ManifestFs>) -> Self {
        Self { config, fs }
    }

    /// Sanitize client input into a new manifest and persist it.
    ///
    /// `rev` continues from the manifest currently at the primary path; a
    /// missing or unreadable one restarts at 1.
    pub async fn write(
        &self,
        raw_tabs: &[Value],
        raw_active_index: Option<&Value>,
    ) -> Result<WriteOutcome, WriteError> {
        let result = self.write_inner(raw_tabs, raw_active_index).await;
        match &result {
            Ok(outcome) => {
                counter!(MANIFEST_WRITES_TOTAL, "tier" => outcome.tier.as_str()).increment(1);
                info!(
                    rev = outcome.manifest.rev,
                    path = %outcome.path.display(),
                    tier = outcome.tier.as_str(),
                    tabs = outcome.manifest.tabs.len(),
                    "manifest saved"
                );
            }
            Err(e) => {
                let code = e.code().unwrap_or("internal");
                counter!(MANIFEST_WRITE_FAILURES_TOTAL, "code" => code).increment(1);
                warn!(error = %e, code, "manifest save failed");
            }
        }
        result
    }

    async fn write_inner(
        &self,
        raw_tabs: &[Value],
        raw_active_index: Option<&Value>,
    ) -> Result<WriteOutcome, WriteError> {
        let previous = self.read_previous().await;
        let manifest = Manifest::new(
            next_rev(previous.as_ref()),
            parse_active_index(raw_active_index),
            sanitize_tabs(raw_tabs),
        );
        let json = manifest.to_json_bytes()?;

        let primary = self.config.primary.as_path();
        if let Err(source) = self.ensure_parent(primary).await {
            let dir = primary.parent().unwrap_or(primary).to_path_buf();
            return Err(WriteError::CreateDir {
                path: dir,
                code: error_code(&source),
                source,
            });
        }

        let persisted = self.persist(&json).await?;
        Ok(WriteOutcome {
            manifest,
            path: persisted.path,
            tier: persisted.tier,
            fallback: persisted.fallback,
        })
    }

    /// Previous manifest at the primary path. Any failure means none.
    async fn read_previous(&self) -> Option<Value> {
        let primary = &self.config.primary;
        let bytes = match self.fs.read(primary).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %primary.display(), code = error_code(&e), "no previous manifest");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %primary.display(), error = %e, "previous manifest unparseable, restarting rev");
                None
            }
        }
    }

    async fn ensure_parent(&self, path: &Path) -> Result<(), std::io::Error> {
        let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        match self.fs.create_dir_all(dir).await {
            Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => Err(e),
            _ => Ok(()),
        }
    }

    async fn persist(&self, json: &[u8]) -> Result<Persisted, WriteError> {
        let primary = self.config.primary.as_path();

        // ── Tier 0: atomic ──────────────────────────────────────────
        debug!(path = %primary.display(), "writing manifest atomically");
        let denied = match self.write_atomic(primary, json).await {
            Ok(()) => {
                return Ok(Persisted {
                    path: primary.to_path_buf(),
                    tier: WriteTier::Atomic,
                    fallback: None,
                });
            }
            Err(e) if ErrorClass::classify(&e) == ErrorClass::AccessDenied => e,
            Err(e) => return Err(WriteError::io(primary, e)),
        };
        let reason = error_code(&denied);
        warn!(path = %primary.display(), code = reason, "atomic manifest write denied, writing in place");

        // ── Tier 1: direct ──────────────────────────────────────────
        match self.fs.write(primary, json).await {
            Ok(()) => {
                return Ok(Persisted {
                    path: primary.to_path_buf(),
                    tier: WriteTier::Direct,
                    fallback: Some(FallbackInfo::direct(primary, reason)),
                });
            }
            Err(e) if ErrorClass::classify(&e) == ErrorClass::AccessDenied => {
                warn!(path = %primary.display(), code = error_code(&e), "direct manifest write denied");
            }
            Err(e) => return Err(WriteError::io(primary, e)),
        }

        // ── Tier 2: alternate ───────────────────────────────────────
        match self.config.fallback.as_deref() {
            Some(alternate) => self.write_alternate(primary, alternate, json, reason).await,
            None => self.retry_primary(primary, json, reason).await,
        }
    }

    async fn write_alternate(
        &self,
        primary: &Path,
        alternate: &Path,
        json: &[u8],
        reason: &str,
    ) -> Result<Persisted, WriteError> {
        debug!(path = %alternate.display(), "writing manifest to alternate path");
        let attempt = match self.ensure_parent(alternate).await {
            Ok(()) => self.fs.write(alternate, json).await,
            Err(e) => Err(e),
        };
        match attempt {
            Ok(()) => Ok(Persisted {
                path: alternate.to_path_buf(),
                tier: WriteTier::Alternate,
                fallback: Some(FallbackInfo::alternate(primary, alternate, reason)),
            }),
            Err(source) => Err(WriteError::Exhausted {
                path: alternate.to_path_buf(),
                code: error_code(&source),
                fallback_configured: true,
                source,
            }),
        }
    }

    /// Last resort without a fallback path: one more in-place attempt.
    ///
    /// Deployments without an alternate location rely on this to ride out a
    /// transient denial on the primary path.
    async fn retry_primary(
        &self,
        primary: &Path,
        json: &[u8],
        reason: &str,
    ) -> Result<Persisted, WriteError> {
        debug!(path = %primary.display(), "no alternate path, retrying primary");
        match self.fs.write(primary, json).await {
            Ok(()) => Ok(Persisted {
                path: primary.to_path_buf(),
                tier: WriteTier::PrimaryRetry,
                fallback: Some(FallbackInfo::direct(primary, reason)),
            }),
            Err(source) => Err(WriteError::Exhausted {
                path: primary.to_path_buf(),
                code: error_code(&source),
                fallback_configured: false,
                source,
            }),
        }
    }

    /// Tier 0. On error the temp file is removed once more, best effort.
    async fn write_atomic(&self, path: &Path, json: &[u8]) -> Result<(), std::io::Error> {
        let tmp = temp_path(path);
        let result = self.replace_via_temp(&tmp, path, json).await;
        if result.is_err() {
            self.discard_temp(&tmp).await;
        }
        result
    }

    async fn replace_via_temp(
        &self,
        tmp: &Path,
        path: &Path,
        json: &[u8],
    ) -> Result<(), std::io::Error> {
        self.fs.write(tmp, json).await?;
        match self.fs.rename(tmp, path).await {
            Ok(()) => Ok(()),
            Err(e) if ErrorClass::classify(&e) == ErrorClass::RenameContention => {
                debug!(path = %path.display(), code = error_code(&e), "rename contended, copying over target");
                self.fs.copy(tmp, path).await?;
                // A temp file left behind means the tier did not complete.
                match self.fs.remove_file(tmp).await {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
                    _ => Ok(()),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort temp removal. Failures are logged, never returned.
    async fn discard_temp(&self, tmp: &Path) {
        match self.fs.remove_file(tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %tmp.display(), code = error_code(&e), "failed to remove temp manifest");
            }
        }
    }
}
