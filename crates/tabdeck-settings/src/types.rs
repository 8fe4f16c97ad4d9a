//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields take their [`Default`] value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Lower bound applied to `watch.pollIntervalMs`.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Lower bound applied to `watch.heartbeatIntervalMs`.
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Root settings type.
///
/// ```json
/// {
///   "manifest": { "path": "data/manifest.json", "fallbackPath": "/tmp/manifest.json" },
///   "watch": { "pollIntervalMs": 1000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabdeckSettings {
    /// Where the manifest lives.
    pub manifest: ManifestSettings,
    /// Change-notification timing.
    pub watch: WatchSettings,
    /// Save authorization.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl TabdeckSettings {
    /// Clamp values that would break the watcher.
    ///
    /// Called automatically during loading. Out-of-range values are clamped
    /// with a warning rather than rejected.
    pub fn validate(&mut self) {
        let w = &mut self.watch;
        if w.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            tracing::warn!(
                value = w.poll_interval_ms,
                min = MIN_POLL_INTERVAL_MS,
                "pollIntervalMs too small, clamping"
            );
            w.poll_interval_ms = MIN_POLL_INTERVAL_MS;
        }
        if w.heartbeat_interval_ms < MIN_HEARTBEAT_INTERVAL_MS {
            tracing::warn!(
                value = w.heartbeat_interval_ms,
                min = MIN_HEARTBEAT_INTERVAL_MS,
                "heartbeatIntervalMs too small, clamping"
            );
            w.heartbeat_interval_ms = MIN_HEARTBEAT_INTERVAL_MS;
        }
        if w.channel_capacity == 0 {
            tracing::warn!("channelCapacity must be positive, using 1");
            w.channel_capacity = 1;
        }
    }

    /// Make every relative manifest path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let m = &mut self.manifest;
        m.path = resolve(base, &m.path);
        if let Some(fallback) = m.fallback_path.as_mut() {
            *fallback = resolve(base, fallback);
        }
        for p in &mut m.ephemeral_paths {
            *p = resolve(base, p);
        }
    }

    /// Copy suitable for display, with the admin PIN masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.auth.admin_pin = "******".to_string();
        copy
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Manifest storage locations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestSettings {
    /// Primary manifest file. Revisions are always derived from this file.
    pub path: PathBuf,
    /// Alternate location used when the primary is not writable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<PathBuf>,
    /// Locations that do not survive a restart. A save landing on one of
    /// these is reported as needing a retry against another backend.
    pub ephemeral_paths: Vec<PathBuf>,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("manifest.json"),
            fallback_path: None,
            ephemeral_paths: Vec::new(),
        }
    }
}

/// Polling and heartbeat timing for change notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchSettings {
    /// Interval between manifest polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Interval between heartbeats, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Per-subscriber event buffer size.
    pub channel_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            heartbeat_interval_ms: 15_000,
            channel_capacity: 64,
        }
    }
}

/// Save authorization settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// PIN a save request must present.
    pub admin_pin: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            admin_pin: "123456".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
