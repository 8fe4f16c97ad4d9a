//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TabdeckSettings::default()`]
//! 2. If `~/.tabdeck/settings.json` exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Clamp out-of-range values ([`TabdeckSettings::validate`])
//!
//! Relative manifest paths are left as written; callers resolve them with
//! [`TabdeckSettings::resolve_paths`] against their working directory.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::TabdeckSettings;

/// Resolve the path to the settings file (`~/.tabdeck/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tabdeck").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TabdeckSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. An unreadable file or invalid JSON is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<TabdeckSettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings using `env` as the environment variable source.
pub fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<TabdeckSettings> {
    let defaults = serde_json::to_value(TabdeckSettings::default())?;

    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(?path, "loading settings from file");
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "settings file not found, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut settings: TabdeckSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// `env` returns the raw value of a variable, if set. Empty strings count as
/// unset. Invalid numeric or boolean values are ignored with a warning.
///
/// | Variable | Setting |
/// |---|---|
/// | `MANIFEST_PATH` | `manifest.path` |
/// | `MANIFEST_FALLBACK_PATH` | `manifest.fallbackPath` |
/// | `ADMIN_PIN` | `auth.adminPin` |
/// | `TABDECK_POLL_INTERVAL_MS` | `watch.pollIntervalMs` (100..=60000) |
/// | `TABDECK_HEARTBEAT_INTERVAL_MS` | `watch.heartbeatIntervalMs` (1000..=600000) |
/// | `TABDECK_LOG_LEVEL` | `logging.level` |
/// | `TABDECK_LOG_JSON` | `logging.json` |
pub fn apply_env_overrides(settings: &mut TabdeckSettings, env: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| env(name).filter(|v| !v.is_empty());

    // ── Manifest locations ──────────────────────────────────────────
    if let Some(v) = string("MANIFEST_PATH") {
        settings.manifest.path = PathBuf::from(v);
    }
    if let Some(v) = string("MANIFEST_FALLBACK_PATH") {
        settings.manifest.fallback_path = Some(PathBuf::from(v));
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = string("ADMIN_PIN") {
        settings.auth.admin_pin = v;
    }

    // ── Watch timing ────────────────────────────────────────────────
    if let Some(v) = string("TABDECK_POLL_INTERVAL_MS") {
        match parse_u64_range(&v, 100, 60_000) {
            Some(n) => settings.watch.poll_interval_ms = n,
            None => warn_invalid("TABDECK_POLL_INTERVAL_MS", &v),
        }
    }
    if let Some(v) = string("TABDECK_HEARTBEAT_INTERVAL_MS") {
        match parse_u64_range(&v, 1_000, 600_000) {
            Some(n) => settings.watch.heartbeat_interval_ms = n,
            None => warn_invalid("TABDECK_HEARTBEAT_INTERVAL_MS", &v),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("TABDECK_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("TABDECK_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn_invalid("TABDECK_LOG_JSON", &v),
        }
    }
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var value, ignoring");
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
