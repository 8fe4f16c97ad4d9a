//! Wiring from settings to store and watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tabdeck_settings::TabdeckSettings;
use tabdeck_store::{
    DiskFs, EphemeralPathPolicy, ManifestFs, ManifestReader, ManifestWriter, PinAuthorizer,
    StoreConfig,
};
use tabdeck_watch::{ManifestWatcher, WatchConfig};

/// Path overrides given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Settings file to load instead of `~/.tabdeck/settings.json`.
    pub settings_file: Option<PathBuf>,
    /// Primary manifest path.
    pub manifest: Option<PathBuf>,
    /// Alternate manifest path.
    pub fallback: Option<PathBuf>,
}

/// Resolved settings plus the directory relative paths were resolved against.
pub struct AppContext {
    pub settings: TabdeckSettings,
    pub base_dir: PathBuf,
    fs: Arc<dyn ManifestFs>,
}

impl AppContext {
    /// Load settings, apply overrides, and resolve paths against `base_dir`.
    pub fn load(overrides: &Overrides, base_dir: &Path) -> Result<Self> {
        let settings = match &overrides.settings_file {
            Some(path) => tabdeck_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => tabdeck_settings::load_settings().context("Failed to load settings")?,
        };
        Ok(Self::from_settings(settings, overrides, base_dir))
    }

    /// Build from already-loaded settings.
    pub fn from_settings(
        mut settings: TabdeckSettings,
        overrides: &Overrides,
        base_dir: &Path,
    ) -> Self {
        if let Some(path) = &overrides.manifest {
            settings.manifest.path.clone_from(path);
        }
        if let Some(path) = &overrides.fallback {
            settings.manifest.fallback_path = Some(path.clone());
        }
        settings.resolve_paths(base_dir);
        Self {
            settings,
            base_dir: base_dir.to_path_buf(),
            fs: Arc::new(DiskFs),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.settings.manifest.path.clone())
            .with_fallback(self.settings.manifest.fallback_path.clone())
    }

    pub fn writer(&self) -> ManifestWriter {
        ManifestWriter::new(self.store_config(), Arc::clone(&self.fs))
    }

    pub fn reader(&self) -> ManifestReader {
        ManifestReader::new(self.store_config(), Arc::clone(&self.fs))
    }

    pub fn authorizer(&self) -> PinAuthorizer {
        PinAuthorizer::new(self.settings.auth.admin_pin.clone())
    }

    pub fn retry_policy(&self) -> EphemeralPathPolicy {
        EphemeralPathPolicy::new(self.settings.manifest.ephemeral_paths.iter().cloned())
    }

    pub fn watcher(&self) -> ManifestWatcher {
        let w = &self.settings.watch;
        ManifestWatcher::new(
            self.reader(),
            WatchConfig {
                poll_interval: Duration::from_millis(w.poll_interval_ms),
                heartbeat_interval: Duration::from_millis(w.heartbeat_interval_ms),
                channel_capacity: w.channel_capacity,
            },
        )
    }
}
