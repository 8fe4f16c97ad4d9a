//! # tabdeck-settings
//!
//! Layered configuration: compiled defaults, then `~/.tabdeck/settings.json`,
//! then environment variables.
//!
//! Settings are loaded once by the binary and passed down explicitly. Nothing
//! in the workspace reads a global.
//!
//! ## Crate Position
//!
//! Standalone. Depended on by tabdeck-cli.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, load_settings_with,
    parse_bool, parse_u64_range, settings_path,
};
pub use types::{AuthSettings, LoggingSettings, ManifestSettings, TabdeckSettings, WatchSettings};
