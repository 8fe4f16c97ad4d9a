//! # tabdeck-watch
//!
//! Per-subscriber change notification. A [`watcher::ManifestWatcher`] polls
//! the store's reader, passes results through an [`gate::EmitGate`] so each
//! modification is announced once, and interleaves heartbeats.
//!
//! ## Crate Position
//!
//! Depends on tabdeck-store. Depended on by tabdeck-cli.

#![deny(unsafe_code)]

pub mod events;
pub mod gate;
pub mod watcher;

pub use events::{UpdateReason, WatchEvent};
pub use gate::EmitGate;
pub use watcher::{ManifestWatcher, WatchConfig, WatchExit};
