//! # tabdeck-core
//!
//! Foundation types shared by every tabdeck crate.
//!
//! - **Manifest model**: [`manifest::Manifest`], [`manifest::Tab`], [`manifest::TabType`]
//! - **Sanitization**: [`sanitize::sanitize_tabs`] and the numeric coercions used
//!   when accepting client input ([`sanitize::parse_active_index`]) and when
//!   deriving the next revision from a stored document ([`manifest::next_rev`])
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by tabdeck-store, tabdeck-watch and tabdeck-cli.

#![deny(unsafe_code)]

pub mod logging;
pub mod manifest;
pub mod sanitize;

pub use manifest::{Manifest, Tab, TabType, next_rev, stored_rev, timestamp_now};
pub use sanitize::{parse_active_index, sanitize_id, sanitize_tab, sanitize_tabs};
