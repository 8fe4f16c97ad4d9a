//! # tabdeck-store
//!
//! Durable manifest persistence and freshest-wins loading.
//!
//! - **Writer**: [`writer::ManifestWriter`] degrades from atomic replace to
//!   in-place overwrite to an alternate path, reporting which tier succeeded
//! - **Reader**: [`reader::ManifestReader`] picks the most recently modified
//!   manifest among the fallback and primary paths
//! - **Errors**: [`errors::ErrorClass`] classifies I/O errors once at the
//!   filesystem boundary
//! - **Policy**: [`policy::RetryPolicy`] lets callers reject saves that landed
//!   on ephemeral storage
//! - **API**: [`api::save`] and [`api::load`] add PIN authorization, payload
//!   validation, and client-safe error bodies
//!
//! All filesystem access goes through [`traits::ManifestFs`].
//!
//! ## Crate Position
//!
//! Depends on tabdeck-core. Depended on by tabdeck-watch and tabdeck-cli.

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod policy;
pub mod providers;
pub mod reader;
pub mod traits;
pub mod writer;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use api::{Authorize, PinAuthorizer, SaveRequest, SaveResponse};
pub use config::StoreConfig;
pub use errors::{ErrorClass, ReadError, WriteError};
pub use policy::{EphemeralPathPolicy, RetryDecision, RetryPolicy};
pub use providers::DiskFs;
pub use reader::{ManifestReader, ReadOutcome};
pub use traits::ManifestFs;
pub use writer::{FallbackInfo, FallbackKind, ManifestWriter, WriteOutcome, WriteTier};
