//! Concrete [`ManifestFs`](crate::traits::ManifestFs) implementations.

mod filesystem;

pub use filesystem::DiskFs;
