//! Metric names recorded by the store.
//!
//! Counters go through the `metrics` facade. Nothing here installs a
//! recorder; without one every increment is a no-op.

/// Successful manifest writes (counter, labels: tier).
pub const MANIFEST_WRITES_TOTAL: &str = "manifest_writes_total";
/// Failed manifest writes (counter, labels: code).
pub const MANIFEST_WRITE_FAILURES_TOTAL: &str = "manifest_write_failures_total";
/// Manifest reads (counter, labels: outcome = found | not_found | error).
pub const MANIFEST_READS_TOTAL: &str = "manifest_reads_total";
/// Events emitted by change watchers (counter, labels: kind).
pub const MANIFEST_WATCH_EVENTS_TOTAL: &str = "manifest_watch_events_total";
