//! Events delivered to a watch subscriber.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tabdeck_store::ReadOutcome;

/// Message shown to subscribers when a poll fails.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load manifest";

/// Why an update event was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateReason {
    /// First poll after subscribing.
    Initial,
    /// A later poll saw a newer modification time.
    Poll,
}

/// Event pushed to a subscriber.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WatchEvent {
    /// The manifest changed (or the subscription just started).
    ManifestUpdated {
        /// Stored `rev`, as found in the document.
        rev: Value,
        /// Stored `updatedAt`, as found in the document.
        #[serde(rename = "updatedAt")]
        updated_at: Value,
        /// Modification time of the winning file, ms since the epoch.
        mtime: u64,
        /// Why the event was sent.
        reason: UpdateReason,
        /// Send time, ms since the epoch.
        #[serde(rename = "sentAt")]
        sent_at: u64,
    },
    /// A poll failed.
    ManifestError {
        /// User-safe description.
        message: String,
    },
    /// Keep-alive with no payload.
    Heartbeat,
}

impl WatchEvent {
    /// Update event for a successful read.
    pub fn updated(outcome: &ReadOutcome, reason: UpdateReason) -> Self {
        let field = |key: &str| outcome.manifest.get(key).cloned().unwrap_or(Value::Null);
        Self::ManifestUpdated {
            rev: field("rev"),
            updated_at: field("updatedAt"),
            mtime: outcome.modified_ms(),
            reason,
            sent_at: now_ms(),
        }
    }

    /// Error event with the generic load-failure message.
    pub fn load_failed() -> Self {
        Self::ManifestError {
            message: LOAD_FAILED_MESSAGE.to_string(),
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ManifestUpdated { .. } => "manifest-updated",
            Self::ManifestError { .. } => "manifest-error",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Render as a server-sent-events frame.
    ///
    /// Heartbeats become a comment line; everything else a `data:` line
    /// carrying the JSON event.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        match self {
            Self::Heartbeat => Ok(": heartbeat\n\n".to_string()),
            other => Ok(format!("data: {}\n\n", serde_json::to_string(other)?)),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
