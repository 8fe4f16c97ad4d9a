//! Caller-level retry policies over write outcomes.
//!
//! The writer never retries beyond its own tiers. A caller that can reach
//! more than one storage backend asks a [`RetryPolicy`] whether a
//! successful save is good enough or should be repeated elsewhere.

use std::path::PathBuf;

use crate::writer::WriteOutcome;

/// What to do with a completed save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep the save.
    Accept,
    /// Treat the save as failed and retry against another backend.
    RetryElsewhere {
        /// Why the save was rejected.
        reason: String,
    },
}

/// Decides whether a save needs to be repeated on another backend.
pub trait RetryPolicy: Send + Sync {
    /// Inspect a successful save.
    fn decide(&self, outcome: &WriteOutcome) -> RetryDecision;
}

/// Rejects saves that landed on storage known not to persist.
///
/// A fallback path under `/tmp` on a serverless host is a typical entry:
/// the write succeeds, but the data is gone on the next cold start.
#[derive(Clone, Debug, Default)]
pub struct EphemeralPathPolicy {
    ephemeral: Vec<PathBuf>,
}

impl EphemeralPathPolicy {
    /// Policy treating the given paths as ephemeral.
    pub fn new(ephemeral: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            ephemeral: ephemeral.into_iter().collect(),
        }
    }
}

impl RetryPolicy for EphemeralPathPolicy {
    fn decide(&self, outcome: &WriteOutcome) -> RetryDecision {
        if self.ephemeral.iter().any(|p| *p == outcome.path) {
            RetryDecision::RetryElsewhere {
                reason: format!("manifest saved to ephemeral path {}", outcome.path.display()),
            }
        } else {
            RetryDecision::Accept
        }
    }
}

#[cfg(test)]
mod tests {
    use tabdeck_core::Manifest;

    use super::*;
    use crate::writer::WriteTier;

    fn outcome(path: &str, tier: WriteTier) -> WriteOutcome {
        WriteOutcome {
            manifest: Manifest::new(1, 0, Vec::new()),
            path: PathBuf::from(path),
            tier,
            fallback: None,
        }
    }

    #[test]
    fn accepts_durable_path() {
        let policy = EphemeralPathPolicy::new([PathBuf::from("/tmp/manifest.json")]);
        assert_eq!(
            policy.decide(&outcome("/data/manifest.json", WriteTier::Atomic)),
            RetryDecision::Accept
        );
    }

    #[test]
    fn rejects_ephemeral_path() {
        let policy = EphemeralPathPolicy::new([PathBuf::from("/tmp/manifest.json")]);
        let decision = policy.decide(&outcome("/tmp/manifest.json", WriteTier::Alternate));
        assert!(matches!(
            decision,
            RetryDecision::RetryElsewhere { reason } if reason.contains("/tmp/manifest.json")
        ));
    }

    #[test]
    fn empty_policy_accepts_everything() {
        let policy = EphemeralPathPolicy::default();
        assert_eq!(
            policy.decide(&outcome("/tmp/manifest.json", WriteTier::Alternate)),
            RetryDecision::Accept
        );
    }
}
