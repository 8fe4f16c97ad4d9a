//! Poll loop with heartbeats.

use std::time::Duration;

use metrics::counter;
use tabdeck_store::ManifestReader;
use tabdeck_store::metrics::MANIFEST_WATCH_EVENTS_TOTAL;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{UpdateReason, WatchEvent};
use crate::gate::EmitGate;

/// Timing and buffering for one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// Time between manifest polls.
    pub poll_interval: Duration,
    /// Time between heartbeats.
    pub heartbeat_interval: Duration,
    /// Event buffer size for [`ManifestWatcher::spawn`].
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_000),
            heartbeat_interval: Duration::from_millis(15_000),
            channel_capacity: 64,
        }
    }
}

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest accepted heartbeat interval.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1_000);

impl WatchConfig {
    /// Copy with intervals raised to their minimums and a non-zero buffer.
    #[must_use]
    pub fn clamped(self) -> Self {
        if self.poll_interval < MIN_POLL_INTERVAL || self.heartbeat_interval < MIN_HEARTBEAT_INTERVAL {
            warn!(
                poll_ms = self.poll_interval.as_millis() as u64,
                heartbeat_ms = self.heartbeat_interval.as_millis() as u64,
                "watch interval below minimum, clamping"
            );
        }
        Self {
            poll_interval: self.poll_interval.max(MIN_POLL_INTERVAL),
            heartbeat_interval: self.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL),
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}

/// Why a watch loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchExit {
    /// The cancellation token fired.
    Cancelled,
    /// The subscriber dropped its receiver.
    Disconnected,
}

/// Watches the manifest on behalf of one subscriber.
#[derive(Clone)]
pub struct ManifestWatcher {
    reader: ManifestReader,
    config: WatchConfig,
}

impl ManifestWatcher {
    /// Watcher polling `reader`. Intervals below the minimums are raised.
    pub fn new(reader: ManifestReader, config: WatchConfig) -> Self {
        Self {
            reader,
            config: config.clamped(),
        }
    }

    /// Run the loop on its own task and return the event stream.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<WatchEvent>, JoinHandle<WatchExit>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let handle = tokio::spawn(async move { self.run(tx, cancel).await });
        (rx, handle)
    }

    /// Poll and send events until cancelled or the receiver is dropped.
    ///
    /// The first poll happens immediately. Both timers live inside this
    /// future, so they stop together when it returns.
    pub async fn run(&self, tx: mpsc::Sender<WatchEvent>, cancel: CancellationToken) -> WatchExit {
        let mut gate = EmitGate::new();

        if let Some(event) = self.poll(&mut gate, UpdateReason::Initial).await {
            if let Err(exit) = emit(&tx, event, &cancel).await {
                return exit;
            }
        }

        let start = Instant::now();
        let mut poll_timer = time::interval_at(start + self.config.poll_interval, self.config.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = time::interval_at(
            start + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return WatchExit::Cancelled,
                () = tx.closed() => return WatchExit::Disconnected,
                _ = heartbeat.tick() => Some(WatchEvent::Heartbeat),
                _ = poll_timer.tick() => self.poll(&mut gate, UpdateReason::Poll).await,
            };
            if let Some(event) = event {
                if let Err(exit) = emit(&tx, event, &cancel).await {
                    return exit;
                }
            }
        }
    }

    async fn poll(&self, gate: &mut EmitGate, reason: UpdateReason) -> Option<WatchEvent> {
        match self.reader.read().await {
            Ok(Some(outcome)) => {
                let mtime = outcome.modified_ms();
                if gate.admit(reason, mtime) {
                    Some(WatchEvent::updated(&outcome, reason))
                } else {
                    debug!(mtime, last = ?gate.last_mtime(), "manifest unchanged");
                    None
                }
            }
            Ok(None) => {
                debug!("no manifest to announce");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %e.path().display(), "watch poll failed");
                Some(WatchEvent::load_failed())
            }
        }
    }
}

async fn emit(
    tx: &mpsc::Sender<WatchEvent>,
    event: WatchEvent,
    cancel: &CancellationToken,
) -> Result<(), WatchExit> {
    let kind = event.kind();
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(WatchExit::Cancelled),
        sent = tx.send(event) => match sent {
            Ok(()) => {
                counter!(MANIFEST_WATCH_EVENTS_TOTAL, "kind" => kind).increment(1);
                Ok(())
            }
            Err(_) => Err(WatchExit::Disconnected),
        },
    }
}
