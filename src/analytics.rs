//! Analytics event emission.
//!
//! Every decision produces exactly one event describing the outcome, not
//! the raw request. Emission is fire-and-forget from the request path: a
//! sink enqueues without blocking and a background task drains batches.
//! Client IPs are never stored raw; only a salted hash leaves the engine.

use crate::policy::{BlockedReason, VisitorType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Number of queued events that triggers a batch flush.
pub const FLUSH_THRESHOLD: usize = 50;

/// One classified visit, as recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub mask_id: String,
    pub visitor_type: VisitorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<BlockedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub user_agent: String,
    /// Salted SHA-256 of the client IP, truncated
    pub ip_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Irreversibly hash an IP for storage. Salting prevents rainbow lookup
/// over the small IPv4 space.
pub fn hash_ip(ip: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Destination for decision events. Implementations must not block the
/// request path; dropping an event under pressure is acceptable, delaying
/// a decision is not.
pub trait AnalyticsSink: Send + Sync {
    fn enqueue(&self, event: AnalyticsEvent);
}

/// Sink that discards everything. Used when analytics is disabled.
pub struct NullSink;

impl AnalyticsSink for NullSink {
    fn enqueue(&self, _event: AnalyticsEvent) {}
}

/// In-memory sink for tests and the CLI.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalyticsSink for MemorySink {
    fn enqueue(&self, event: AnalyticsEvent) {
        self.events.lock().expect("sink mutex poisoned").push(event);
    }
}

/// Batch of events handed to a flush target.
pub type EventBatch = Vec<AnalyticsEvent>;

/// Channel-backed sink. `enqueue` is a non-blocking send; a spawned worker
/// accumulates events and hands off batches of [`FLUSH_THRESHOLD`] (or
/// whatever is pending when the flush interval elapses) to the given
/// flush function.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AnalyticsEvent>,
}

impl ChannelSink {
    pub fn spawn<F>(flush_interval: std::time::Duration, mut flush: F) -> Self
    where
        F: FnMut(EventBatch) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<AnalyticsEvent>();

        tokio::spawn(async move {
            let mut pending: EventBatch = Vec::with_capacity(FLUSH_THRESHOLD);
            let mut ticker = tokio::time::interval(flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Some(event) => {
                                pending.push(event);
                                if pending.len() >= FLUSH_THRESHOLD {
                                    debug!(count = pending.len(), "flushing analytics batch");
                                    flush(std::mem::take(&mut pending));
                                }
                            }
                            // Sender dropped: flush the tail and stop.
                            None => {
                                if !pending.is_empty() {
                                    flush(std::mem::take(&mut pending));
                                }
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        if !pending.is_empty() {
                            debug!(count = pending.len(), "flushing analytics batch on interval");
                            flush(std::mem::take(&mut pending));
                        }
                    }
                }
            }
        });

        Self { tx }
    }
}

impl AnalyticsSink for ChannelSink {
    fn enqueue(&self, event: AnalyticsEvent) {
        if self.tx.send(event).is_err() {
            warn!("analytics worker gone, dropping event");
        }
    }
}
