//! Per-pin counters surfaced through module status.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters kept by every pin.
///
/// Inputs count framing units received and callbacks delivered; outputs
/// count frames submitted, transmitted, and dropped. All counters are
/// relaxed — they feed status reports, not control flow.
#[derive(Debug, Default)]
pub struct PinMetrics {
    received: AtomicU64,
    delivered: AtomicU64,
    submitted: AtomicU64,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl PinMetrics {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> PinMetricsSnapshot {
        PinMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Copyable snapshot of [`PinMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PinMetricsSnapshot {
    /// Framing units received from the transport (inputs).
    pub received: u64,
    /// Callbacks delivered to user code (inputs).
    pub delivered: u64,
    /// Frames accepted into the send queue (outputs).
    pub submitted: u64,
    /// Frames transmitted by the send thread (outputs).
    pub sent: u64,
    /// Frames dropped on either side.
    pub dropped: u64,
}
