//! In-process instrumentation.
//!
//! Counters are written from the demultiplexer's delivery task (and the
//! dispatch path for `dispatched`/`timeouts`) and may be read from any
//! thread, so everything is stored atomically. The latency average is an
//! exponentially-weighted moving average over resolution latencies, kept as
//! f64 bits in an `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const EWMA_ALPHA: f64 = 0.1;

#[derive(Default)]
pub struct Metrics {
    dispatched: AtomicU64,
    resolved: AtomicU64,
    rejected: AtomicU64,
    timeouts: AtomicU64,
    late_drops: AtomicU64,
    malformed_frames: AtomicU64,
    latency_ewma_us: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub timeouts: u64,
    pub late_drops: u64,
    pub malformed_frames: u64,
    pub latency_ewma: Duration,
}

impl Metrics {
    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolved(&self, latency: Duration, rejected: bool) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
        if rejected {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }

        // Single writer (the delivery task), so load-then-store is fine.
        let sample = latency.as_secs_f64() * 1_000_000.0;
        let previous = f64::from_bits(self.latency_ewma_us.load(Ordering::Relaxed));
        let next = if previous == 0.0 {
            sample
        } else {
            previous + EWMA_ALPHA * (sample - previous)
        };
        self.latency_ewma_us.store(next.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_late_drop(&self) {
        self.late_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            late_drops: self.late_drops.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            latency_ewma: Duration::from_secs_f64(
                f64::from_bits(self.latency_ewma_us.load(Ordering::Relaxed)) / 1_000_000.0,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_tracks_samples() {
        let metrics = Metrics::default();
        metrics.record_resolved(Duration::from_millis(10), false);
        let first = metrics.snapshot().latency_ewma;
        assert_eq!(first, Duration::from_millis(10));

        metrics.record_resolved(Duration::from_millis(20), true);
        let second = metrics.snapshot();
        assert!(second.latency_ewma > first);
        assert!(second.latency_ewma < Duration::from_millis(20));
        assert_eq!(second.resolved, 2);
        assert_eq!(second.rejected, 1);
    }

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::default();
        metrics.record_dispatched();
        metrics.record_dispatched();
        metrics.record_timeout();
        metrics.record_late_drop();
        metrics.record_malformed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.late_drops, 1);
        assert_eq!(snapshot.malformed_frames, 1);
    }
}
