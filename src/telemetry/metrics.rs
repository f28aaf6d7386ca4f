//! Metrics collection for frame-processing statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters shared between the router and its ports via `Arc`.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Frames handed to the control plane.
    pub frames_received: Counter,
    /// Data frames rewritten and emitted by a port.
    pub frames_forwarded: Counter,
    /// Data frames parked while resolution is in flight.
    pub frames_queued: Counter,
    /// Frames discarded (malformed, unaddressed, unroutable, unknown ingress).
    pub frames_dropped: Counter,
    /// Resolution requests broadcast by ports.
    pub arp_requests_sent: Counter,
    /// Resolution replies answered by ports.
    pub arp_replies_sent: Counter,
    /// Flow rules submitted for installation.
    pub rules_installed: Counter,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_registry_starts_at_zero() {
        let metrics = MetricsRegistry::new();
        assert_eq!(metrics.frames_received.get(), 0);
        assert_eq!(metrics.rules_installed.get(), 0);
    }
}
