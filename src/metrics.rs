use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for observing a throttler.
///
/// Uses atomic counters with `Relaxed` ordering since these are purely
/// statistical - no control flow depends on exact values, and eventual
/// visibility is acceptable for observability.
#[derive(Debug, Default)]
pub struct Metrics {
    tokens_deposited: AtomicU64,
    tokens_dropped: AtomicU64,
    tokens_consumed: AtomicU64,
    values_forwarded: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count tokens the filler placed into the bucket.
    #[inline]
    pub(crate) fn add_tokens_deposited(&self, n: u64) {
        self.tokens_deposited.fetch_add(n, Ordering::Relaxed);
    }

    /// Count tokens dropped because the bucket was full.
    #[inline]
    pub(crate) fn add_tokens_dropped(&self, n: u64) {
        self.tokens_dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Count tokens consumed by pipers.
    #[inline]
    pub(crate) fn add_tokens_consumed(&self, n: u64) {
        self.tokens_consumed.fetch_add(n, Ordering::Relaxed);
    }

    /// Count values forwarded to an output conduit.
    #[inline]
    pub(crate) fn add_values_forwarded(&self, n: u64) {
        self.values_forwarded.fetch_add(n, Ordering::Relaxed);
    }

    /// Take a snapshot of current counter values.
    ///
    /// Returns a plain struct with `u64` values that can be copied and compared.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_deposited: self.tokens_deposited.load(Ordering::Relaxed),
            tokens_dropped: self.tokens_dropped.load(Ordering::Relaxed),
            tokens_consumed: self.tokens_consumed.load(Ordering::Relaxed),
            values_forwarded: self.values_forwarded.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of throttler counters.
///
/// This is a plain data struct (Copy, Clone) for easy use in aggregation and display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Tokens the filler placed into the bucket.
    pub tokens_deposited: u64,
    /// Tokens dropped on overflow while the bucket was full.
    pub tokens_dropped: u64,
    /// Tokens consumed by forwarding workers.
    pub tokens_consumed: u64,
    /// Values delivered to output conduits.
    pub values_forwarded: u64,
}

impl MetricsSnapshot {
    /// Tokens currently outstanding: deposited but not yet consumed.
    pub fn tokens_outstanding(&self) -> u64 {
        self.tokens_deposited.saturating_sub(self.tokens_consumed)
    }
}
