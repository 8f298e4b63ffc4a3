//! The token bucket: a bounded, closable container of opaque permits.
//!
//! Tokens are carried as semaphore permits, so a blocked `take` queues
//! fairly and wakes in FIFO order. The filler is the only writer; it
//! checks the capacity before adding, which keeps the at-most-capacity
//! bound without a lock. An incoming token that finds the bucket full is
//! dropped silently - the bucket never blocks its filler and never evicts
//! tokens already earned.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Notify, Semaphore};

use crate::metrics::Metrics;

/// Signal that the bucket has been closed and no further tokens will flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketClosed;

#[derive(Debug)]
pub(crate) struct TokenBucket {
    permits: Semaphore,
    capacity: AtomicUsize,
    closed: AtomicBool,
    close_signal: Notify,
    metrics: Arc<Metrics>,
}

impl TokenBucket {
    pub(crate) fn new(capacity: u64, metrics: Arc<Metrics>) -> Self {
        Self {
            permits: Semaphore::new(0),
            capacity: AtomicUsize::new(clamp_capacity(capacity)),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
            metrics,
        }
    }

    /// Offers one token. Returns `false` only when the bucket is closed.
    ///
    /// A full bucket accepts the call and drops the token; the caller
    /// (the filler) must keep going rather than stall.
    pub(crate) fn offer(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.permits.available_permits() >= self.capacity.load(Ordering::Relaxed) {
            self.metrics.add_tokens_dropped(1);
            return true;
        }
        self.permits.add_permits(1);
        self.metrics.add_tokens_deposited(1);
        true
    }

    /// Takes one token, waiting until one is deposited or the bucket closes.
    pub(crate) async fn take(&self) -> Result<(), BucketClosed> {
        match self.permits.acquire().await {
            Ok(permit) => {
                permit.forget();
                self.metrics.add_tokens_consumed(1);
                Ok(())
            }
            Err(_) => Err(BucketClosed),
        }
    }

    /// Closes the bucket. Idempotent.
    ///
    /// Blocked takers observe [`BucketClosed`]; subsequent offers return
    /// `false`; the filler is woken so it can terminate.
    pub(crate) fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.permits.close();
            self.close_signal.notify_waiters();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the bucket has been closed.
    pub(crate) async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        let mut notified = pin!(self.close_signal.notified());
        notified.as_mut().enable();
        // The flag may have flipped between the first check and enabling
        // the waiter; re-check before parking.
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// Replaces the capacity bound consulted by subsequent offers.
    pub(crate) fn set_capacity(&self, capacity: u64) {
        self.capacity.store(clamp_capacity(capacity), Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

fn clamp_capacity(capacity: u64) -> usize {
    usize::try_from(capacity)
        .unwrap_or(Semaphore::MAX_PERMITS)
        .min(Semaphore::MAX_PERMITS)
}
