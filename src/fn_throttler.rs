//! Function-call throttling built on a shared throttled conduit.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;

use crate::config::ThrottleConfig;
use crate::error::ThrottleError;
use crate::metrics::Metrics;
use crate::rate::Unit;
use crate::receiver::ThrottledReceiver;
use crate::throttler::Throttler;

/// Gates arbitrary function invocations, one token-passage per call.
///
/// Internally a pacing conduit with a single slot feeds a throttled
/// output conduit. Each [`acquire`](FnThrottler::acquire) sends a
/// sentinel into the pacing side (blocking while the slot is occupied)
/// and then receives from the throttled side - the rate-limited step.
///
/// Clones share the pacing conduit, so every callable wrapped by this
/// throttler or its clones obeys the single combined rate. Ordering
/// across concurrent callers is whatever the conduit transport provides,
/// not a fairness guarantee.
#[derive(Clone)]
pub struct FnThrottler {
    pace: mpsc::Sender<()>,
    gate: Arc<Mutex<ThrottledReceiver<()>>>,
    throttler: Arc<Throttler>,
}

impl FnThrottler {
    /// Creates a function throttler at `rate` calls per `unit`.
    pub fn new(rate: f64, unit: Unit) -> Result<Self, ThrottleError> {
        Self::with_config(rate, unit, ThrottleConfig::default())
    }

    /// Creates a function throttler with burst and granularity options.
    pub fn with_config(
        rate: f64,
        unit: Unit,
        config: ThrottleConfig,
    ) -> Result<Self, ThrottleError> {
        let throttler = Throttler::with_config(rate, unit, config)?;
        let (pace, pace_rx) = mpsc::channel(1);
        let gate = throttler.throttle(ReceiverStream::new(pace_rx));

        Ok(Self {
            pace,
            gate: Arc::new(Mutex::new(gate)),
            throttler: Arc::new(throttler),
        })
    }

    /// Waits for one token-passage through the shared conduit.
    ///
    /// Completes immediately while earned tokens remain in the bucket,
    /// otherwise suspends until the filler deposits the next one.
    pub async fn acquire(&self) {
        // The pacing send blocks while another caller occupies the slot.
        if self.pace.send(()).await.is_err() {
            return;
        }
        // The receive is the rate-limited step: one token per grant.
        let mut gate = self.gate.lock().await;
        let _ = gate.recv().await;
    }

    /// Wraps a callable so each invocation first passes [`acquire`].
    ///
    /// [`acquire`]: FnThrottler::acquire
    pub fn wrap<F>(&self, f: F) -> Throttled<F> {
        Throttled {
            gate: self.clone(),
            f,
        }
    }

    /// Counters of the underlying throttler.
    pub fn metrics(&self) -> &Arc<Metrics> {
        self.throttler.metrics()
    }
}

/// A callable gated by a [`FnThrottler`].
pub struct Throttled<F> {
    gate: FnThrottler,
    f: F,
}

impl<F> Throttled<F> {
    /// Waits for a token grant, then invokes the wrapped callable.
    pub async fn call<A, R>(&mut self, args: A) -> R
    where
        F: FnMut(A) -> R,
    {
        self.gate.acquire().await;
        (self.f)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wrapped_callable_returns_its_result() {
        let limiter = FnThrottler::new(1_000.0, Unit::Second).unwrap();
        let mut add = limiter.wrap(|(a, b): (i32, i32)| a + b);
        assert_eq!(add.call((1, 1)).await, 2);
        assert_eq!(add.call((20, 3)).await, 23);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        assert!(matches!(
            FnThrottler::new(f64::NAN, Unit::Minute),
            Err(ThrottleError::InvalidRate(_))
        ));
    }
}
