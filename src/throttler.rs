//! The throttled-conduit factory: one bucket, one filler, any number of
//! piped conduits sharing the same rate budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bucket::TokenBucket;
use crate::config::ThrottleConfig;
use crate::error::ThrottleError;
use crate::metrics::Metrics;
use crate::rate::{self, Scalars, Unit};
use crate::receiver::ThrottledReceiver;
use crate::{filler, piper};

/// Scalar triple shared between the factory and its filler.
///
/// Plain atomics so the filler can consult the current values on every
/// cycle without locking. The triple is not read atomically as a set; a
/// tick racing a rate change mixes old and new values for one cycle at
/// most.
#[derive(Debug)]
pub(crate) struct SharedScalars {
    interval_ms: AtomicU64,
    token_value: AtomicU64,
    bucket_capacity: AtomicU64,
}

impl SharedScalars {
    fn new(scalars: Scalars) -> Self {
        Self {
            interval_ms: AtomicU64::new(scalars.interval_ms),
            token_value: AtomicU64::new(scalars.token_value),
            bucket_capacity: AtomicU64::new(scalars.bucket_capacity),
        }
    }

    pub(crate) fn load(&self) -> Scalars {
        Scalars {
            interval_ms: self.interval_ms.load(Ordering::Acquire),
            token_value: self.token_value.load(Ordering::Acquire),
            bucket_capacity: self.bucket_capacity.load(Ordering::Acquire),
        }
    }

    fn store(&self, scalars: Scalars) {
        self.interval_ms.store(scalars.interval_ms, Ordering::Release);
        self.token_value.store(scalars.token_value, Ordering::Release);
        self.bucket_capacity.store(scalars.bucket_capacity, Ordering::Release);
    }
}

/// A token-bucket throttler over channel-like conduits.
///
/// Each throttler owns one bucket and one filler task. [`throttle`] joins
/// an input conduit to a new rate-limited output conduit; passing several
/// inputs to the same throttler multiplexes them over the shared budget,
/// so the union of their emissions obeys the single rate.
///
/// # Lifecycle
///
/// Closure of any input conduit closes the shared bucket: the filler
/// stops and every other conduit of this throttler ends on its next
/// attempted forward. Callers that want independent conduit lifetimes use
/// one throttler per conduit. Dropping the throttler has the same
/// fan-out effect.
///
/// Constructors validate the rate specification and spawn the filler, so
/// they must run inside a Tokio runtime.
///
/// [`throttle`]: Throttler::throttle
#[derive(Debug)]
pub struct Throttler {
    bucket: Arc<TokenBucket>,
    scalars: Arc<SharedScalars>,
    config: ThrottleConfig,
    metrics: Arc<Metrics>,
    filler: JoinHandle<()>,
}

impl Throttler {
    /// Creates a throttler emitting `rate` values per `unit`.
    pub fn new(rate: f64, unit: Unit) -> Result<Self, ThrottleError> {
        Self::with_config(rate, unit, ThrottleConfig::default())
    }

    /// Creates a throttler with burst and granularity options.
    pub fn with_config(
        rate: f64,
        unit: Unit,
        config: ThrottleConfig,
    ) -> Result<Self, ThrottleError> {
        let derived = rate::derive(rate, unit, &config)?;
        let metrics = Arc::new(Metrics::new());
        let bucket = Arc::new(TokenBucket::new(derived.bucket_capacity, Arc::clone(&metrics)));
        let scalars = Arc::new(SharedScalars::new(derived));
        let filler = tokio::spawn(filler::run(Arc::clone(&bucket), Arc::clone(&scalars)));

        Ok(Self {
            bucket,
            scalars,
            config,
            metrics,
            filler,
        })
    }

    /// Joins `input` to a new output conduit through the shared bucket.
    ///
    /// The output conduit is reader-owned: drain it, or drop it to close
    /// the whole throttler. Values keep their input order; each delivery
    /// consumes exactly one token.
    pub fn throttle<S>(&self, input: S) -> ThrottledReceiver<S::Item>
    where
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(piper::run(
            input,
            tx,
            Arc::clone(&self.bucket),
            Arc::clone(&self.metrics),
        ));
        ThrottledReceiver::new(rx)
    }

    /// Re-derives the scalars for a new `(rate, unit)` pair and publishes
    /// them, keeping the construction-time burst and granularity options.
    ///
    /// The filler picks the new values up on its next cycle.
    pub fn set_rate(&self, rate: f64, unit: Unit) -> Result<(), ThrottleError> {
        let derived = rate::derive(rate, unit, &self.config)?;
        self.bucket.set_capacity(derived.bucket_capacity);
        self.scalars.store(derived);
        Ok(())
    }

    /// The currently published scalar triple.
    pub fn scalars(&self) -> Scalars {
        self.scalars.load()
    }

    /// Shuts the throttler down: the filler stops and every conduit ends
    /// on its next attempted forward. Idempotent.
    pub fn close(&self) {
        self.bucket.close();
    }

    /// Returns `true` once the shared bucket has been closed.
    pub fn is_closed(&self) -> bool {
        self.bucket.is_closed()
    }

    /// Returns the throttler's counters.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl Drop for Throttler {
    fn drop(&mut self) {
        self.bucket.close();
        self.filler.abort();
    }
}

/// Convenience constructor: factory plus a single application.
///
/// The returned conduit keeps the single-use factory alive internally; it
/// ends when `input` closes or the conduit itself is dropped.
pub fn throttle_stream<S>(
    input: S,
    rate: f64,
    unit: Unit,
    config: ThrottleConfig,
) -> Result<ThrottledReceiver<S::Item>, ThrottleError>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    let throttler = Throttler::with_config(rate, unit, config)?;
    let mut output = throttler.throttle(input);
    output.hold(Arc::new(throttler));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::Granularity;

    // Validation happens before any task is spawned, so the error paths
    // need no runtime at all.
    #[test]
    fn validation_errors_need_no_runtime() {
        assert!(matches!(
            Throttler::new(0.0, Unit::Second),
            Err(ThrottleError::InvalidRate(_))
        ));
        let config = ThrottleConfig::default().with_granularity(Granularity::Messages(0));
        assert!(matches!(
            Throttler::with_config(5.0, Unit::Second, config),
            Err(ThrottleError::ZeroGranularity)
        ));
    }

    #[tokio::test]
    async fn scalars_are_published_and_updatable() {
        let throttler = Throttler::new(10.0, Unit::Second).unwrap();
        assert_eq!(
            throttler.scalars(),
            Scalars {
                interval_ms: 100,
                token_value: 1,
                bucket_capacity: 1
            }
        );

        throttler.set_rate(10_000.0, Unit::Second).unwrap();
        assert_eq!(
            throttler.scalars(),
            Scalars {
                interval_ms: 10,
                token_value: 100,
                bucket_capacity: 100
            }
        );

        assert!(throttler.set_rate(-3.0, Unit::Second).is_err());
    }

    #[tokio::test]
    async fn close_is_observable_and_idempotent() {
        let throttler = Throttler::new(10.0, Unit::Second).unwrap();
        assert!(!throttler.is_closed());
        throttler.close();
        throttler.close();
        assert!(throttler.is_closed());
    }
}
