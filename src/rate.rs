//! Rate model: converts a user-facing `(rate, unit)` pair plus burst and
//! granularity options into the scalar triple that drives the filler and
//! the bucket.
//!
//! The derivation keeps the effective rate accurate across many orders of
//! magnitude. At low rates the filler sleeps for long periods and deposits
//! one token per tick; at high rates the period is pinned to a 10 ms floor
//! and a single tick deposits many tokens. Below ~10 ms the scheduler's
//! jitter dominates, so the floor is an accuracy/overhead trade-off.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ThrottleConfig;
use crate::error::ThrottleError;

/// Shortest filler period, in milliseconds. Periods below this are clamped
/// and the per-tick token batch is scaled up to compensate.
pub const MIN_INTERVAL_MS: f64 = 10.0;

/// Time unit of a rate specification, e.g. `5.0` messages per [`Unit::Second`].
///
/// `Month` is 31 days exactly, not a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

impl Unit {
    /// All accepted units, in ascending order of duration.
    pub const ALL: [Unit; 7] = [
        Unit::Microsecond,
        Unit::Millisecond,
        Unit::Second,
        Unit::Minute,
        Unit::Hour,
        Unit::Day,
        Unit::Month,
    ];

    /// Length of this unit in milliseconds.
    pub fn as_millis(self) -> f64 {
        match self {
            Unit::Microsecond => 0.001,
            Unit::Millisecond => 1.0,
            Unit::Second => 1_000.0,
            Unit::Minute => 60_000.0,
            Unit::Hour => 3_600_000.0,
            Unit::Day => 86_400_000.0,
            Unit::Month => 2_678_400_000.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Unit::Microsecond => "microsecond",
            Unit::Millisecond => "millisecond",
            Unit::Second => "second",
            Unit::Minute => "minute",
            Unit::Hour => "hour",
            Unit::Day => "day",
            Unit::Month => "month",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Unit {
    type Err = ThrottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|u| u.name() == s)
            .ok_or_else(|| ThrottleError::UnknownUnit { got: s.to_string() })
    }
}

/// The quantum of emission shaping.
///
/// `Messages(1)` shapes per message. Larger values relax shaping within a
/// time window without changing the long-run rate; `Window(unit)` resolves
/// to the number of messages expected in one such unit, so a window equal
/// to the rate unit disables intra-unit shaping entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// A fixed number of messages per emission quantum. Must be at least 1.
    Messages(u64),
    /// One time unit's worth of messages at the configured rate.
    Window(Unit),
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::Messages(1)
    }
}

/// The derived scalar triple. Immutable once computed; a runtime rate
/// change publishes a whole new triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scalars {
    /// Filler tick period in integer milliseconds, floored at 10 ms.
    pub interval_ms: u64,
    /// Tokens deposited per filler tick.
    pub token_value: u64,
    /// Maximum outstanding tokens; governs the instantaneous burst.
    pub bucket_capacity: u64,
}

impl Scalars {
    /// The filler tick period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Derives the scalar triple from a rate specification.
///
/// The computation order matters: the provisional sleep is clamped to the
/// 10 ms floor *before* the token batch is recomputed from it, so a clamp
/// enlarges `token_value` and the target rate is preserved.
pub(crate) fn derive(
    rate: f64,
    unit: Unit,
    config: &ThrottleConfig,
) -> Result<Scalars, ThrottleError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ThrottleError::InvalidRate(rate));
    }

    let rate_per_ms = rate / unit.as_millis();

    let granules = match config.granularity {
        Granularity::Messages(0) => return Err(ThrottleError::ZeroGranularity),
        Granularity::Messages(n) => n,
        Granularity::Window(window) => {
            // Messages expected in one window-unit, at least one.
            ((window.as_millis() * rate_per_ms).round() as u64).max(1)
        }
    };

    let sleep = (granules as f64 / rate_per_ms).max(MIN_INTERVAL_MS);
    let token_value = ((sleep * rate_per_ms).round() as u64).max(granules);
    let interval_ms = (sleep.round() as u64).max(1);

    Ok(Scalars {
        interval_ms,
        token_value,
        bucket_capacity: config.burst.max(token_value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars(rate: f64, unit: Unit) -> Scalars {
        derive(rate, unit, &ThrottleConfig::default()).unwrap()
    }

    #[test]
    fn unit_table_is_exact() {
        assert_eq!(Unit::Microsecond.as_millis(), 0.001);
        assert_eq!(Unit::Millisecond.as_millis(), 1.0);
        assert_eq!(Unit::Second.as_millis(), 1_000.0);
        assert_eq!(Unit::Minute.as_millis(), 60_000.0);
        assert_eq!(Unit::Hour.as_millis(), 3_600_000.0);
        assert_eq!(Unit::Day.as_millis(), 86_400_000.0);
        // 31 days exactly
        assert_eq!(Unit::Month.as_millis(), 31.0 * 86_400_000.0);
    }

    #[test]
    fn moderate_rate_sleeps_one_token_per_tick() {
        let s = scalars(10.0, Unit::Second);
        assert_eq!(s.interval_ms, 100);
        assert_eq!(s.token_value, 1);
        assert_eq!(s.bucket_capacity, 1);
    }

    #[test]
    fn high_rate_pins_floor_and_scales_batch() {
        // 10 000/s wants a 0.1 ms period; the floor raises it to 10 ms and
        // the batch grows to 100 tokens to keep the rate on target.
        let s = scalars(10_000.0, Unit::Second);
        assert_eq!(s.interval_ms, 10);
        assert_eq!(s.token_value, 100);
    }

    #[test]
    fn low_rate_sleeps_long() {
        let s = scalars(1.0, Unit::Day);
        assert_eq!(s.interval_ms, 86_400_000);
        assert_eq!(s.token_value, 1);
    }

    #[test]
    fn equivalent_specs_derive_identical_scalars() {
        assert_eq!(scalars(10.0, Unit::Second), scalars(0.00001, Unit::Microsecond));
    }

    #[test]
    fn window_granularity_resolves_to_expected_messages() {
        let config = ThrottleConfig::default().with_granularity(Granularity::Window(Unit::Second));
        let s = derive(7.0, Unit::Second, &config).unwrap();
        // Seven messages expected per second; shaping widens to the full unit.
        assert_eq!(s.token_value, 7);
        assert_eq!(s.interval_ms, 1_000);
        assert_eq!(s.bucket_capacity, 7);

        let fixed = ThrottleConfig::default().with_granularity(Granularity::Messages(7));
        assert_eq!(derive(7.0, Unit::Second, &fixed).unwrap(), s);
    }

    #[test]
    fn window_granularity_never_resolves_below_one() {
        // One message a minute: a second-wide window rounds to zero messages
        // and must be lifted back to one.
        let config = ThrottleConfig::default().with_granularity(Granularity::Window(Unit::Second));
        let s = derive(1.0, Unit::Minute, &config).unwrap();
        assert_eq!(s.token_value, 1);
        assert_eq!(s.interval_ms, 60_000);
    }

    #[test]
    fn message_granularity_widens_batches() {
        let config = ThrottleConfig::default()
            .with_burst(10)
            .with_granularity(Granularity::Messages(10));
        let s = derive(10.0, Unit::Second, &config).unwrap();
        assert_eq!(s.interval_ms, 1_000);
        assert_eq!(s.token_value, 10);
        assert_eq!(s.bucket_capacity, 10);
    }

    #[test]
    fn burst_grows_capacity_but_not_batch() {
        let config = ThrottleConfig::default().with_burst(999);
        let s = derive(100.0, Unit::Second, &config).unwrap();
        assert_eq!(s.interval_ms, 10);
        assert_eq!(s.token_value, 1);
        assert_eq!(s.bucket_capacity, 999);
    }

    #[test]
    fn capacity_always_holds_a_full_batch() {
        // A small burst must not shrink the bucket below one filler batch,
        // or batches would be silently truncated with no readers around.
        let config = ThrottleConfig::default().with_burst(3);
        let s = derive(10_000.0, Unit::Second, &config).unwrap();
        assert_eq!(s.token_value, 100);
        assert_eq!(s.bucket_capacity, 100);
    }

    #[test]
    fn non_positive_and_non_finite_rates_are_rejected() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                derive(rate, Unit::Second, &ThrottleConfig::default()),
                Err(ThrottleError::InvalidRate(_))
            ));
        }
    }

    #[test]
    fn zero_granularity_is_rejected() {
        let config = ThrottleConfig::default().with_granularity(Granularity::Messages(0));
        assert!(matches!(
            derive(1.0, Unit::Second, &config),
            Err(ThrottleError::ZeroGranularity)
        ));
    }

    #[test]
    fn unit_parsing_round_trips() {
        for unit in Unit::ALL {
            assert_eq!(unit.to_string().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn unknown_unit_error_enumerates_accepted_set() {
        let err = "fortnight".parse::<Unit>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("fortnight"));
        for unit in Unit::ALL {
            assert!(message.contains(unit.name()), "missing {unit} in: {message}");
        }
    }
}
