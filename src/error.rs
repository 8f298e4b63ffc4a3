//! Error types for throttler construction.

use thiserror::Error;

/// Errors raised while validating a rate specification.
///
/// All variants surface synchronously from constructors, before any worker
/// task has been spawned. Once construction succeeds no operational error
/// reaches the caller: closure of the input conduit is normal termination,
/// and a token dropped on overflow is intended and silent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThrottleError {
    /// The rate was zero, negative, or not a finite number.
    #[error("rate must be a positive finite number, got {0}")]
    InvalidRate(f64),

    /// The time unit was not one of the accepted set.
    #[error(
        "unknown time unit `{got}`, expected one of: \
         microsecond, millisecond, second, minute, hour, day, month"
    )]
    UnknownUnit {
        /// The rejected unit name.
        got: String,
    },

    /// A message granularity of zero was supplied.
    #[error("granularity must be at least one message")]
    ZeroGranularity,
}
