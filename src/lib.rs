//! Throttler - Token-Bucket Throughput Throttling
//!
//! Regulates the rate at which values flow through channel-like conduits
//! and, by extension, the rate at which function invocations occur.
//!
//! This is a Rust rendition of the token-bucket throttler idiom from the
//! Clojure world: a periodic filler deposits tokens into a bounded bucket
//! with drop-on-overflow, and a forwarding worker spends exactly one token
//! per value it moves from an input conduit to an output conduit.
//!
//! # Key Features
//!
//! - Average-rate control from one message a month up to the transport's
//!   raw throughput, with a granularity/token-value transformation that
//!   keeps accuracy across the whole range
//! - Configurable burstiness via bucket capacity
//! - Statistical multiplexing: several conduits can share one rate budget
//! - A function adapter that turns any throttler into a call gate
//! - No dedicated threads: one filler task and one piper task per conduit
//!
//! # Example
//!
//! ```
//! use throttler_rs::{Throttler, Unit};
//! use tokio_stream::wrappers::ReceiverStream;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, rx) = tokio::sync::mpsc::channel(32);
//!     let throttler = Throttler::new(5.0, Unit::Second).unwrap();
//!     let mut slow = throttler.throttle(ReceiverStream::new(rx));
//!
//!     tx.send("hello").await.unwrap();
//!     drop(tx); // closing the input ends the output after the last value
//!
//!     while let Some(msg) = slow.recv().await {
//!         println!("{msg}");
//!     }
//! }
//! ```

mod bucket;
mod config;
mod error;
mod filler;
mod fn_throttler;
mod metrics;
mod piper;
mod rate;
mod receiver;
mod throttler;

pub use config::ThrottleConfig;
pub use error::ThrottleError;
pub use fn_throttler::{FnThrottler, Throttled};
pub use metrics::{Metrics, MetricsSnapshot};
pub use rate::{Granularity, MIN_INTERVAL_MS, Scalars, Unit};
pub use receiver::ThrottledReceiver;
pub use throttler::{Throttler, throttle_stream};

// Re-export useful stream combinators
pub use tokio_stream::StreamExt;
