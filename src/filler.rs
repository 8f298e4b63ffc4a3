//! The filler: a periodic task that deposits tokens into the bucket.

use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::bucket::TokenBucket;
use crate::throttler::SharedScalars;

/// Deposits `token_value` tokens every tick until the bucket closes.
///
/// The scalars are re-read on every cycle and never cached across one, so
/// a runtime rate change takes effect on the next tick. Missed ticks are
/// skipped rather than bursted; the bucket's own capacity bound is the
/// only burst mechanism.
pub(crate) async fn run(bucket: Arc<TokenBucket>, scalars: Arc<SharedScalars>) {
    let mut current = scalars.load();
    let mut ticker = time::interval(current.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fresh = scalars.load();
                if fresh.interval_ms != current.interval_ms {
                    // Rebuild the timer; interval_at avoids the immediate
                    // first tick a plain interval would add.
                    ticker = time::interval_at(Instant::now() + fresh.interval(), fresh.interval());
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                }
                current = fresh;

                // One token at a time: a full bucket drops the surplus
                // instead of stalling the loop, and a closed bucket ends it.
                for _ in 0..current.token_value {
                    if !bucket.offer() {
                        return;
                    }
                }
            }
            _ = bucket.closed() => return,
        }
    }
}
