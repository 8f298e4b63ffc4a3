//! The piper: one token consumed per value forwarded.

use std::pin::pin;
use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::bucket::TokenBucket;
use crate::metrics::Metrics;

/// Joins an input conduit to an output conduit through the bucket.
///
/// Termination:
/// - bucket closed: exit, the output closes when its sender drops;
/// - input closed: close the output, then the bucket, in that order;
/// - output closed by the reader: close the bucket and exit.
pub(crate) async fn run<S>(
    input: S,
    output: mpsc::Sender<S::Item>,
    bucket: Arc<TokenBucket>,
    metrics: Arc<Metrics>,
) where
    S: Stream,
{
    let mut input = pin!(input);

    loop {
        if bucket.take().await.is_err() {
            return;
        }

        match input.next().await {
            Some(value) => {
                if output.send(value).await.is_err() {
                    bucket.close();
                    return;
                }
                metrics.add_values_forwarded(1);
            }
            None => {
                // Output first, so the reader sees end-of-stream for the
                // right reason; then the bucket, so the filler stops.
                drop(output);
                bucket.close();
                return;
            }
        }
    }
}
