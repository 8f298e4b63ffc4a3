//! The output conduit handed back by the factory.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

use crate::throttler::Throttler;

/// Reader-owned, rate-limited output conduit.
///
/// Values arrive in their input order, each having consumed exactly one
/// token. The stream ends when the input conduit closes or the owning
/// [`Throttler`] shuts down. Implements [`Stream`], so the re-exported
/// `StreamExt` combinators apply directly.
pub struct ThrottledReceiver<T> {
    rx: mpsc::Receiver<T>,
    // Keep-alive for conduits built through `throttle_stream`, where the
    // single-use factory has no other owner.
    _owner: Option<Arc<Throttler>>,
}

impl<T> ThrottledReceiver<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>) -> Self {
        Self { rx, _owner: None }
    }

    pub(crate) fn hold(&mut self, owner: Arc<Throttler>) {
        self._owner = Some(owner);
    }

    /// Receives the next value, waiting for pacing if required.
    ///
    /// Returns `None` once the conduit has delivered every value sent
    /// before its input closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Closes this conduit from the reader side.
    ///
    /// The forwarding worker observes the closure on its next attempted
    /// forward and shuts the shared bucket down.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<T> Stream for ThrottledReceiver<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
