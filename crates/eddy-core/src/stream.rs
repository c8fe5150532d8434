// ── Reactive state streams ──
//
// Adapters for consuming watch-backed state (cache entries, engine
// status) as snapshots or as a `Stream`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to a watch-backed state cell.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
pub struct StateStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> StateStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the sender has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let snapshot = self.receiver.borrow_and_update().clone();
        self.current = snapshot.clone();
        Some(snapshot)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> StateWatchStream<T> {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields a new snapshot each time the underlying cell is written.
pub struct StateWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for StateWatchStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn changed_tracks_updates() {
        let (tx, rx) = watch::channel(0u32);
        let mut stream = StateStream::new(rx);
        assert_eq!(*stream.current(), 0);

        tx.send_replace(7);
        assert_eq!(stream.changed().await, Some(7));
        assert_eq!(*stream.current(), 7);

        drop(tx);
        assert_eq!(stream.changed().await, None);
    }

    #[tokio::test]
    async fn into_stream_yields_snapshots() {
        let (tx, rx) = watch::channel(0u32);
        let mut stream = StateStream::new(rx).into_stream();

        // WatchStream yields the initial value first
        assert_eq!(stream.next().await, Some(0));

        tx.send_replace(1);
        assert_eq!(stream.next().await, Some(1));

        drop(tx);
        assert_eq!(stream.next().await, None);
    }
}
