// ── Reactive snapshot stream ──
//
// Subscription type for consuming session updates from the controller.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::session::SessionSnapshot;

/// A subscription to the session's published snapshots.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: Arc<SessionSnapshot>,
    receiver: watch::Receiver<Arc<SessionSnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<SessionSnapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<SessionSnapshot> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Arc<SessionSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. `None` once the controller is gone.
    pub async fn changed(&mut self) -> Option<Arc<SessionSnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each published snapshot.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<SessionSnapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<SessionSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn changed_tracks_publishes() {
        let (tx, rx) = watch::channel(Arc::new(SessionSnapshot::default()));
        let mut stream = SnapshotStream::new(rx);
        assert_eq!(stream.current().cycles, 0);

        tx.send_replace(Arc::new(SessionSnapshot {
            cycles: 3,
            ..SessionSnapshot::default()
        }));
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.cycles, 3);
        assert_eq!(stream.current().cycles, 3);

        drop(tx);
        assert!(stream.changed().await.is_none());
    }
}
