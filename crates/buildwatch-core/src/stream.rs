// ── Reactive snapshot streams ──
//
// Subscription handles over `watch` channels: the latest value is always
// available synchronously, changes arrive through `changed()` or a
// `Stream`.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::ActiveProjects;

/// A subscription to a replay-latest value.
///
/// Provides both point-in-time snapshot access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

/// Subscription to the controller's active projects view.
pub type ProjectsStream = SnapshotStream<ActiveProjects>;

impl<T: Clone + Send + Sync + 'static> SnapshotStream<T> {
    pub(crate) fn new(mut receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &T {
        &self.current
    }

    /// The latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change and return it.
    /// Returns `None` once the producer has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` that yields the current value first, then
    /// every change.
    pub fn into_stream(self) -> WatchStream<T> {
        WatchStream::new(self.receiver)
    }
}
