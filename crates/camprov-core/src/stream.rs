// ── Reactive device stream ──
//
// Subscription handle for consumers that render the registry (the `run`
// command, a future UI) without polling.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Device;

/// A subscription to the device registry.
///
/// Provides point-in-time snapshot access and change notification via
/// `changed()` or by converting into a `Stream`.
pub struct DeviceStream {
    current: Arc<Vec<Device>>,
    receiver: watch::Receiver<Arc<Vec<Device>>>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Device>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Arc<Vec<Device>> {
        &self.current
    }

    /// Latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> Arc<Vec<Device>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Device>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> DeviceWatchStream {
        DeviceWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a fresh snapshot on every registry change.
pub struct DeviceWatchStream {
    inner: WatchStream<Arc<Vec<Device>>>,
}

impl Stream for DeviceWatchStream {
    type Item = Arc<Vec<Device>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
