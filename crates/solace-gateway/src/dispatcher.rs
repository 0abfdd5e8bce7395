use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use solace_types::{PresenceSnapshot, Supporter};

const PRESENCE_CAPACITY: usize = 256;

/// Fans presence snapshots out to every subscribed hub.
#[derive(Clone)]
pub struct PresenceDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every subscriber receives every snapshot.
    broadcast_tx: broadcast::Sender<PresenceSnapshot>,

    /// Last sequence number handed out.
    sequence: AtomicU64,
}

impl PresenceDispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(PRESENCE_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to presence snapshots. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceSnapshot> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish the full set of available supporters. Returns the snapshot's sequence.
    pub fn publish(&self, supporters: Vec<Supporter>) -> u64 {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = PresenceSnapshot::new(sequence, supporters);
        let count = snapshot.len();

        match self.inner.broadcast_tx.send(snapshot) {
            Ok(receivers) => debug!(sequence, count, receivers, "presence snapshot published"),
            Err(_) => debug!(sequence, count, "presence snapshot published with no subscribers"),
        }
        sequence
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

impl Default for PresenceDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
