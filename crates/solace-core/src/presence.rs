use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use solace_types::PresenceSnapshot;

use crate::directory::SupporterDirectory;

/// Debounced consumer of the presence push feed.
///
/// Owns the upstream subscription and the debounce timer for as long as it
/// lives. Dropping it cancels both; [`PresenceFeed::shutdown`] additionally
/// waits until the task has stopped, after which nothing is ever applied.
pub struct PresenceFeed {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PresenceFeed {
    pub fn spawn(
        rx: broadcast::Receiver<PresenceSnapshot>,
        directory: SupporterDirectory,
        window: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_feed(rx, directory, window, cancel.clone()));
        info!(window_ms = window.as_millis() as u64, "presence feed started");
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("presence feed stopped");
    }
}

impl Drop for PresenceFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_feed(
    mut rx: broadcast::Receiver<PresenceSnapshot>,
    directory: SupporterDirectory,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut pending: Option<PresenceSnapshot> = None;
    let mut deadline = Instant::now();
    let mut upstream_open = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if let Some(dropped) = pending.take() {
                    debug!(sequence = dropped.sequence, "discarding pending snapshot on teardown");
                }
                break;
            }

            result = rx.recv(), if upstream_open => {
                match result {
                    Ok(snapshot) => {
                        debug!(sequence = snapshot.sequence, count = snapshot.len(), "presence push received");
                        pending = Some(snapshot);
                        deadline = Instant::now() + window;
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Presence receiver lagged by {} snapshots", n);
                    }
                    Err(RecvError::Closed) => {
                        debug!("presence upstream closed");
                        upstream_open = false;
                        if pending.is_none() {
                            break;
                        }
                    }
                }
            }

            _ = sleep_until(deadline), if pending.is_some() => {
                if cancel.is_cancelled() {
                    break;
                }
                if let Some(snapshot) = pending.take() {
                    directory.apply_snapshot(&snapshot);
                }
                if !upstream_open {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryStatus;
    use crate::testing::{MockBackend, supporter};
    use tokio::time::sleep;
    use uuid::Uuid;

    const WINDOW: Duration = Duration::from_millis(500);

    fn names(directory: &SupporterDirectory) -> Vec<String> {
        directory
            .view()
            .supporters()
            .unwrap_or_default()
            .iter()
            .map(|s| s.display_name.clone())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_converges_to_last_snapshot() {
        let (a, b, c) = (supporter("A"), supporter("B"), supporter("C"));
        let (tx, rx) = broadcast::channel(16);
        let directory = SupporterDirectory::new(MockBackend::new(), Some(b.user_id));
        let feed = PresenceFeed::spawn(rx, directory.clone(), WINDOW);

        tx.send(PresenceSnapshot::new(1, vec![a.clone(), b.clone()])).unwrap();
        sleep(Duration::from_millis(100)).await;
        tx.send(PresenceSnapshot::new(2, vec![a.clone(), b.clone(), c])).unwrap();
        sleep(Duration::from_millis(100)).await;
        tx.send(PresenceSnapshot::new(3, vec![a])).unwrap();

        // Still inside the window opened by the last push.
        sleep(Duration::from_millis(450)).await;
        assert_eq!(directory.view().status, DirectoryStatus::Idle);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(names(&directory), vec!["A"]);
        // One write, no intermediate states.
        assert_eq!(directory.view().revision, 1);

        feed.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_mid_window_applies_nothing() {
        let (tx, rx) = broadcast::channel(16);
        let directory = SupporterDirectory::new(MockBackend::new(), None);
        let feed = PresenceFeed::spawn(rx, directory.clone(), WINDOW);

        tx.send(PresenceSnapshot::new(1, vec![supporter("A")])).unwrap();
        sleep(Duration::from_millis(200)).await;
        feed.shutdown().await;

        // The subscription is gone too.
        assert_eq!(tx.receiver_count(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(directory.view().status, DirectoryStatus::Idle);
        assert_eq!(directory.view().revision, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_feed_cancels_it() {
        let (tx, rx) = broadcast::channel(16);
        let directory = SupporterDirectory::new(MockBackend::new(), None);
        let feed = PresenceFeed::spawn(rx, directory.clone(), WINDOW);

        tx.send(PresenceSnapshot::new(1, vec![supporter("A")])).unwrap();
        drop(feed);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(directory.view().revision, 0);
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_pushes_each_apply() {
        let (tx, rx) = broadcast::channel(16);
        let directory = SupporterDirectory::new(MockBackend::new(), None);
        let feed = PresenceFeed::spawn(rx, directory.clone(), WINDOW);

        tx.send(PresenceSnapshot::new(1, vec![supporter("A")])).unwrap();
        sleep(Duration::from_millis(600)).await;
        assert_eq!(names(&directory), vec!["A"]);

        tx.send(PresenceSnapshot::new(2, vec![])).unwrap();
        sleep(Duration::from_millis(600)).await;
        assert!(directory.view().is_empty_ready());
        assert_eq!(directory.view().revision, 2);

        assert!(feed.is_running());
        feed.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn closed_upstream_flushes_pending_then_stops() {
        let (tx, rx) = broadcast::channel(16);
        let viewer = Uuid::new_v4();
        let directory = SupporterDirectory::new(MockBackend::new(), Some(viewer));
        let feed = PresenceFeed::spawn(rx, directory.clone(), WINDOW);

        tx.send(PresenceSnapshot::new(1, vec![supporter("A")])).unwrap();
        drop(tx);

        sleep(Duration::from_millis(600)).await;
        assert_eq!(names(&directory), vec!["A"]);
        assert!(!feed.is_running());
    }
}
