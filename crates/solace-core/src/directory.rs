use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use solace_types::{PresenceSnapshot, Supporter};

use crate::error::ServiceError;
use crate::services::SupporterService;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryStatus {
    /// Nothing requested yet.
    Idle,
    Loading,
    Ready(Arc<[Supporter]>),
    /// The last pull failed. Distinct from an empty `Ready` so the view can
    /// offer a retry instead of "nobody is available".
    Failed(String),
}

/// Immutable view handed to consumers. `revision` increases on every write.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryView {
    pub status: DirectoryStatus,
    pub revision: u64,
}

impl DirectoryView {
    pub fn supporters(&self) -> Option<&[Supporter]> {
        match &self.status {
            DirectoryStatus::Ready(list) => Some(&list[..]),
            _ => None,
        }
    }

    /// True only for a successful load that returned nobody.
    pub fn is_empty_ready(&self) -> bool {
        self.supporters().is_some_and(|list| list.is_empty())
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DirectoryStatus::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// Available supporters as seen by one viewer.
///
/// Push and pull both write through [`SupporterDirectory::replace`], which
/// swaps the whole view at once; no partial merges ever happen.
#[derive(Clone)]
pub struct SupporterDirectory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    viewer: Option<Uuid>,
    service: Arc<dyn SupporterService>,
    state: watch::Sender<DirectoryView>,
}

impl SupporterDirectory {
    pub fn new(service: Arc<dyn SupporterService>, viewer: Option<Uuid>) -> Self {
        let (state, _) = watch::channel(DirectoryView {
            status: DirectoryStatus::Idle,
            revision: 0,
        });
        Self {
            inner: Arc::new(DirectoryInner {
                viewer,
                service,
                state,
            }),
        }
    }

    pub fn viewer(&self) -> Option<Uuid> {
        self.inner.viewer
    }

    pub fn view(&self) -> DirectoryView {
        self.inner.state.borrow().clone()
    }

    /// Observe every replacement of the view.
    pub fn watch(&self) -> watch::Receiver<DirectoryView> {
        self.inner.state.subscribe()
    }

    /// Pull the full snapshot and replace the view. Manual retry only.
    ///
    /// A push applied while the pull is in flight wins; the pull result is
    /// then discarded.
    pub async fn load(&self) -> Result<usize, ServiceError> {
        let started = self.replace(DirectoryStatus::Loading);

        match self.inner.service.get_available_supporters().await {
            Ok(supporters) => {
                let visible = visible_supporters(supporters, self.inner.viewer);
                let count = visible.len();
                if self.replace_if_current(started, DirectoryStatus::Ready(visible.into())) {
                    debug!(count, "directory loaded");
                } else {
                    debug!(count, "discarding pull overtaken by a push");
                }
                Ok(count)
            }
            Err(e) => {
                warn!("directory load failed: {}", e);
                self.replace_if_current(started, DirectoryStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Push path: apply a debounced presence snapshot.
    pub fn apply_snapshot(&self, snapshot: &PresenceSnapshot) {
        let visible = visible_supporters(snapshot.supporters.iter().cloned(), self.inner.viewer);
        debug!(
            sequence = snapshot.sequence,
            count = visible.len(),
            "applying presence snapshot"
        );
        self.replace(DirectoryStatus::Ready(visible.into()));
    }

    /// Returns the revision written.
    fn replace(&self, status: DirectoryStatus) -> u64 {
        let mut revision = 0;
        self.inner.state.send_modify(|view| {
            view.status = status;
            view.revision += 1;
            revision = view.revision;
        });
        revision
    }

    /// Replace only if nothing was written since `expected`.
    fn replace_if_current(&self, expected: u64, status: DirectoryStatus) -> bool {
        self.inner.state.send_if_modified(|view| {
            if view.revision != expected {
                return false;
            }
            view.status = status;
            view.revision += 1;
            true
        })
    }
}

/// Drop the viewer's own record and duplicate ids, keeping first-seen order.
fn visible_supporters<I>(supporters: I, viewer: Option<Uuid>) -> Vec<Supporter>
where
    I: IntoIterator<Item = Supporter>,
{
    let mut seen = HashSet::new();
    supporters
        .into_iter()
        .filter(|s| Some(s.user_id) != viewer)
        .filter(|s| seen.insert(s.id))
        .collect()
}
