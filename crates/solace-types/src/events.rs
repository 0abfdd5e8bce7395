use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Supporter;

/// Full set of currently available supporters, as pushed by the presence feed.
///
/// Snapshots are always full replacements, never deltas. `sequence` increases
/// monotonically per publisher so consumers can tell pushes apart in logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub sequence: u64,
    pub supporters: Arc<[Supporter]>,
    pub published_at: DateTime<Utc>,
}

impl PresenceSnapshot {
    pub fn new(sequence: u64, supporters: Vec<Supporter>) -> Self {
        Self {
            sequence,
            supporters: supporters.into(),
            published_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.supporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supporters.is_empty()
    }
}
