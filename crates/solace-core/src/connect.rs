use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};
use uuid::Uuid;

use solace_types::Conversation;

use crate::error::{Error, Result};
use crate::services::ConversationService;

/// How far the in-flight marker reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectScope {
    /// One attempt at a time for the whole client, whatever the target.
    #[default]
    Global,
    /// One attempt at a time per supporter; different supporters may overlap.
    PerSupporter,
}

impl fmt::Display for ConnectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::PerSupporter => f.write_str("per_supporter"),
        }
    }
}

impl FromStr for ConnectScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "global" => Ok(Self::Global),
            "per_supporter" => Ok(Self::PerSupporter),
            other => Err(format!("unknown connect scope: {}", other)),
        }
    }
}

/// Serialises "talk to this supporter" requests. Rejects, never queues.
pub struct ConnectionCoordinator {
    service: Arc<dyn ConversationService>,
    scope: ConnectScope,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl ConnectionCoordinator {
    pub fn new(service: Arc<dyn ConversationService>, scope: ConnectScope) -> Self {
        Self {
            service,
            scope,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn scope(&self) -> ConnectScope {
        self.scope
    }

    /// Supporters with a pending attempt, for busy indicators.
    pub fn connecting(&self) -> Vec<Uuid> {
        self.lock().iter().copied().collect()
    }

    pub fn is_connecting_to(&self, supporter_id: Uuid) -> bool {
        self.lock().contains(&supporter_id)
    }

    pub async fn connect(&self, supporter_id: Uuid) -> Result<Conversation> {
        let _marker = self.acquire(supporter_id)?;

        info!(%supporter_id, "starting conversation");
        match self.service.start_conversation(supporter_id).await {
            Ok(conversation) => {
                info!(conversation_id = %conversation.id, %supporter_id, "conversation started");
                Ok(conversation)
            }
            Err(e) => {
                warn!(%supporter_id, "failed to start conversation: {}", e);
                Err(e.into())
            }
        }
    }

    fn acquire(&self, supporter_id: Uuid) -> Result<InFlightMarker<'_>> {
        let mut in_flight = self.lock();

        let blocking = match self.scope {
            ConnectScope::Global => in_flight.iter().next().copied(),
            ConnectScope::PerSupporter => in_flight.get(&supporter_id).copied(),
        };
        if let Some(pending) = blocking {
            return Err(Error::ConnectInFlight { pending });
        }

        in_flight.insert(supporter_id);
        Ok(InFlightMarker {
            coordinator: self,
            supporter_id,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        // The set is never left half-written, so a poisoned lock is still usable.
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-flight entry on every exit path, including cancellation.
struct InFlightMarker<'a> {
    coordinator: &'a ConnectionCoordinator,
    supporter_id: Uuid,
}

impl Drop for InFlightMarker<'_> {
    fn drop(&mut self) {
        self.coordinator.lock().remove(&self.supporter_id);
    }
}
