//! Contracts the coordination core expects from its backend collaborators.
//!
//! Every service is scoped to the session user: "my profile" and "my
//! conversations" are resolved by the implementation, not passed in.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use solace_types::{Conversation, PresenceSnapshot, ProfileFields, ReportUserRequest, Supporter};

use crate::error::ServiceError;

#[async_trait]
pub trait SupporterService: Send + Sync {
    async fn get_available_supporters(&self) -> Result<Vec<Supporter>, ServiceError>;

    async fn get_my_profile(&self) -> Result<Option<Supporter>, ServiceError>;

    async fn register(&self, fields: ProfileFields) -> Result<(), ServiceError>;

    async fn update_profile(&self, fields: ProfileFields) -> Result<(), ServiceError>;

    async fn toggle_availability(&self) -> Result<(), ServiceError>;
}

pub trait PresenceService: Send + Sync {
    /// Push feed of full availability snapshots. Dropping the receiver unsubscribes.
    fn subscribe_to_availability(&self) -> broadcast::Receiver<PresenceSnapshot>;
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn get_my_conversations(&self) -> Result<Vec<Conversation>, ServiceError>;

    async fn start_conversation(&self, supporter_id: Uuid) -> Result<Conversation, ServiceError>;
}

#[async_trait]
pub trait BlockService: Send + Sync {
    /// Repeated blocks of the same user succeed.
    async fn block_user(&self, user_id: Uuid) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ReportService: Send + Sync {
    async fn report_user(&self, request: ReportUserRequest) -> Result<(), ServiceError>;
}

/// The full set of collaborators a hub session needs.
#[derive(Clone)]
pub struct Services {
    pub supporters: Arc<dyn SupporterService>,
    pub presence: Arc<dyn PresenceService>,
    pub conversations: Arc<dyn ConversationService>,
    pub blocks: Arc<dyn BlockService>,
    pub reports: Arc<dyn ReportService>,
}

impl Services {
    /// Use one backend object for every contract.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SupporterService
            + PresenceService
            + ConversationService
            + BlockService
            + ReportService
            + 'static,
    {
        Self {
            supporters: backend.clone(),
            presence: backend.clone(),
            conversations: backend.clone(),
            blocks: backend.clone(),
            reports: backend,
        }
    }
}
