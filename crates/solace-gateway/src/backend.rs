use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use solace_core::{
    BlockService, ConversationService, PresenceService, ReportService, ServiceError,
    SupporterService,
};
use solace_db::Database;
use solace_db::models::{ConversationRow, ProfileRow, ReportRow, SupporterRow};
use solace_types::{Conversation, PresenceSnapshot, ProfileFields, ReportUserRequest, Supporter};

use crate::dispatcher::PresenceDispatcher;

/// SQLite-backed implementation of every core service, scoped to one session user.
///
/// Any mutation that can change the available set republishes a full
/// snapshot through the shared [`PresenceDispatcher`].
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Database>,
    dispatcher: PresenceDispatcher,
    user_id: Uuid,
}

impl LocalBackend {
    pub fn new(db: Arc<Database>, dispatcher: PresenceDispatcher, user_id: Uuid) -> Self {
        Self {
            db,
            dispatcher,
            user_id,
        }
    }

    /// Push the current available set to every subscriber.
    pub async fn publish_presence(&self) -> Result<u64, ServiceError> {
        let supporters = self.available().await?;
        Ok(self.dispatcher.publish(supporters))
    }

    async fn available(&self) -> Result<Vec<Supporter>, ServiceError> {
        self.blocking(|db| {
            db.list_available_supporters()?
                .into_iter()
                .map(supporter_from_row)
                .collect()
        })
        .await
    }

    /// Run a database call off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ServiceError::Backend(e.to_string())
            })?
            .map_err(into_service_error)
    }

    async fn republish(&self) {
        if let Err(e) = self.publish_presence().await {
            warn!("failed to publish presence: {}", e);
        }
    }
}

#[async_trait]
impl SupporterService for LocalBackend {
    async fn get_available_supporters(&self) -> Result<Vec<Supporter>, ServiceError> {
        self.available().await
    }

    async fn get_my_profile(&self) -> Result<Option<Supporter>, ServiceError> {
        let uid = self.user_id.to_string();
        self.blocking(move |db| db.get_supporter_by_user(&uid)?.map(supporter_from_row).transpose())
            .await
    }

    async fn register(&self, fields: ProfileFields) -> Result<(), ServiceError> {
        let uid = self.user_id.to_string();
        let supporter_id = Uuid::new_v4();
        let sid = supporter_id.to_string();

        self.blocking(move |db| {
            if db.get_supporter_by_user(&uid)?.is_some() {
                return Err(ServiceError::Conflict("already registered as a supporter".into()).into());
            }
            let topics = serde_json::to_string(&fields.topics)?;
            db.create_supporter(&sid, &uid, &profile_row(&fields, &topics))
        })
        .await?;

        info!(user_id = %self.user_id, %supporter_id, "supporter registered");
        self.republish().await;
        Ok(())
    }

    async fn update_profile(&self, fields: ProfileFields) -> Result<(), ServiceError> {
        let uid = self.user_id.to_string();
        let updated = self
            .blocking(move |db| {
                let topics = serde_json::to_string(&fields.topics)?;
                db.update_supporter_profile(&uid, &profile_row(&fields, &topics))
            })
            .await?;
        if !updated {
            return Err(ServiceError::NotFound("no supporter profile".into()));
        }

        self.republish().await;
        Ok(())
    }

    async fn toggle_availability(&self) -> Result<(), ServiceError> {
        let uid = self.user_id.to_string();
        let available = self
            .blocking(move |db| db.toggle_availability(&uid))
            .await?
            .ok_or_else(|| ServiceError::NotFound("no supporter profile".into()))?;

        info!(user_id = %self.user_id, available, "availability toggled");
        self.republish().await;
        Ok(())
    }
}

impl PresenceService for LocalBackend {
    fn subscribe_to_availability(&self) -> broadcast::Receiver<PresenceSnapshot> {
        self.dispatcher.subscribe()
    }
}

#[async_trait]
impl ConversationService for LocalBackend {
    async fn get_my_conversations(&self) -> Result<Vec<Conversation>, ServiceError> {
        let uid = self.user_id.to_string();
        self.blocking(move |db| {
            db.list_conversations_for_user(&uid)?
                .into_iter()
                .map(conversation_from_row)
                .collect()
        })
        .await
    }

    async fn start_conversation(&self, supporter_id: Uuid) -> Result<Conversation, ServiceError> {
        let seeker = self.user_id.to_string();
        let sid = supporter_id.to_string();
        let cid = Uuid::new_v4().to_string();

        let conversation = self
            .blocking(move |db| {
                let supporter = db
                    .get_supporter(&sid)?
                    .filter(|s| s.is_available)
                    .ok_or_else(|| ServiceError::NotFound("supporter is not available".into()))?;
                if supporter.user_id == seeker {
                    return Err(ServiceError::Forbidden("cannot start a conversation with yourself".into()).into());
                }
                if db.is_blocked_between(&seeker, &supporter.user_id)? {
                    return Err(ServiceError::Forbidden("conversation not allowed".into()).into());
                }
                conversation_from_row(db.create_conversation(&cid, &sid, &seeker)?)
            })
            .await?;

        info!(conversation_id = %conversation.id, %supporter_id, "conversation created");
        // The supporter's conversation count changed.
        self.republish().await;
        Ok(conversation)
    }
}

#[async_trait]
impl BlockService for LocalBackend {
    async fn block_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if user_id == self.user_id {
            return Err(ServiceError::Forbidden("cannot block yourself".into()));
        }

        let (blocker, blocked) = (self.user_id.to_string(), user_id.to_string());
        let (created, ended) = self
            .blocking(move |db| {
                let created = db.create_block(&blocker, &blocked)?;
                let ended = db.end_conversations_between(&blocker, &blocked)?;
                Ok((created, ended))
            })
            .await?;
        info!(blocker = %self.user_id, blocked = %user_id, created, ended, "user blocked");
        Ok(())
    }
}

#[async_trait]
impl ReportService for LocalBackend {
    async fn report_user(&self, request: ReportUserRequest) -> Result<(), ServiceError> {
        if request.reported_user_id == self.user_id {
            return Err(ServiceError::Forbidden("cannot report yourself".into()));
        }

        let row = ReportRow {
            id: Uuid::new_v4().to_string(),
            reporter_id: self.user_id.to_string(),
            reported_user_id: request.reported_user_id.to_string(),
            conversation_id: request.conversation_id.map(|id| id.to_string()),
            reason: request.reason.as_str().to_string(),
            additional_notes: request.additional_notes,
        };
        let report_id = row.id.clone();
        self.blocking(move |db| db.create_report(&row)).await?;

        info!(
            %report_id,
            reported_user_id = %request.reported_user_id,
            reason = %request.reason,
            "report filed"
        );
        Ok(())
    }
}

/// Service errors raised inside a db closure pass through unchanged; anything
/// else is a backend failure.
fn into_service_error(err: anyhow::Error) -> ServiceError {
    err.downcast::<ServiceError>().unwrap_or_else(|err| {
        error!("database error: {:#}", err);
        ServiceError::Backend(err.to_string())
    })
}

fn profile_row<'a>(fields: &'a ProfileFields, topics: &'a str) -> ProfileRow<'a> {
    ProfileRow {
        display_name: &fields.display_name,
        bio: fields.bio.as_deref(),
        avatar_url: fields.avatar_url.as_deref(),
        training_level: fields.training_level.as_str(),
        topics,
    }
}

fn supporter_from_row(row: SupporterRow) -> Result<Supporter> {
    Ok(Supporter {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        display_name: row.display_name,
        bio: row.bio,
        avatar_url: row.avatar_url,
        training_level: row.training_level.parse().map_err(|e: String| anyhow!(e))?,
        topics: serde_json::from_str(&row.topics)
            .with_context(|| format!("invalid topics for supporter {}", row.id))?,
        is_available: row.is_available,
        last_active_at: parse_timestamp(&row.last_active_at)?,
        total_conversations: row.total_conversations,
    })
}

fn conversation_from_row(row: ConversationRow) -> Result<Conversation> {
    Ok(Conversation {
        id: parse_uuid(&row.id)?,
        supporter_id: parse_uuid(&row.supporter_id)?,
        seeker_id: parse_uuid(&row.seeker_id)?,
        status: row.status.parse().map_err(|e: String| anyhow!(e))?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    value.parse().with_context(|| format!("invalid uuid in database: {}", value))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in database: {}", value))
}
