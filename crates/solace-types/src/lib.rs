pub mod api;
pub mod events;
pub mod models;

pub use api::{ProfileFields, ReportUserRequest};
pub use events::PresenceSnapshot;
pub use models::{
    Conversation, ConversationStatus, ReportReason, Supporter, TOPIC_ORDER, TrainingLevel,
};
