//! Presence and matching core for the peer-support hub.
//!
//! Backend access goes through the traits in [`services`]; everything else
//! here is client-side coordination: the debounced presence feed, the
//! supporter directory, connect serialisation, the own-profile controller
//! and the block/report flow, composed by [`Hub`].

pub mod config;
pub mod connect;
pub mod directory;
pub mod error;
pub mod hub;
pub mod moderation;
pub mod presence;
pub mod profile;
pub mod services;

#[cfg(test)]
mod testing;

pub use config::CoreConfig;
pub use connect::{ConnectScope, ConnectionCoordinator};
pub use directory::{DirectoryStatus, DirectoryView, SupporterDirectory};
pub use error::{Error, Result, ServiceError, ValidationError};
pub use hub::{ConversationLists, Hub, HubMode, HubState, HubTab, Notice, NoticeKind};
pub use moderation::{BlockOptions, BlockOutcome, FollowUp, ModerationGate, ReportDialog, ReportPhase};
pub use presence::PresenceFeed;
pub use profile::ProfileController;
pub use services::{
    BlockService, ConversationService, PresenceService, ReportService, Services, SupporterService,
};
