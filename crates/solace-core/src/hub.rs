use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use solace_types::{Conversation, ConversationStatus, ProfileFields, Supporter};

use crate::config::CoreConfig;
use crate::connect::ConnectionCoordinator;
use crate::directory::SupporterDirectory;
use crate::error::{Error, Result, ValidationError};
use crate::moderation::{BlockOptions, ModerationGate, ReportDialog};
use crate::presence::PresenceFeed;
use crate::profile::ProfileController;
use crate::services::Services;

const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubTab {
    Browse,
    MyChats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubMode {
    /// Terminal: nothing to do without a session.
    NotLoggedIn,
    Loading,
    Hub(HubTab),
    BecomeSupporter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubState {
    pub mode: HubMode,
    pub profile: Option<Supporter>,
    pub conversations: Arc<[Conversation]>,
    /// Set when the last aggregate refresh failed; cleared by the next success.
    pub load_error: Option<String>,
    pub revision: u64,
}

impl HubState {
    pub fn is_supporter(&self) -> bool {
        self.profile.is_some()
    }

    pub fn is_available(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub detail: Option<String>,
}

impl Notice {
    fn success(title: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            detail: None,
        }
    }

    fn error(title: impl Into<String>, err: &Error) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.into(),
            detail: Some(err.to_string()),
        }
    }
}

/// Conversations split for the my-chats view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationLists {
    pub active: Vec<Conversation>,
    pub ended: Vec<Conversation>,
}

/// Peer-support hub for one signed-in viewer.
///
/// Composes the directory, presence feed, connection coordinator, profile
/// controller and moderation gate. Aggregate state (profile + conversations)
/// is only ever reloaded as a whole after a mutating action.
pub struct Hub {
    viewer: Option<Uuid>,
    services: Services,
    config: CoreConfig,
    state: watch::Sender<HubState>,
    notices: broadcast::Sender<Notice>,
    directory: SupporterDirectory,
    coordinator: ConnectionCoordinator,
    profile: ProfileController,
    moderation: ModerationGate,
    feed: Mutex<Option<PresenceFeed>>,
}

impl Hub {
    pub fn new(viewer: Option<Uuid>, services: Services, config: CoreConfig) -> Self {
        let mode = match viewer {
            Some(_) => HubMode::Loading,
            None => HubMode::NotLoggedIn,
        };
        let (state, _) = watch::channel(HubState {
            mode,
            profile: None,
            conversations: Arc::from(Vec::new()),
            load_error: None,
            revision: 0,
        });
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            viewer,
            directory: SupporterDirectory::new(services.supporters.clone(), viewer),
            coordinator: ConnectionCoordinator::new(
                services.conversations.clone(),
                config.connect_scope,
            ),
            profile: ProfileController::new(services.supporters.clone()),
            moderation: ModerationGate::new(
                viewer.unwrap_or_default(),
                services.blocks.clone(),
                services.reports.clone(),
                config.report_confirmation,
            ),
            services,
            config,
            state,
            notices,
            feed: Mutex::new(None),
        }
    }

    pub fn state(&self) -> HubState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<HubState> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn directory(&self) -> &SupporterDirectory {
        &self.directory
    }

    pub fn coordinator(&self) -> &ConnectionCoordinator {
        &self.coordinator
    }

    pub fn profile_controller(&self) -> &ProfileController {
        &self.profile
    }

    pub fn moderation(&self) -> &ModerationGate {
        &self.moderation
    }

    pub fn conversations_by_status(&self) -> ConversationLists {
        let state = self.state.borrow();
        let mut lists = ConversationLists::default();
        for conversation in state.conversations.iter() {
            match conversation.status {
                ConversationStatus::Active => lists.active.push(conversation.clone()),
                ConversationStatus::Ended => lists.ended.push(conversation.clone()),
            }
        }
        lists
    }

    pub async fn is_browsing(&self) -> bool {
        self.feed.lock().await.as_ref().is_some_and(PresenceFeed::is_running)
    }

    // -- Lifecycle --

    /// Initial load, then land on the browse tab.
    pub async fn enter(&self) -> Result<()> {
        self.viewer()?;
        self.set_mode(HubMode::Loading);

        // A failed load still lands on the hub, showing the error with a retry.
        let loaded = self.refresh().await;
        self.select_tab(HubTab::Browse).await?;
        loaded
    }

    /// Reload profile and conversations together and replace both at once.
    pub async fn refresh(&self) -> Result<()> {
        self.viewer()?;

        let (profile, conversations) = tokio::join!(
            self.services.supporters.get_my_profile(),
            self.services.conversations.get_my_conversations(),
        );

        match profile.and_then(|p| conversations.map(|c| (p, c))) {
            Ok((profile, conversations)) => {
                debug!(
                    supporter = profile.is_some(),
                    conversations = conversations.len(),
                    "hub refreshed"
                );
                self.update(|state| {
                    state.profile = profile;
                    state.conversations = conversations.into();
                    state.load_error = None;
                });
                Ok(())
            }
            Err(e) => {
                warn!("hub refresh failed: {}", e);
                let err = Error::from(e);
                self.update(|state| state.load_error = Some(err.to_string()));
                self.notify(Notice::error("Couldn't load your peer support details", &err));
                Err(err)
            }
        }
    }

    pub async fn select_tab(&self, tab: HubTab) -> Result<()> {
        self.viewer()?;
        self.set_mode(HubMode::Hub(tab));

        match tab {
            HubTab::Browse => self.start_browse().await,
            HubTab::MyChats => self.stop_browse().await,
        }
        Ok(())
    }

    /// Tear down the browse view. In-flight actions are left to finish.
    pub async fn shutdown(&self) {
        self.stop_browse().await;
        info!("hub shut down");
    }

    /// Manual retry for a failed directory load.
    pub async fn retry_directory(&self) -> Result<usize> {
        self.viewer()?;
        self.directory.load().await.map_err(|e| {
            let err = Error::from(e);
            self.notify(Notice::error("Couldn't load supporters", &err));
            err
        })
    }

    async fn start_browse(&self) {
        let mut feed = self.feed.lock().await;
        if feed.as_ref().is_some_and(PresenceFeed::is_running) {
            return;
        }

        // Subscribe before pulling so nothing published in between is missed.
        let rx = self.services.presence.subscribe_to_availability();
        *feed = Some(PresenceFeed::spawn(
            rx,
            self.directory.clone(),
            self.config.presence_debounce,
        ));
        drop(feed);

        if let Err(e) = self.directory.load().await {
            self.notify(Notice::error("Couldn't load supporters", &Error::from(e)));
        }
    }

    async fn stop_browse(&self) {
        let feed = self.feed.lock().await.take();
        if let Some(feed) = feed {
            feed.shutdown().await;
        }
    }

    // -- Connecting --

    pub async fn connect(&self, supporter_id: Uuid) -> Result<Conversation> {
        self.viewer()?;
        if self.state.borrow().profile.as_ref().is_some_and(|p| p.id == supporter_id) {
            return Err(ValidationError::SelfTarget.into());
        }

        match self.coordinator.connect(supporter_id).await {
            Ok(conversation) => {
                self.notify(Notice::success("Connected with a supporter"));
                let _ = self.refresh().await;
                Ok(conversation)
            }
            Err(err) => {
                self.report_failure("Couldn't start the conversation", &err);
                Err(err)
            }
        }
    }

    // -- Own profile --

    pub async fn toggle_availability(&self) -> Result<()> {
        self.viewer()?;
        match self.profile.toggle_availability().await {
            Ok(()) => {
                let _ = self.refresh().await;
                let title = if self.state().is_available() {
                    "You're now available"
                } else {
                    "You're now hidden"
                };
                self.notify(Notice::success(title));
                Ok(())
            }
            Err(err) => {
                self.report_failure("Couldn't update availability", &err);
                Err(err)
            }
        }
    }

    pub async fn begin_registration(&self) -> Result<()> {
        self.viewer()?;
        self.stop_browse().await;
        self.set_mode(HubMode::BecomeSupporter);
        Ok(())
    }

    pub async fn cancel_registration(&self) -> Result<()> {
        self.select_tab(HubTab::Browse).await
    }

    pub async fn register(&self, fields: ProfileFields) -> Result<()> {
        self.viewer()?;
        match self.profile.register(fields).await {
            Ok(()) => {
                self.notify(Notice::success("Welcome aboard, you're now a supporter"));
                let _ = self.refresh().await;
                self.select_tab(HubTab::Browse).await
            }
            Err(err) => {
                self.report_failure("Couldn't complete registration", &err);
                Err(err)
            }
        }
    }

    pub async fn update_profile(&self, fields: ProfileFields) -> Result<()> {
        self.viewer()?;
        match self.profile.update_profile(fields).await {
            Ok(()) => {
                self.notify(Notice::success("Profile updated"));
                let _ = self.refresh().await;
                Ok(())
            }
            Err(err) => {
                self.report_failure("Couldn't update your profile", &err);
                Err(err)
            }
        }
    }

    // -- Moderation --

    /// Block a user, refresh conversations, and hand back the chained report
    /// dialog (after the settle delay) if one was requested.
    pub async fn block_user(
        &self,
        user_id: Uuid,
        options: BlockOptions,
    ) -> Result<Option<ReportDialog>> {
        self.viewer()?;
        match self.moderation.block_user(user_id, options).await {
            Ok(outcome) => {
                self.notify(Notice::success("User blocked"));
                let _ = self.refresh().await;

                let Some(follow_up) = outcome.follow_up else {
                    return Ok(None);
                };
                tokio::time::sleep(self.config.follow_up_delay).await;
                Ok(self.moderation.open_follow_up(follow_up))
            }
            Err(err) => {
                self.report_failure("Couldn't block this user", &err);
                Err(err)
            }
        }
    }

    /// Submit, show the confirmation for its interval, then reset and close.
    pub async fn report_user(&self, dialog: &mut ReportDialog) -> Result<()> {
        self.viewer()?;
        match self.moderation.submit_report(dialog).await {
            Ok(_) => {
                self.notify(Notice::success("Report submitted"));
                self.moderation.finish_report(dialog).await;
                Ok(())
            }
            Err(err) => {
                self.report_failure("Couldn't submit the report", &err);
                Err(err)
            }
        }
    }

    // -- internals --

    fn viewer(&self) -> Result<Uuid> {
        self.viewer.ok_or(Error::NotLoggedIn)
    }

    fn set_mode(&self, mode: HubMode) {
        self.update(|state| state.mode = mode);
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut HubState),
    {
        self.state.send_modify(|state| {
            f(state);
            state.revision += 1;
        });
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Validation errors show inline and busy rejections are silent; only
    /// real failures become notices.
    fn report_failure(&self, title: &str, err: &Error) {
        if matches!(err, Error::Validation(_) | Error::NotLoggedIn) || err.is_busy() {
            return;
        }
        self.notify(Notice::error(title, err));
    }
}
