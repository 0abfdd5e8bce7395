//! In-memory backend for exercising the core without a database.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Semaphore, broadcast};
use uuid::Uuid;

use solace_types::{
    Conversation, ConversationStatus, PresenceSnapshot, ProfileFields, ReportUserRequest,
    Supporter, TrainingLevel,
};

use crate::error::ServiceError;
use crate::services::{
    BlockService, ConversationService, PresenceService, ReportService, SupporterService,
};

/// One-shot failure injected into the next call of an operation.
#[derive(Default)]
struct Failure(Mutex<Option<String>>);

impl Failure {
    fn arm(&self, msg: &str) {
        *self.0.lock().unwrap() = Some(msg.to_string());
    }

    fn check(&self) -> Result<(), ServiceError> {
        match self.0.lock().unwrap().take() {
            Some(msg) => Err(ServiceError::Network(msg)),
            None => Ok(()),
        }
    }
}

/// Parks calls until permits are released, once armed.
struct Hold {
    armed: AtomicBool,
    permits: Semaphore,
}

impl Hold {
    fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            permits: Semaphore::new(0),
        }
    }

    async fn wait(&self) {
        if self.armed.load(Ordering::Acquire) {
            self.permits.acquire().await.unwrap().forget();
        }
    }
}

pub(crate) struct MockBackend {
    seeker_id: Uuid,
    available: Mutex<Vec<Supporter>>,
    profile: Mutex<Option<Supporter>>,
    conversations: Mutex<Vec<Conversation>>,
    blocked: Mutex<Vec<Uuid>>,
    reports: Mutex<Vec<ReportUserRequest>>,
    presence: broadcast::Sender<PresenceSnapshot>,

    load_failure: Failure,
    profile_failure: Failure,
    start_failure: Failure,
    toggle_failure: Failure,
    block_failure: Failure,
    report_failure: Failure,

    load_hold: Hold,
    conversation_hold: Hold,
    toggle_hold: Hold,
    report_hold: Hold,

    profile_calls: AtomicUsize,
    start_calls: AtomicUsize,
    toggle_calls: AtomicUsize,
    register_calls: AtomicUsize,
    report_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        let (presence, _) = broadcast::channel(16);
        Arc::new(Self {
            seeker_id: Uuid::new_v4(),
            available: Mutex::new(Vec::new()),
            profile: Mutex::new(None),
            conversations: Mutex::new(Vec::new()),
            blocked: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            presence,
            load_failure: Failure::default(),
            profile_failure: Failure::default(),
            start_failure: Failure::default(),
            toggle_failure: Failure::default(),
            block_failure: Failure::default(),
            report_failure: Failure::default(),
            load_hold: Hold::new(),
            conversation_hold: Hold::new(),
            toggle_hold: Hold::new(),
            report_hold: Hold::new(),
            profile_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            toggle_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            report_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_available(&self, supporters: Vec<Supporter>) {
        *self.available.lock().unwrap() = supporters;
    }

    pub fn set_profile(&self, profile: Option<Supporter>) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn publish(&self, snapshot: PresenceSnapshot) {
        let _ = self.presence.send(snapshot);
    }

    pub fn subscriber_count(&self) -> usize {
        self.presence.receiver_count()
    }

    pub fn fail_next_load(&self, msg: &str) {
        self.load_failure.arm(msg);
    }

    pub fn fail_next_profile(&self, msg: &str) {
        self.profile_failure.arm(msg);
    }

    pub fn fail_next_start(&self, msg: &str) {
        self.start_failure.arm(msg);
    }

    pub fn fail_next_toggle(&self, msg: &str) {
        self.toggle_failure.arm(msg);
    }

    pub fn fail_next_block(&self, msg: &str) {
        self.block_failure.arm(msg);
    }

    pub fn fail_next_report(&self, msg: &str) {
        self.report_failure.arm(msg);
    }

    /// Parked pulls return the list as it was when they were issued.
    pub fn hold_loads(&self) {
        self.load_hold.armed.store(true, Ordering::Release);
    }

    pub fn release_loads(&self, n: usize) {
        self.load_hold.permits.add_permits(n);
    }

    pub fn hold_reports(&self) {
        self.report_hold.armed.store(true, Ordering::Release);
    }

    pub fn release_reports(&self, n: usize) {
        self.report_hold.permits.add_permits(n);
    }

    pub fn hold_conversations(&self) {
        self.conversation_hold.armed.store(true, Ordering::Release);
    }

    pub fn release_conversations(&self, n: usize) {
        self.conversation_hold.permits.add_permits(n);
    }

    pub fn hold_toggles(&self) {
        self.toggle_hold.armed.store(true, Ordering::Release);
    }

    pub fn release_toggles(&self, n: usize) {
        self.toggle_hold.permits.add_permits(n);
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn toggle_calls(&self) -> usize {
        self.toggle_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    pub fn blocked(&self) -> Vec<Uuid> {
        self.blocked.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<ReportUserRequest> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl SupporterService for MockBackend {
    async fn get_available_supporters(&self) -> Result<Vec<Supporter>, ServiceError> {
        let available = self.available.lock().unwrap().clone();
        self.load_hold.wait().await;
        self.load_failure.check()?;
        Ok(available)
    }

    async fn get_my_profile(&self) -> Result<Option<Supporter>, ServiceError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile_failure.check()?;
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn register(&self, fields: ProfileFields) -> Result<(), ServiceError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let mut profile = self.profile.lock().unwrap();
        if profile.is_some() {
            return Err(ServiceError::Conflict("already registered".into()));
        }

        let mut me = supporter(&fields.display_name);
        me.user_id = self.seeker_id;
        me.bio = fields.bio;
        me.avatar_url = fields.avatar_url;
        me.training_level = fields.training_level;
        me.topics = fields.topics;
        *profile = Some(me);
        Ok(())
    }

    async fn update_profile(&self, fields: ProfileFields) -> Result<(), ServiceError> {
        let mut profile = self.profile.lock().unwrap();
        let me = profile
            .as_mut()
            .ok_or_else(|| ServiceError::NotFound("no supporter profile".into()))?;
        me.display_name = fields.display_name;
        me.bio = fields.bio;
        me.avatar_url = fields.avatar_url;
        me.training_level = fields.training_level;
        me.topics = fields.topics;
        Ok(())
    }

    async fn toggle_availability(&self) -> Result<(), ServiceError> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        self.toggle_hold.wait().await;
        self.toggle_failure.check()?;
        if let Some(me) = self.profile.lock().unwrap().as_mut() {
            me.is_available = !me.is_available;
        }
        Ok(())
    }
}

impl PresenceService for MockBackend {
    fn subscribe_to_availability(&self) -> broadcast::Receiver<PresenceSnapshot> {
        self.presence.subscribe()
    }
}

#[async_trait]
impl ConversationService for MockBackend {
    async fn get_my_conversations(&self) -> Result<Vec<Conversation>, ServiceError> {
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn start_conversation(&self, supporter_id: Uuid) -> Result<Conversation, ServiceError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.conversation_hold.wait().await;
        self.start_failure.check()?;

        let conversation = Conversation {
            id: Uuid::new_v4(),
            supporter_id,
            seeker_id: self.seeker_id,
            status: ConversationStatus::Active,
            created_at: Utc::now(),
        };
        self.conversations.lock().unwrap().push(conversation.clone());
        Ok(conversation)
    }
}

#[async_trait]
impl BlockService for MockBackend {
    async fn block_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.block_failure.check()?;
        let mut blocked = self.blocked.lock().unwrap();
        if !blocked.contains(&user_id) {
            blocked.push(user_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ReportService for MockBackend {
    async fn report_user(&self, request: ReportUserRequest) -> Result<(), ServiceError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        self.report_hold.wait().await;
        self.report_failure.check()?;
        self.reports.lock().unwrap().push(request);
        Ok(())
    }
}

/// An available supporter with fresh ids.
pub(crate) fn supporter(name: &str) -> Supporter {
    Supporter {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        display_name: name.to_string(),
        bio: None,
        avatar_url: None,
        training_level: TrainingLevel::Peer,
        topics: vec!["general".into()],
        is_available: true,
        last_active_at: Utc::now(),
        total_conversations: 0,
    }
}

pub(crate) fn profile_fields(name: &str) -> ProfileFields {
    ProfileFields {
        display_name: name.to_string(),
        bio: None,
        avatar_url: None,
        training_level: TrainingLevel::Peer,
        topics: Vec::new(),
    }
}

/// Yield to spawned tasks until `cond` holds.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
