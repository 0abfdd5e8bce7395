//! Database row types. These map directly to SQLite rows and stay
//! independent of the solace-types models.

#[derive(Debug, Clone)]
pub struct SupporterRow {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub training_level: String,
    /// JSON array of topic tags.
    pub topics: String,
    pub is_available: bool,
    pub last_active_at: String,
    pub total_conversations: u32,
}

/// Editable subset of a supporter row.
#[derive(Debug, Clone)]
pub struct ProfileRow<'a> {
    pub display_name: &'a str,
    pub bio: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub training_level: &'a str,
    pub topics: &'a str,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub supporter_id: String,
    pub seeker_id: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: String,
    pub reporter_id: String,
    pub reported_user_id: String,
    pub conversation_id: Option<String>,
    pub reason: String,
    pub additional_notes: Option<String>,
}
