use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical display order for supporter topic tags.
/// Tags not listed here render after these, in lexical order.
pub const TOPIC_ORDER: &[&str] = &[
    "general",
    "stress",
    "anxiety",
    "low_mood",
    "work",
    "relationships",
    "bereavement",
    "burnout",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingLevel {
    Peer,
    Trained,
    MhfaCertified,
}

impl TrainingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Peer => "peer",
            Self::Trained => "trained",
            Self::MhfaCertified => "mhfa_certified",
        }
    }
}

impl fmt::Display for TrainingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peer" => Ok(Self::Peer),
            "trained" => Ok(Self::Trained),
            "mhfa_certified" => Ok(Self::MhfaCertified),
            other => Err(format!("unknown training level: {}", other)),
        }
    }
}

/// A volunteer listener. Never hard-deleted; deactivation clears `is_available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supporter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub training_level: TrainingLevel,
    /// Stored unordered; use [`Supporter::ordered_topics`] for display.
    pub topics: Vec<String>,
    pub is_available: bool,
    pub last_active_at: DateTime<Utc>,
    pub total_conversations: u32,
}

impl Supporter {
    /// Topic tags de-duplicated and sorted into [`TOPIC_ORDER`].
    pub fn ordered_topics(&self) -> Vec<&str> {
        let unique: BTreeSet<&str> = self.topics.iter().map(String::as_str).collect();

        let mut ordered: Vec<&str> = TOPIC_ORDER
            .iter()
            .copied()
            .filter(|topic| unique.contains(topic))
            .collect();
        ordered.extend(unique.into_iter().filter(|topic| !TOPIC_ORDER.contains(topic)));
        ordered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Ended,
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            other => Err(format!("unknown conversation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub supporter_id: Uuid,
    /// The user who asked to talk.
    pub seeker_id: Uuid,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Harassment,
    Inappropriate,
    Spam,
    Other,
}

impl ReportReason {
    pub const ALL: [ReportReason; 4] = [
        Self::Harassment,
        Self::Inappropriate,
        Self::Spam,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harassment => "harassment",
            Self::Inappropriate => "inappropriate",
            Self::Spam => "spam",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == s)
            .ok_or_else(|| format!("unknown report reason: {}", s))
    }
}
