use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ReportReason, TrainingLevel};

// -- Supporter profile --

/// Fields submitted by the Become-Supporter flow and by profile edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFields {
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub training_level: TrainingLevel,
    #[serde(default)]
    pub topics: Vec<String>,
}

// -- Moderation --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportUserRequest {
    pub reported_user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub reason: ReportReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_request_omits_absent_notes() {
        let req = ReportUserRequest {
            reported_user_id: Uuid::nil(),
            conversation_id: None,
            reason: ReportReason::Harassment,
            additional_notes: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["reason"], "harassment");
        assert!(json.get("additional_notes").is_none());
        assert!(json.get("conversation_id").is_none());
    }

    #[test]
    fn profile_fields_reject_unknown_keys() {
        let raw = r#"{"display_name":"Jo","training_level":"peer","karma":9}"#;
        assert!(serde_json::from_str::<ProfileFields>(raw).is_err());

        let raw = r#"{"display_name":"Jo","training_level":"peer"}"#;
        let fields: ProfileFields = serde_json::from_str(raw).unwrap();
        assert!(fields.topics.is_empty());
        assert_eq!(fields.bio, None);
    }
}
