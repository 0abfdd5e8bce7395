use uuid::Uuid;

/// Failure reported by a backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Input rejected locally, before any service call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("display name is required")]
    MissingDisplayName,

    #[error("display name is too long ({len} > {max} characters)")]
    DisplayNameTooLong { len: usize, max: usize },

    #[error("bio is too long ({len} > {max} characters)")]
    BioTooLong { len: usize, max: usize },

    #[error("a report reason must be selected")]
    MissingReportReason,

    #[error("notes are too long ({len} > {max} characters)")]
    NotesTooLong { len: usize, max: usize },

    #[error("no report is open")]
    NoReportOpen,

    #[error("cannot target your own account")]
    SelfTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("already connecting to supporter {pending}")]
    ConnectInFlight { pending: Uuid },

    #[error("a profile update is already in progress")]
    ProfileBusy,

    #[error("a {action} is already in progress")]
    ModerationInFlight { action: &'static str },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl Error {
    /// Busy rejections leave no trace upstream; the caller simply waits.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::ConnectInFlight { .. } | Self::ProfileBusy | Self::ModerationInFlight { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_display() {
        let err = ServiceError::Network("timeout".into());
        assert_eq!(err.to_string(), "network error: timeout");

        let err = ServiceError::Forbidden("blocked".into());
        assert_eq!(err.to_string(), "forbidden: blocked");
    }

    #[test]
    fn validation_converts_transparently() {
        let err: Error = ValidationError::MissingReportReason.into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "a report reason must be selected");
    }

    #[test]
    fn busy_classification() {
        assert!(Error::ProfileBusy.is_busy());
        assert!(Error::ConnectInFlight { pending: Uuid::nil() }.is_busy());
        assert!(!Error::NotLoggedIn.is_busy());
        assert!(!Error::Service(ServiceError::Backend("x".into())).is_busy());
    }
}
