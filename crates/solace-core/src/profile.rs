use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use solace_types::ProfileFields;

use crate::error::{Error, Result, ValidationError};
use crate::services::SupporterService;

pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_BIO_CHARS: usize = 500;

/// The caller's own supporter profile: registration, edits and the
/// availability switch.
///
/// Nothing is applied locally. Each mutation waits for the backend, and the
/// hub reloads the profile afterwards, so the switch always mirrors what is
/// actually published.
pub struct ProfileController {
    service: Arc<dyn SupporterService>,
    busy: AtomicBool,
}

impl ProfileController {
    pub fn new(service: Arc<dyn SupporterService>) -> Self {
        Self {
            service,
            busy: AtomicBool::new(false),
        }
    }

    /// Drives the busy indicator on the availability control.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn toggle_availability(&self) -> Result<()> {
        let _busy = self.begin()?;

        self.service.toggle_availability().await.map_err(|e| {
            warn!("availability toggle failed: {}", e);
            Error::from(e)
        })?;
        info!("availability toggled");
        Ok(())
    }

    pub async fn register(&self, fields: ProfileFields) -> Result<()> {
        let fields = validate_profile(fields)?;
        let _busy = self.begin()?;

        self.service.register(fields).await.map_err(|e| {
            warn!("supporter registration failed: {}", e);
            Error::from(e)
        })?;
        info!("registered as supporter");
        Ok(())
    }

    pub async fn update_profile(&self, fields: ProfileFields) -> Result<()> {
        let fields = validate_profile(fields)?;
        let _busy = self.begin()?;

        self.service.update_profile(fields).await.map_err(|e| {
            warn!("profile update failed: {}", e);
            Error::from(e)
        })?;
        info!("supporter profile updated");
        Ok(())
    }

    fn begin(&self) -> Result<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(Error::ProfileBusy);
        }
        Ok(BusyGuard(&self.busy))
    }
}

pub(crate) struct BusyGuard<'a>(pub(crate) &'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Trim and check profile fields before they leave the client.
pub fn validate_profile(mut fields: ProfileFields) -> std::result::Result<ProfileFields, ValidationError> {
    fields.display_name = fields.display_name.trim().to_string();
    if fields.display_name.is_empty() {
        return Err(ValidationError::MissingDisplayName);
    }
    let len = fields.display_name.chars().count();
    if len > MAX_DISPLAY_NAME_CHARS {
        return Err(ValidationError::DisplayNameTooLong {
            len,
            max: MAX_DISPLAY_NAME_CHARS,
        });
    }

    fields.bio = non_blank(fields.bio);
    if let Some(bio) = &fields.bio {
        let len = bio.chars().count();
        if len > MAX_BIO_CHARS {
            return Err(ValidationError::BioTooLong {
                len,
                max: MAX_BIO_CHARS,
            });
        }
    }

    fields.avatar_url = non_blank(fields.avatar_url);

    let mut topics: Vec<String> = fields
        .topics
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    topics.sort();
    topics.dedup();
    fields.topics = topics;

    Ok(fields)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, profile_fields, wait_until};
    use solace_types::TrainingLevel;

    #[tokio::test]
    async fn concurrent_toggle_is_rejected_while_busy() {
        let backend = MockBackend::new();
        backend.hold_toggles();
        let controller = Arc::new(ProfileController::new(backend.clone()));

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.toggle_availability().await }
        });
        wait_until(|| controller.is_busy()).await;

        assert_eq!(controller.toggle_availability().await, Err(Error::ProfileBusy));

        backend.release_toggles(1);
        first.await.unwrap().unwrap();
        assert!(!controller.is_busy());
        assert_eq!(backend.toggle_calls(), 1);
    }

    #[tokio::test]
    async fn failed_toggle_clears_busy() {
        let backend = MockBackend::new();
        let controller = ProfileController::new(backend.clone());

        backend.fail_next_toggle("server unavailable");
        assert!(controller.toggle_availability().await.is_err());
        assert!(!controller.is_busy());

        controller.toggle_availability().await.unwrap();
        assert_eq!(backend.toggle_calls(), 2);
    }

    #[tokio::test]
    async fn registration_without_name_never_reaches_backend() {
        let backend = MockBackend::new();
        let controller = ProfileController::new(backend.clone());

        let err = controller.register(profile_fields("   ")).await.unwrap_err();
        assert_eq!(err, Error::Validation(ValidationError::MissingDisplayName));
        assert_eq!(backend.register_calls(), 0);
        assert!(!controller.is_busy());
    }

    #[test]
    fn validation_normalises_fields() {
        let mut fields = profile_fields("  Robin ");
        fields.bio = Some("   ".into());
        fields.avatar_url = Some(" https://example.org/a.png ".into());
        fields.topics = vec!["Stress".into(), " work".into(), "stress".into(), "".into()];

        let fields = validate_profile(fields).unwrap();
        assert_eq!(fields.display_name, "Robin");
        assert_eq!(fields.bio, None);
        assert_eq!(fields.avatar_url.as_deref(), Some("https://example.org/a.png"));
        assert_eq!(fields.topics, vec!["stress", "work"]);
        assert_eq!(fields.training_level, TrainingLevel::Peer);
    }

    #[test]
    fn validation_caps_lengths() {
        let fields = profile_fields(&"x".repeat(MAX_DISPLAY_NAME_CHARS + 1));
        assert!(matches!(
            validate_profile(fields),
            Err(ValidationError::DisplayNameTooLong { .. })
        ));

        let mut fields = profile_fields("Robin");
        fields.bio = Some("é".repeat(MAX_BIO_CHARS));
        assert!(validate_profile(fields).is_ok());

        let mut fields = profile_fields("Robin");
        fields.bio = Some("é".repeat(MAX_BIO_CHARS + 1));
        assert_eq!(
            validate_profile(fields),
            Err(ValidationError::BioTooLong {
                len: MAX_BIO_CHARS + 1,
                max: MAX_BIO_CHARS
            })
        );
    }
}
