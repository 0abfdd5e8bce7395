use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use solace_types::{ReportReason, ReportUserRequest};

use crate::error::{Error, Result, ValidationError};
use crate::profile::BusyGuard;
use crate::services::{BlockService, ReportService};

pub const MAX_REPORT_NOTES_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockOptions {
    /// Open a report against the same user once the block is confirmed.
    pub then_report: bool,
    /// Conversation the block was issued from, carried into the chained report.
    pub conversation_id: Option<Uuid>,
}

/// Work queued behind a confirmed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Report {
        user_id: Uuid,
        conversation_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOutcome {
    pub blocked_user_id: Uuid,
    pub follow_up: Option<FollowUp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPhase {
    Closed,
    Editing,
    Submitting,
    Confirmed,
}

/// Local form state of the report dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDialog {
    phase: ReportPhase,
    target: Option<Uuid>,
    conversation_id: Option<Uuid>,
    reason: Option<ReportReason>,
    notes: String,
}

impl Default for ReportDialog {
    fn default() -> Self {
        Self {
            phase: ReportPhase::Closed,
            target: None,
            conversation_id: None,
            reason: None,
            notes: String::new(),
        }
    }
}

impl ReportDialog {
    pub fn open(target: Uuid, conversation_id: Option<Uuid>) -> Self {
        Self {
            phase: ReportPhase::Editing,
            target: Some(target),
            conversation_id,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> ReportPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase != ReportPhase::Closed
    }

    pub fn target(&self) -> Option<Uuid> {
        self.target
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    pub fn reason(&self) -> Option<ReportReason> {
        self.reason
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn select_reason(&mut self, reason: ReportReason) {
        self.reason = Some(reason);
    }

    /// Input past the cap is cut off, like a `maxlength` field.
    pub fn set_notes(&mut self, text: &str) {
        self.notes = text.chars().take(MAX_REPORT_NOTES_CHARS).collect();
    }

    pub fn remaining_note_chars(&self) -> usize {
        MAX_REPORT_NOTES_CHARS.saturating_sub(self.notes.chars().count())
    }

    /// Build the outgoing request, or say why the form cannot be sent.
    pub fn request(&self) -> std::result::Result<ReportUserRequest, ValidationError> {
        let target = match (self.phase, self.target) {
            (ReportPhase::Editing, Some(target)) => target,
            _ => return Err(ValidationError::NoReportOpen),
        };
        let reason = self.reason.ok_or(ValidationError::MissingReportReason)?;

        let len = self.notes.chars().count();
        if len > MAX_REPORT_NOTES_CHARS {
            return Err(ValidationError::NotesTooLong {
                len,
                max: MAX_REPORT_NOTES_CHARS,
            });
        }
        let notes = self.notes.trim();

        Ok(ReportUserRequest {
            reported_user_id: target,
            conversation_id: self.conversation_id,
            reason,
            additional_notes: (!notes.is_empty()).then(|| notes.to_string()),
        })
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Block and report flows for one viewer. The two flows are independent;
/// the only link is the optional report queued behind a block.
pub struct ModerationGate {
    viewer: Uuid,
    blocks: Arc<dyn BlockService>,
    reports: Arc<dyn ReportService>,
    confirmation: Duration,
    block_busy: AtomicBool,
    report_busy: AtomicBool,
    follow_up: Mutex<Option<FollowUp>>,
}

impl ModerationGate {
    pub fn new(
        viewer: Uuid,
        blocks: Arc<dyn BlockService>,
        reports: Arc<dyn ReportService>,
        confirmation: Duration,
    ) -> Self {
        Self {
            viewer,
            blocks,
            reports,
            confirmation,
            block_busy: AtomicBool::new(false),
            report_busy: AtomicBool::new(false),
            follow_up: Mutex::new(None),
        }
    }

    pub async fn block_user(&self, user_id: Uuid, options: BlockOptions) -> Result<BlockOutcome> {
        if user_id == self.viewer {
            return Err(ValidationError::SelfTarget.into());
        }
        let _busy = begin(&self.block_busy, "block")?;

        self.blocks.block_user(user_id).await.map_err(|e| {
            warn!(%user_id, "block failed: {}", e);
            Error::from(e)
        })?;
        info!(%user_id, "user blocked");

        // Queued only now, after the backend confirmed the block.
        let follow_up = options.then_report.then_some(FollowUp::Report {
            user_id,
            conversation_id: options.conversation_id,
        });
        *self.follow_up_slot() = follow_up;

        Ok(BlockOutcome {
            blocked_user_id: user_id,
            follow_up,
        })
    }

    pub fn pending_follow_up(&self) -> Option<FollowUp> {
        *self.follow_up_slot()
    }

    /// Consume the queued follow-up and open the report dialog it asks for.
    pub fn take_follow_up(&self) -> Option<ReportDialog> {
        self.follow_up_slot().take().map(dialog_for)
    }

    /// Open the dialog for the follow-up a particular block returned.
    ///
    /// A later block may have queued its own follow-up in the meantime; that
    /// one stays pending. Returns `None` only if the queue was cancelled.
    pub fn open_follow_up(&self, follow_up: FollowUp) -> Option<ReportDialog> {
        let mut slot = self.follow_up_slot();
        match *slot {
            None => None,
            Some(pending) if pending == follow_up => {
                slot.take();
                Some(dialog_for(follow_up))
            }
            Some(_) => Some(dialog_for(follow_up)),
        }
    }

    pub fn cancel_follow_up(&self) {
        self.follow_up_slot().take();
    }

    /// Validate and send the report. On success the dialog shows its
    /// confirmation; on failure it stays editable with the input intact.
    pub async fn submit_report(&self, dialog: &mut ReportDialog) -> Result<ReportUserRequest> {
        let request = dialog.request()?;
        if request.reported_user_id == self.viewer {
            return Err(ValidationError::SelfTarget.into());
        }
        let _busy = begin(&self.report_busy, "report")?;

        let mut submission = Submission::begin(dialog);
        match self.reports.report_user(request.clone()).await {
            Ok(()) => {
                info!(
                    reported_user_id = %request.reported_user_id,
                    reason = %request.reason,
                    "report submitted"
                );
                submission.settled = ReportPhase::Confirmed;
                Ok(request)
            }
            Err(e) => {
                warn!(reported_user_id = %request.reported_user_id, "report failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Hold the confirmation for its display interval, then clear the form and close.
    pub async fn finish_report(&self, dialog: &mut ReportDialog) {
        if dialog.phase == ReportPhase::Confirmed {
            tokio::time::sleep(self.confirmation).await;
        }
        dialog.reset();
    }

    fn follow_up_slot(&self) -> std::sync::MutexGuard<'_, Option<FollowUp>> {
        self.follow_up.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps the dialog in `Submitting` while a report is in flight. The phase
/// settles on drop, so a submission that is abandoned mid-flight leaves the
/// form editable.
struct Submission<'a> {
    dialog: &'a mut ReportDialog,
    settled: ReportPhase,
}

impl<'a> Submission<'a> {
    fn begin(dialog: &'a mut ReportDialog) -> Self {
        dialog.phase = ReportPhase::Submitting;
        Self {
            dialog,
            settled: ReportPhase::Editing,
        }
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        self.dialog.phase = self.settled;
    }
}

fn dialog_for(follow_up: FollowUp) -> ReportDialog {
    match follow_up {
        FollowUp::Report {
            user_id,
            conversation_id,
        } => ReportDialog::open(user_id, conversation_id),
    }
}

fn begin<'a>(flag: &'a AtomicBool, action: &'static str) -> Result<BusyGuard<'a>> {
    if flag.swap(true, std::sync::atomic::Ordering::AcqRel) {
        return Err(Error::ModerationInFlight { action });
    }
    Ok(BusyGuard(flag))
}
