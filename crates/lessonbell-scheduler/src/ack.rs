//! Acknowledgment handling for "did you attend?" replies.

use std::sync::Arc;

use lessonbell_core::error::Result;
use lessonbell_core::traits::ScheduleStore;
use lessonbell_core::types::LessonId;
use lessonbell_security::{CorrelationSigner, DENY_SENTINEL, InvalidToken, VISIT_ACTION};
use tracing::{info, warn};

/// Result of handling one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Attendance recorded now.
    Confirmed(LessonId),
    /// A valid token for a lesson that was already marked.
    AlreadyRecorded(LessonId),
    /// The "did not attend" reply. Nothing is stored.
    Denied,
    Rejected(AckRejection),
}

/// Why a reply changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckRejection {
    InvalidToken(InvalidToken),
    /// Token was genuine but the lesson is gone.
    UnknownLesson(LessonId),
}

/// Whether callback data belongs to the acknowledgment flow.
pub fn is_ack_data(data: &str) -> bool {
    data == DENY_SENTINEL
        || data
            .strip_prefix(VISIT_ACTION)
            .is_some_and(|rest| rest.starts_with(':'))
}

/// Verifies reply tokens and applies the attendance mark.
pub struct AckHandler {
    store: Arc<dyn ScheduleStore>,
    signer: CorrelationSigner,
}

impl AckHandler {
    pub fn new(store: Arc<dyn ScheduleStore>, signer: CorrelationSigner) -> Self {
        Self { store, signer }
    }

    /// Handle one reply. Forged or corrupted tokens never reach the store;
    /// `Err` is reserved for store failures.
    pub async fn handle(&self, data: &str) -> Result<AckOutcome> {
        if data == DENY_SENTINEL {
            info!("🙅 Admin reported a missed lesson");
            return Ok(AckOutcome::Denied);
        }

        let id = match self.signer.verify(data) {
            Ok(id) => id,
            Err(reason) => {
                warn!("🚫 Rejected acknowledgment token: {reason}");
                return Ok(AckOutcome::Rejected(AckRejection::InvalidToken(reason)));
            }
        };

        let Some(record) = self.store.lesson_by_id(id).await? else {
            warn!("Acknowledgment for unknown lesson #{id}");
            return Ok(AckOutcome::Rejected(AckRejection::UnknownLesson(id)));
        };
        if record.attended {
            return Ok(AckOutcome::AlreadyRecorded(id));
        }
        if !self.store.set_attended(id, true).await? {
            return Ok(AckOutcome::Rejected(AckRejection::UnknownLesson(id)));
        }
        info!("✅ Attendance recorded for lesson #{id} '{}'", record.name);
        Ok(AckOutcome::Confirmed(id))
    }
}
