use std::rc::Rc;

use chrono::Local;

use crate::notice::Notice;
use crate::session::CompletionReport;
use crate::store::{ProgressStore, SessionRecord};

/// Result of handing a finished session to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Saved,
    /// Anonymous practice: nothing to save against
    SkippedAnonymous,
    Failed(String),
}

impl ReportOutcome {
    /// The notice to show for this outcome, if any
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ReportOutcome::Saved => None,
            ReportOutcome::SkippedAnonymous => {
                Some(Notice::info("Playing anonymously, progress is not saved"))
            }
            ReportOutcome::Failed(reason) => Some(Notice::warning(format!(
                "Your progress was not saved: {reason}"
            ))),
        }
    }
}

/// Persists completed sessions for the current user
pub struct CompletionReporter {
    user_id: Option<String>,
    store: Rc<dyn ProgressStore>,
}

impl CompletionReporter {
    pub fn new(user_id: Option<String>, store: Rc<dyn ProgressStore>) -> Self {
        Self { user_id, store }
    }

    pub fn report(&self, report: &CompletionReport) -> ReportOutcome {
        let Some(user_id) = self.user_id.as_deref() else {
            tracing::debug!(song_id = %report.song_id, "anonymous session, skipping save");
            return ReportOutcome::SkippedAnonymous;
        };

        let record = SessionRecord {
            user_id: user_id.to_string(),
            song_id: report.song_id.clone(),
            wpm: report.wpm,
            accuracy: report.accuracy,
            completed_at: Local::now(),
        };

        match self.store.record_session(&record) {
            Ok(()) => {
                tracing::info!(user_id, song_id = %record.song_id, "progress saved");
                ReportOutcome::Saved
            }
            Err(err) => {
                tracing::warn!(user_id, song_id = %record.song_id, "saving progress failed: {err}");
                ReportOutcome::Failed(err.to_string())
            }
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

impl std::fmt::Debug for CompletionReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionReporter")
            .field("user_id", &self.user_id)
            .finish()
    }
}
