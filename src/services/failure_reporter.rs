//! Terminal failure reporting.

use std::sync::Arc;

use tracing::{error, warn};

use crate::domain::errors::ItemError;
use crate::domain::models::{ErrorLogEntry, SessionId};
use crate::domain::ports::{ErrorLog, Notifier};

/// Title used for every failure notification.
pub const NOTIFICATION_TITLE: &str = "multi-answer";

/// Records a terminal failure in the error log and tells the user about it.
///
/// Neither sink may change the outcome of a batch, so failures of the log or
/// the notifier are logged and swallowed.
#[derive(Clone)]
pub struct FailureReporter {
    log: Arc<dyn ErrorLog>,
    notifier: Arc<dyn Notifier>,
}

impl FailureReporter {
    /// Reporter writing to `log` and `notifier`.
    pub fn new(log: Arc<dyn ErrorLog>, notifier: Arc<dyn Notifier>) -> Self {
        Self { log, notifier }
    }

    /// Report one terminal failure: exactly one log entry and one notification.
    ///
    /// `subject` names the failed unit in user-facing text, e.g. `Query 2`.
    pub async fn report(
        &self,
        item_index: usize,
        subject: &str,
        session_ref: Option<SessionId>,
        err: &ItemError,
    ) {
        let message = format!("{subject} failed: {err}");
        error!(item = item_index, kind = err.kind(), "{message}");

        let entry = ErrorLogEntry::new(item_index, message.clone(), session_ref);
        if let Err(e) = self.log.append(entry).await {
            warn!(error = %e, item = item_index, "Failed to append error log entry");
        }

        if let Err(e) = self.notifier.notify(NOTIFICATION_TITLE, &message).await {
            warn!(error = %e, item = item_index, "Failed to deliver failure notification");
        }
    }
}

impl std::fmt::Debug for FailureReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureReporter").finish_non_exhaustive()
    }
}
