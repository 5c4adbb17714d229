//! Item worker - drives one query through session, submission, and
//! stability detection, with bounded retry.
//!
//! The worker exclusively owns its item and at most one session at a time.
//! Every state change is published on a `watch` channel; nobody else writes
//! the item.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use super::failure_reporter::FailureReporter;
use super::stability_detector::StabilityDetector;
use crate::domain::errors::ItemError;
use crate::domain::models::{Config, Item, ItemState, RetryPolicy, SessionHandle, SessionId};
use crate::domain::ports::InteractionDriver;

/// Timing and retry knobs shared by every worker of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Retry budget per item
    pub policy: RetryPolicy,
    /// Pause before a retry
    pub retry_delay: Duration,
    /// Decides when a streamed answer is final
    pub detector: StabilityDetector,
    /// Deadline for a session to report ready
    pub session_start_timeout: Duration,
    /// Deadline for a PONG
    pub ping_timeout: Duration,
    /// Deadline for a submission acknowledgement
    pub submit_timeout: Duration,
}

impl WorkerSettings {
    /// Settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.retry.policy(),
            retry_delay: config.retry.retry_delay(),
            detector: StabilityDetector::from_config(&config.stability),
            session_start_timeout: Duration::from_secs(config.driver.session_start_timeout_secs),
            ping_timeout: Duration::from_millis(config.driver.ping_timeout_ms),
            submit_timeout: Duration::from_secs(config.driver.submit_timeout_secs),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happens to the session after a successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionDisposition {
    /// Destroy the session once the answer is captured
    #[default]
    Destroy,
    /// Hand the session back to the caller (synthesis)
    Retain,
}

/// Final result of a worker run.
#[derive(Debug)]
pub struct ItemOutcome {
    /// Terminal snapshot of the item
    pub item: Item,
    /// Live session, only with [`SessionDisposition::Retain`] on success
    pub session: Option<SessionHandle>,
    /// Error of the last attempt when the item ended `Failed`
    pub error: Option<ItemError>,
    /// Attempts made, first included
    pub attempts: u32,
}

impl ItemOutcome {
    /// True when the item captured an answer.
    pub const fn is_succeeded(&self) -> bool {
        self.item.is_succeeded()
    }
}

/// Drives one item through attempts on fresh sessions until it is terminal.
pub struct ItemWorker {
    item: Item,
    label: String,
    subject: String,
    disposition: SessionDisposition,
    driver: Arc<dyn InteractionDriver>,
    reporter: FailureReporter,
    settings: WorkerSettings,
    updates: watch::Sender<Item>,
}

impl ItemWorker {
    /// Create a worker for `item` and the receiver its snapshots go to.
    pub fn new(
        item: Item,
        driver: Arc<dyn InteractionDriver>,
        reporter: FailureReporter,
        settings: WorkerSettings,
    ) -> (Self, watch::Receiver<Item>) {
        let (updates, rx) = watch::channel(item.clone());
        let worker = Self {
            label: format!("query-{}", item.number()),
            subject: format!("Query {}", item.number()),
            item,
            disposition: SessionDisposition::Destroy,
            driver,
            reporter,
            settings,
            updates,
        };
        (worker, rx)
    }

    /// Session label handed to the driver and the subject used in failure reports.
    #[must_use]
    pub fn named(mut self, label: impl Into<String>, subject: impl Into<String>) -> Self {
        self.label = label.into();
        self.subject = subject.into();
        self
    }

    /// What to do with the session after a successful attempt.
    #[must_use]
    pub const fn with_disposition(mut self, disposition: SessionDisposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// Run attempts until the item succeeds or the retry budget is spent.
    #[instrument(skip(self), fields(item = self.item.index, label = %self.label))]
    pub async fn run(mut self) -> ItemOutcome {
        let mut last_session: Option<SessionId> = None;

        loop {
            let attempt = self.item.retry_count + 1;
            debug!(attempt, "starting attempt");

            let (session, result) = self.attempt().await;
            if let Some(session) = &session {
                last_session = Some(session.id());
            }

            match result {
                Ok(answer) => {
                    if let Err(e) = self.item.succeed(answer) {
                        error!(error = %e, "worker left the item in an unexpected state");
                    }
                    let session = match (self.disposition, session) {
                        (SessionDisposition::Retain, session) => session,
                        (SessionDisposition::Destroy, Some(session)) => {
                            self.release(session).await;
                            self.item.detach_session();
                            None
                        }
                        (SessionDisposition::Destroy, None) => None,
                    };
                    self.publish();
                    info!(attempt, "item succeeded");
                    return ItemOutcome {
                        item: self.item,
                        session,
                        error: None,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    warn!(attempt, error = %err, "attempt failed");
                    if let Err(e) = self.item.fail_attempt(&err) {
                        error!(error = %e, "worker left the item in an unexpected state");
                    }
                    if let Some(session) = session {
                        self.release(session).await;
                    }
                    self.item.detach_session();

                    if self.item.requeue(self.settings.policy).is_ok() {
                        self.publish();
                        if !self.settings.retry_delay.is_zero() {
                            sleep(self.settings.retry_delay).await;
                        }
                        continue;
                    }

                    self.publish();
                    self.reporter
                        .report(self.item.index, &self.subject, last_session, &err)
                        .await;
                    return ItemOutcome {
                        item: self.item,
                        session: None,
                        error: Some(err),
                        attempts: attempt,
                    };
                }
            }
        }
    }

    /// One attempt on a fresh session. The session, if one was created, is
    /// always handed back so the caller decides its fate.
    async fn attempt(&mut self) -> (Option<SessionHandle>, Result<String, ItemError>) {
        self.advance(ItemState::SessionStarting);

        let session = match timeout(
            self.settings.session_start_timeout,
            self.driver.create_session(&self.label),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return (None, Err(e)),
            Err(_) => {
                return (
                    None,
                    Err(ItemError::SessionCreationFailed(format!(
                        "session not ready within {:?}",
                        self.settings.session_start_timeout
                    ))),
                )
            }
        };
        self.item.attach_session(session.id());
        self.publish();

        let result = self.interact(&session).await;
        (Some(session), result)
    }

    async fn interact(&mut self, session: &SessionHandle) -> Result<String, ItemError> {
        self.ensure_driver(session).await?;

        self.advance(ItemState::QuerySubmitted);
        let submit_timeout = self.settings.submit_timeout;
        let subscription = timeout(
            submit_timeout,
            self.driver.submit_query(session, &self.item.query),
        )
        .await
        .map_err(|_| {
            ItemError::CommunicationFailure(format!(
                "submission not acknowledged within {submit_timeout:?}"
            ))
        })??;

        self.advance(ItemState::AwaitingStability);
        self.settings.detector.await_stable(subscription).await
    }

    /// Liveness probe with a single reinstall.
    async fn ensure_driver(&self, session: &SessionHandle) -> Result<(), ItemError> {
        if self.probe(session).await {
            return Ok(());
        }

        debug!("no response to ping, reinstalling driver");
        match timeout(self.settings.session_start_timeout, self.driver.install(session)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "driver install failed"),
            Err(_) => debug!("driver install timed out"),
        }

        if self.probe(session).await {
            Ok(())
        } else {
            Err(ItemError::InteractionUnavailable(
                "no response to liveness probe after reinstall".to_string(),
            ))
        }
    }

    async fn probe(&self, session: &SessionHandle) -> bool {
        matches!(
            timeout(self.settings.ping_timeout, self.driver.ping(session)).await,
            Ok(Ok(()))
        )
    }

    async fn release(&self, session: SessionHandle) {
        let id = session.id();
        match timeout(
            self.settings.session_start_timeout,
            self.driver.destroy_session(session),
        )
        .await
        {
            Ok(Ok(())) => debug!(session = %id, "session destroyed"),
            Ok(Err(e)) => warn!(session = %id, error = %e, "Failed to destroy session"),
            Err(_) => warn!(session = %id, "Timed out destroying session"),
        }
    }

    fn advance(&mut self, state: ItemState) {
        if let Err(e) = self.item.transition_to(state) {
            error!(error = %e, "worker left the item in an unexpected state");
            return;
        }
        self.publish();
    }

    fn publish(&self) {
        self.updates.send_replace(self.item.clone());
    }
}
