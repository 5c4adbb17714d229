//! Batch controller - single-flight admission, concurrent workers, barrier,
//! and the synthesis trigger.
//!
//! ```text
//! start_batch ──► validate ──► claim slot ──► spawn N workers
//!                                               │ (JoinSet)
//!                                               ▼
//!                           barrier: every item terminal
//!                                               │ release slot
//!                                               ▼
//!                                  synthesis (exactly once)
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, instrument, warn};

use super::failure_reporter::FailureReporter;
use super::item_worker::{ItemOutcome, ItemWorker, WorkerSettings};
use super::synthesis::{SynthesisDispatcher, SynthesisOutcome};
use crate::domain::errors::{BatchError, BatchResult, ItemError};
use crate::domain::models::query::duplicate_queries;
use crate::domain::models::{
    Batch, BatchId, BatchRequest, BatchState, ControlMessage, ControlResponse, Item,
    SessionHandle,
};
use crate::domain::ports::InteractionDriver;

/// Everything a finished batch produced.
#[derive(Debug)]
pub struct BatchReport {
    /// Batch with every item in its terminal state
    pub batch: Batch,
    /// Synthesized answer and its live session
    pub synthesis: SynthesisOutcome,
}

/// Caller's view of a running batch.
#[derive(Debug)]
pub struct BatchHandle {
    id: BatchId,
    items: Vec<watch::Receiver<Item>>,
    state: watch::Receiver<BatchState>,
    join: Option<JoinHandle<BatchResult<BatchReport>>>,
}

impl BatchHandle {
    /// Id of the batch.
    pub const fn id(&self) -> BatchId {
        self.id
    }

    /// Latest published snapshot of every item, in index order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.iter().map(|rx| rx.borrow().clone()).collect()
    }

    /// Per-item update channels, for callers that render progress.
    pub fn item_updates(&self) -> &[watch::Receiver<Item>] {
        &self.items
    }

    /// Current batch state.
    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    /// Resolve once the barrier has released (synthesis may still be running).
    pub async fn barrier(&mut self) -> BatchState {
        let released = match self
            .state
            .wait_for(|state| *state == BatchState::Completed)
            .await
        {
            Ok(state) => Some(*state),
            Err(_) => None,
        };
        released.unwrap_or_else(|| *self.state.borrow())
    }

    /// Wait for the batch, including synthesis, to finish.
    pub async fn wait(&mut self) -> BatchResult<BatchReport> {
        let Some(join) = self.join.take() else {
            return Err(BatchError::Aborted(self.id));
        };
        match join.await {
            Ok(result) => result,
            Err(e) => {
                error!(batch_id = %self.id, error = %e, "Batch coordinator stopped");
                Err(BatchError::Aborted(self.id))
            }
        }
    }
}

/// Holds the single-flight slot; clears it when dropped.
struct ActiveSlot {
    slot: Arc<Mutex<Option<BatchId>>>,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Admits one batch at a time and runs it to synthesis.
pub struct BatchController {
    driver: Arc<dyn InteractionDriver>,
    reporter: FailureReporter,
    settings: WorkerSettings,
    active: Arc<Mutex<Option<BatchId>>>,
}

impl BatchController {
    /// Controller with no batch running.
    pub fn new(
        driver: Arc<dyn InteractionDriver>,
        reporter: FailureReporter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            driver,
            reporter,
            settings,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Id of the batch currently holding the single-flight slot.
    pub fn running_batch(&self) -> Option<BatchId> {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, id: BatchId) -> BatchResult<ActiveSlot> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = *active {
            return Err(BatchError::AlreadyRunning(running));
        }
        *active = Some(id);
        Ok(ActiveSlot {
            slot: self.active.clone(),
        })
    }

    /// Validate and admit a batch, launching one worker per query.
    ///
    /// Rejected with [`BatchError::AlreadyRunning`] while another batch is
    /// running; the running batch is not touched.
    #[instrument(skip_all, fields(queries = request.queries.len()))]
    pub fn start_batch(&self, request: BatchRequest) -> BatchResult<BatchHandle> {
        request.validate()?;

        let duplicates = duplicate_queries(&request.queries);
        if !duplicates.is_empty() {
            let numbers: Vec<usize> = duplicates.iter().map(|i| i + 1).collect();
            warn!(?numbers, "Batch contains duplicate queries");
        }

        let mut batch = Batch::new(request);
        let slot = self.claim(batch.id)?;
        batch.start();
        info!(batch_id = %batch.id, items = batch.items.len(), "Batch started");

        let (state_tx, state_rx) = watch::channel(batch.state);
        let mut workers = Vec::with_capacity(batch.items.len());
        let mut receivers = Vec::with_capacity(batch.items.len());
        for item in &batch.items {
            let (worker, rx) = ItemWorker::new(
                item.clone(),
                self.driver.clone(),
                self.reporter.clone(),
                self.settings,
            );
            workers.push(worker);
            receivers.push(rx);
        }

        let coordinator = Coordinator {
            batch,
            receivers: receivers.clone(),
            state: state_tx,
            driver: self.driver.clone(),
            reporter: self.reporter.clone(),
            synthesis: SynthesisDispatcher::new(
                self.driver.clone(),
                self.reporter.clone(),
                self.settings,
            ),
        };
        let id = coordinator.batch.id;
        let join = tokio::spawn(coordinator.run(workers, slot));

        Ok(BatchHandle {
            id,
            items: receivers,
            state: state_rx,
            join: Some(join),
        })
    }

    /// Serve one control message.
    pub fn handle_message(&self, message: ControlMessage) -> (ControlResponse, Option<BatchHandle>) {
        match self.start_batch(message.into_request()) {
            Ok(handle) => (ControlResponse::Ok { batch_id: handle.id() }, Some(handle)),
            Err(e) => {
                warn!(error = %e, "Rejected control message");
                (
                    ControlResponse::Error {
                        message: e.to_string(),
                    },
                    None,
                )
            }
        }
    }
}

impl std::fmt::Debug for BatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchController")
            .field("driver", &self.driver.name())
            .field("running", &self.running_batch())
            .finish_non_exhaustive()
    }
}

/// Task that owns a running batch from launch to synthesis.
struct Coordinator {
    batch: Batch,
    receivers: Vec<watch::Receiver<Item>>,
    state: watch::Sender<BatchState>,
    driver: Arc<dyn InteractionDriver>,
    reporter: FailureReporter,
    synthesis: SynthesisDispatcher,
}

impl Coordinator {
    #[instrument(skip_all, fields(batch_id = %self.batch.id))]
    async fn run(mut self, workers: Vec<ItemWorker>, slot: ActiveSlot) -> BatchResult<BatchReport> {
        let mut set = JoinSet::new();
        for worker in workers {
            set.spawn(worker.run());
        }

        let mut finished: Vec<Option<ItemOutcome>> =
            std::iter::repeat_with(|| None).take(self.batch.items.len()).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    let index = outcome.item.index;
                    finished[index] = Some(outcome);
                }
                Err(e) => error!(error = %e, "Item worker stopped unexpectedly"),
            }
        }

        for (index, outcome) in finished.into_iter().enumerate() {
            self.batch.items[index] = match outcome {
                Some(outcome) => outcome.item,
                None => self.abandoned(index).await,
            };
        }

        self.batch.complete();
        self.state.send_replace(self.batch.state);
        drop(slot);
        info!(
            succeeded = self.batch.succeeded_count(),
            failed = self.batch.failed_count(),
            "Barrier released"
        );

        let synthesis = self.synthesis.dispatch(&self.batch).await?;
        Ok(BatchReport {
            batch: self.batch,
            synthesis,
        })
    }

    /// Terminal snapshot for a worker that never returned an outcome.
    async fn abandoned(&self, index: usize) -> Item {
        let mut item = self.receivers[index].borrow().clone();
        if item.is_terminal() {
            return item;
        }
        let err = ItemError::CommunicationFailure("worker stopped unexpectedly".to_string());
        if let Err(e) = item.fail_attempt(&err) {
            error!(error = %e, item = index, "Could not mark abandoned item failed");
        }

        let session = item.detach_session();
        if let Some(id) = session {
            let handle = SessionHandle::reclaim(id, format!("query-{}", item.number()));
            if let Err(e) = self.driver.destroy_session(handle).await {
                warn!(session = %id, error = %e, "Failed to destroy abandoned session");
            }
        }

        self.reporter
            .report(index, &format!("Query {}", item.number()), session, &err)
            .await;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::drivers::{AttemptScript, ScriptedDriver};
    use crate::adapters::error_log::InMemoryErrorLog;
    use crate::adapters::notify::TracingNotifier;
    use crate::domain::errors::ValidationError;
    use crate::domain::models::RetryPolicy;
    use crate::domain::ports::{ErrorLog, Subscription};
    use async_trait::async_trait;

    /// Scripted driver whose query submissions crash the calling worker.
    struct CrashOnQuery(Arc<ScriptedDriver>);

    #[async_trait]
    impl InteractionDriver for CrashOnQuery {
        fn name(&self) -> &'static str {
            "crash-on-query"
        }

        async fn create_session(&self, label: &str) -> Result<SessionHandle, ItemError> {
            self.0.create_session(label).await
        }

        async fn ping(&self, session: &SessionHandle) -> Result<(), ItemError> {
            self.0.ping(session).await
        }

        async fn install(&self, session: &SessionHandle) -> Result<(), ItemError> {
            self.0.install(session).await
        }

        async fn submit_query(
            &self,
            session: &SessionHandle,
            query: &str,
        ) -> Result<Subscription, ItemError> {
            assert!(!session.label().starts_with("query-"), "worker crashed");
            self.0.submit_query(session, query).await
        }

        async fn destroy_session(&self, session: SessionHandle) -> Result<(), ItemError> {
            self.0.destroy_session(session).await
        }
    }

    fn controller(driver: &Arc<ScriptedDriver>) -> BatchController {
        let reporter = FailureReporter::new(
            Arc::new(InMemoryErrorLog::default()),
            Arc::new(TracingNotifier),
        );
        let settings = WorkerSettings {
            policy: RetryPolicy::new(1),
            ..WorkerSettings::default()
        };
        BatchController::new(driver.clone(), reporter, settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_invalid_request() {
        let driver = Arc::new(ScriptedDriver::new());
        let err = controller(&driver)
            .start_batch(BatchRequest::new(["only one"], "combine"))
            .unwrap_err();
        assert!(matches!(
            err,
            BatchError::InvalidRequest(ValidationError::QueryCount { actual: 1, .. })
        ));
        assert_eq!(driver.sessions_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_released_after_barrier() {
        let driver = Arc::new(ScriptedDriver::new());
        let controller = controller(&driver);

        let mut handle = controller
            .start_batch(BatchRequest::new(["Q1", "Q2"], "combine"))
            .unwrap();
        assert_eq!(controller.running_batch(), Some(handle.id()));
        assert_eq!(handle.state(), BatchState::Running);

        let report = handle.wait().await.unwrap();
        assert_eq!(report.batch.state, BatchState::Completed);
        assert_eq!(controller.running_batch(), None);

        let next = controller.start_batch(BatchRequest::new(["Q3", "Q4"], "combine"));
        assert!(next.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_worker_session_is_destroyed() {
        let scripted = Arc::new(ScriptedDriver::new());
        let log = Arc::new(InMemoryErrorLog::default());
        let reporter = FailureReporter::new(log.clone(), Arc::new(TracingNotifier));
        let settings = WorkerSettings {
            policy: RetryPolicy::new(1),
            ..WorkerSettings::default()
        };
        let controller =
            BatchController::new(Arc::new(CrashOnQuery(scripted.clone())), reporter, settings);

        let mut handle = controller
            .start_batch(BatchRequest::new(["Q1", "Q2"], "combine"))
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.batch.failed_count(), 2);
        assert!(report.batch.items.iter().all(|item| item.session.is_none()));
        assert_eq!(scripted.sessions_destroyed(), 2);
        assert!(scripted
            .live_labels()
            .iter()
            .all(|label| !label.starts_with("query-")));

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.session_ref.is_some()));
        assert_eq!(controller.running_batch(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_message_reports_rejection() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.push_script("query-1", AttemptScript::stall());
        let controller = controller(&driver);

        let message = ControlMessage::StartBatch {
            queries: vec!["Q1".into(), "Q2".into()],
            integration_prompt: "combine".into(),
        };
        let (first, handle) = controller.handle_message(message.clone());
        assert!(first.is_ok());
        let handle = handle.unwrap();

        let (second, none) = controller.handle_message(message);
        assert!(none.is_none());
        match second {
            ControlResponse::Error { message } => {
                assert!(message.contains(&handle.id().to_string()));
            }
            ControlResponse::Ok { .. } => panic!("second batch must be rejected"),
        }
    }
}
