//! Interaction driver port - interface to the remote conversational page.
//!
//! The driver owns every page-specific concern: how a session is opened, how
//! the input and send controls are located, how the answer text is read.
//! The orchestration core only sees sessions, acknowledgements, and a stream
//! of answer snapshots.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use crate::domain::errors::ItemError;
use crate::domain::models::SessionHandle;

/// Events streamed for one submitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// Latest full answer text (not a delta)
    AnswerChanged(String),
    /// The driver knows the answer is complete
    AnswerFinal(String),
    /// The driver gave up on this query
    Error(String),
}

/// Scoped subscription to the answer stream of one session.
///
/// Dropping the subscription is its teardown: the event channel closes and
/// the driver-side cancellation token fires exactly once, so nothing keeps
/// feeding a consumer that has already settled.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<DriverEvent>,
    _teardown: DropGuard,
}

impl Subscription {
    /// Create a connected sink/subscription pair.
    pub fn channel(buffer: usize) -> (EventSink, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let token = CancellationToken::new();
        let sink = EventSink {
            tx,
            cancelled: token.clone(),
        };
        let subscription = Self {
            events: rx,
            _teardown: token.drop_guard(),
        };
        (sink, subscription)
    }

    /// Next event, or `None` once every sink is gone.
    pub async fn next(&mut self) -> Option<DriverEvent> {
        self.events.recv().await
    }
}

/// Driver-side half of a [`Subscription`].
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<DriverEvent>,
    cancelled: CancellationToken,
}

impl EventSink {
    /// Deliver an event. Returns false once the subscriber is gone.
    pub async fn emit(&self, event: DriverEvent) -> bool {
        if self.cancelled.is_cancelled() {
            return false;
        }
        self.tx.send(event).await.is_ok()
    }

    /// True once the subscriber is gone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// Resolves when the subscriber drops its subscription.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancelled.cancelled()
    }
}

/// Port for driving one remote conversational interface.
///
/// Implementations must keep sessions isolated from each other; the caller
/// never uses one session for two items.
#[async_trait]
pub trait InteractionDriver: Send + Sync {
    /// Driver name for logs.
    fn name(&self) -> &'static str;

    /// Open a new isolated session and wait until it reports ready.
    async fn create_session(&self, label: &str) -> Result<SessionHandle, ItemError>;

    /// Liveness probe (PING → PONG).
    async fn ping(&self, session: &SessionHandle) -> Result<(), ItemError>;

    /// (Re)install the page-side driver for a session that stopped answering.
    async fn install(&self, session: &SessionHandle) -> Result<(), ItemError>;

    /// Submit a query; on acknowledgement returns the answer stream.
    async fn submit_query(&self, session: &SessionHandle, query: &str)
        -> Result<Subscription, ItemError>;

    /// Destroy the session. Any subscription on it ends.
    async fn destroy_session(&self, session: SessionHandle) -> Result<(), ItemError>;
}
