//! Scripted interaction driver for dry runs and tests.
//!
//! Each session label (`query-1`, `synthesis`, ...) has a queue of attempt
//! scripts; every `create_session` for that label pops the next one. Labels
//! without a queued script answer with an echo of the query.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::errors::ItemError;
use crate::domain::models::{SessionHandle, SessionId};
use crate::domain::ports::{DriverEvent, EventSink, InteractionDriver, Subscription};

/// Delay between the two snapshots of an echo answer.
const ECHO_STEP: Duration = Duration::from_millis(500);

/// One step of a scripted answer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Pause before the next step
    Wait(Duration),
    /// Emit an answer snapshot
    Changed(String),
    /// Emit a final answer
    Final(String),
    /// Emit a driver error
    Error(String),
    /// Close the stream without an outcome
    Close,
}

/// Behavior of one attempt on a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttemptScript {
    /// Stream a partial then the full echo of the query, then go quiet
    #[default]
    Echo,
    /// Acknowledge, then play the steps and go quiet
    Stream(Vec<ScriptStep>),
    /// Fail session creation with this reason
    FailSessionStart(String),
    /// Never answer PING, not even after install
    Unresponsive,
    /// Ignore PING until installed, then echo
    NeedsInstall,
    /// Input controls missing on the page
    ControlsMissing,
    /// Refuse the submission with this reason
    RejectSubmission(String),
    /// Never acknowledge the submission
    NoAck,
}

impl AttemptScript {
    /// A single snapshot that then goes quiet.
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Stream(vec![ScriptStep::Changed(text.into())])
    }

    /// Acknowledge and never produce an answer.
    pub fn stall() -> Self {
        Self::Stream(vec![])
    }

    /// An answer that keeps growing every `every` for `times` snapshots.
    pub fn churn(every: Duration, times: usize) -> Self {
        let mut text = String::from("The answer keeps changing");
        let mut steps = Vec::with_capacity(times * 2);
        for _ in 0..times {
            text.push('.');
            steps.push(ScriptStep::Changed(text.clone()));
            steps.push(ScriptStep::Wait(every));
        }
        Self::Stream(steps)
    }
}

/// Text the echo script settles on.
pub fn echo_answer(query: &str) -> String {
    format!("Scripted answer to: {query}")
}

#[derive(Debug)]
struct ScriptedSession {
    label: String,
    script: AttemptScript,
    installed: bool,
    closed: CancellationToken,
}

/// In-process driver playing queued scripts, keyed by session label. Labels without a script echo the query.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    scripts: Mutex<HashMap<String, VecDeque<AttemptScript>>>,
    sessions: Mutex<HashMap<SessionId, ScriptedSession>>,
    submissions: Mutex<Vec<(String, String)>>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    installs: AtomicUsize,
    peak_live: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedDriver {
    /// Driver with no scripts queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the script for the next session created with `label`.
    pub fn push_script(&self, label: impl Into<String>, script: AttemptScript) {
        lock(&self.scripts)
            .entry(label.into())
            .or_default()
            .push_back(script);
    }

    /// Sessions opened so far.
    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Sessions destroyed so far.
    pub fn sessions_destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Sessions currently open.
    pub fn live_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Highest number of sessions alive at the same time.
    pub fn peak_live_sessions(&self) -> usize {
        self.peak_live.load(Ordering::SeqCst)
    }

    /// Driver installs requested so far.
    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    /// `(label, query)` of every acknowledged or rejected submission, in order.
    pub fn submissions(&self) -> Vec<(String, String)> {
        lock(&self.submissions).clone()
    }

    /// Labels of the sessions that are still open.
    pub fn live_labels(&self) -> Vec<String> {
        let mut labels: Vec<_> = lock(&self.sessions)
            .values()
            .map(|s| s.label.clone())
            .collect();
        labels.sort();
        labels
    }

    fn session_script(&self, session: &SessionHandle) -> Result<(AttemptScript, bool, CancellationToken), ItemError> {
        lock(&self.sessions)
            .get(&session.id())
            .map(|s| (s.script.clone(), s.installed, s.closed.clone()))
            .ok_or_else(|| ItemError::CommunicationFailure(format!("unknown session {}", session.id())))
    }
}

async fn play(steps: Vec<ScriptStep>, sink: EventSink, closed: CancellationToken) {
    let script = async {
        for step in steps {
            let delivered = match step {
                ScriptStep::Wait(delay) => {
                    tokio::time::sleep(delay).await;
                    true
                }
                ScriptStep::Changed(text) => sink.emit(DriverEvent::AnswerChanged(text)).await,
                ScriptStep::Final(text) => sink.emit(DriverEvent::AnswerFinal(text)).await,
                ScriptStep::Error(message) => sink.emit(DriverEvent::Error(message)).await,
                ScriptStep::Close => return,
            };
            if !delivered {
                return;
            }
        }
        sink.cancelled().await;
    };

    tokio::select! {
        () = script => {}
        () = closed.cancelled() => {}
    }
}

fn echo_steps(query: &str) -> Vec<ScriptStep> {
    let full = echo_answer(query);
    let half: String = full.chars().take(full.chars().count() / 2).collect();
    vec![
        ScriptStep::Changed(half),
        ScriptStep::Wait(ECHO_STEP),
        ScriptStep::Changed(full),
    ]
}

#[async_trait]
impl InteractionDriver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create_session(&self, label: &str) -> Result<SessionHandle, ItemError> {
        let script = lock(&self.scripts)
            .get_mut(label)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        if let AttemptScript::FailSessionStart(reason) = &script {
            return Err(ItemError::SessionCreationFailed(reason.clone()));
        }

        let handle = SessionHandle::new(label);
        let installed = !matches!(script, AttemptScript::NeedsInstall | AttemptScript::Unresponsive);
        let live = {
            let mut sessions = lock(&self.sessions);
            sessions.insert(
                handle.id(),
                ScriptedSession {
                    label: label.to_string(),
                    script,
                    installed,
                    closed: CancellationToken::new(),
                },
            );
            sessions.len()
        };
        self.created.fetch_add(1, Ordering::SeqCst);
        self.peak_live.fetch_max(live, Ordering::SeqCst);
        debug!(session = %handle.id(), label, "scripted session created");
        Ok(handle)
    }

    async fn ping(&self, session: &SessionHandle) -> Result<(), ItemError> {
        let (_, installed, _) = self.session_script(session)?;
        if !installed {
            // no PONG; the caller's timeout decides
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn install(&self, session: &SessionHandle) -> Result<(), ItemError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        let mut sessions = lock(&self.sessions);
        let entry = sessions
            .get_mut(&session.id())
            .ok_or_else(|| ItemError::CommunicationFailure(format!("unknown session {}", session.id())))?;
        if entry.script != AttemptScript::Unresponsive {
            entry.installed = true;
        }
        Ok(())
    }

    async fn submit_query(&self, session: &SessionHandle, query: &str) -> Result<Subscription, ItemError> {
        let (script, _, closed) = self.session_script(session)?;
        lock(&self.submissions).push((session.label().to_string(), query.to_string()));

        let steps = match script {
            AttemptScript::Echo | AttemptScript::NeedsInstall => echo_steps(query),
            AttemptScript::Stream(steps) => steps,
            AttemptScript::ControlsMissing => {
                return Err(ItemError::InteractionUnavailable("input controls not found".to_string()))
            }
            AttemptScript::RejectSubmission(reason) => return Err(ItemError::SubmissionRejected(reason)),
            AttemptScript::NoAck => {
                std::future::pending::<()>().await;
                return Err(ItemError::CommunicationFailure("no acknowledgement".to_string()));
            }
            AttemptScript::FailSessionStart(_) | AttemptScript::Unresponsive => {
                return Err(ItemError::InteractionUnavailable("page is not responding".to_string()))
            }
        };

        let (sink, subscription) = Subscription::channel(16);
        tokio::spawn(play(steps, sink, closed));
        Ok(subscription)
    }

    async fn destroy_session(&self, session: SessionHandle) -> Result<(), ItemError> {
        if let Some(entry) = lock(&self.sessions).remove(&session.id()) {
            entry.closed.cancel();
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            debug!(session = %session.id(), label = %entry.label, "scripted session destroyed");
        }
        Ok(())
    }
}
