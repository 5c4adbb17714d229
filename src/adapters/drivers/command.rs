//! Command interaction driver.
//!
//! Spawns one helper process per session and talks to it with JSON lines
//! over stdin/stdout. The helper owns the page mechanics (opening a tab,
//! finding the input box, reading the answer); this side only routes
//! replies and answer snapshots.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::domain::errors::ItemError;
use crate::domain::models::{DriverConfig, SessionHandle, SessionId};
use crate::domain::ports::{DriverEvent, EventSink, InteractionDriver, Subscription};

/// Environment variable carrying the session label to the helper.
pub const SESSION_LABEL_ENV: &str = "MULTI_ANSWER_SESSION";

/// Host → helper messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage<'a> {
    /// Liveness check, answered with `PONG`
    Ping,
    /// (Re)install the page-side driver
    Install,
    /// Submit a query
    SendQuery {
        /// Query text
        text: &'a str,
    },
    /// Stop streaming the current answer
    Cancel,
}

/// Helper → host messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HelperMessage {
    /// Session is open and usable
    Ready,
    /// Reply to `PING`
    Pong,
    /// Reply to `INSTALL`
    Installed,
    /// The query was accepted
    Ack,
    /// The query was refused
    Rejected {
        /// Helper's explanation
        reason: String,
    },
    /// Input controls could not be found
    Unavailable {
        /// Helper's explanation
        reason: String,
    },
    /// Latest full answer text
    AnswerChanged {
        /// Answer so far
        text: String,
    },
    /// The helper knows the answer is complete
    AnswerFinal {
        /// Complete answer
        text: String,
    },
    /// The helper gave up on the query
    Error {
        /// Helper's explanation
        message: String,
    },
}

impl HelperMessage {
    /// Answer-stream messages go to the subscription; the rest are replies.
    fn into_event(self) -> std::result::Result<DriverEvent, Self> {
        match self {
            Self::AnswerChanged { text } => Ok(DriverEvent::AnswerChanged(text)),
            Self::AnswerFinal { text } => Ok(DriverEvent::AnswerFinal(text)),
            Self::Error { message } => Ok(DriverEvent::Error(message)),
            other => Err(other),
        }
    }
}

/// Parse one line of helper output. Blank and malformed lines are skipped.
pub fn parse_helper_line(line: &str) -> Option<HelperMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(error = %e, line = trimmed, "Ignoring unparseable helper output");
            None
        }
    }
}

type AnswerSlot = Arc<StdMutex<Option<EventSink>>>;

/// One running helper process.
struct HelperSession {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    replies: Mutex<mpsc::Receiver<HelperMessage>>,
    answers: AnswerSlot,
    reader: JoinHandle<()>,
}

impl HelperSession {
    async fn send(&self, message: &HostMessage<'_>) -> Result<(), ItemError> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| ItemError::CommunicationFailure(format!("encode failed: {e}")))?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ItemError::CommunicationFailure(format!("helper stdin closed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| ItemError::CommunicationFailure(format!("helper stdin closed: {e}")))
    }

    /// Next reply accepted by `accept`; stale replies from earlier requests
    /// are skipped.
    async fn reply(&self, accept: impl Fn(&HelperMessage) -> bool) -> Option<HelperMessage> {
        let mut replies = self.replies.lock().await;
        while let Some(reply) = replies.recv().await {
            if accept(&reply) {
                return Some(reply);
            }
            trace!(?reply, "skipping stale helper reply");
        }
        None
    }

    fn set_answer_sink(&self, sink: Option<EventSink>) {
        *self.answers.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

/// Route helper stdout: answers to the current subscription, everything
/// else to the reply channel. Ends on EOF, which closes both.
async fn read_helper(stdout: ChildStdout, replies: mpsc::Sender<HelperMessage>, answers: AnswerSlot) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(message) = parse_helper_line(&line) else {
            continue;
        };
        match message.into_event() {
            Ok(event) => {
                let sink = answers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match sink {
                    Some(sink) => {
                        sink.emit(event).await;
                    }
                    None => trace!("answer event with no subscriber"),
                }
            }
            Err(reply) => {
                if replies.send(reply).await.is_err() {
                    break;
                }
            }
        }
    }
    answers.lock().unwrap_or_else(PoisonError::into_inner).take();
}

/// Driver that runs one helper process per session and speaks JSON lines over its stdio.
pub struct CommandDriver {
    program: String,
    args: Vec<String>,
    sessions: RwLock<HashMap<SessionId, Arc<HelperSession>>>,
}

impl CommandDriver {
    /// Driver launching `program` with `args` for every session.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Driver from the `driver` config section. Fails without `driver.command`.
    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        let program = config
            .command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("driver.command must be set to use the command driver"))?;
        Ok(Self::new(program, config.args.clone()))
    }

    async fn session(&self, handle: &SessionHandle) -> Result<Arc<HelperSession>, ItemError> {
        self.sessions
            .read()
            .await
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| ItemError::CommunicationFailure(format!("unknown session {}", handle.id())))
    }

    fn spawn_helper(&self, label: &str) -> Result<HelperSession, ItemError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(SESSION_LABEL_ENV, label)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ItemError::SessionCreationFailed(format!("failed to spawn {}: {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ItemError::SessionCreationFailed("failed to capture helper stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ItemError::SessionCreationFailed("failed to capture helper stdout".to_string()))?;

        let (reply_tx, reply_rx) = mpsc::channel(16);
        let answers: AnswerSlot = Arc::new(StdMutex::new(None));
        let reader = tokio::spawn(read_helper(stdout, reply_tx, answers.clone()));

        Ok(HelperSession {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            replies: Mutex::new(reply_rx),
            answers,
            reader,
        })
    }
}

impl std::fmt::Debug for CommandDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDriver")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InteractionDriver for CommandDriver {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn create_session(&self, label: &str) -> Result<SessionHandle, ItemError> {
        let session = self.spawn_helper(label)?;

        match session.reply(|m| matches!(m, HelperMessage::Ready)).await {
            Some(_) => {}
            None => {
                return Err(ItemError::SessionCreationFailed(
                    "helper exited before reporting READY".to_string(),
                ))
            }
        }

        let handle = SessionHandle::new(label);
        debug!(session = %handle.id(), label, program = %self.program, "helper session ready");
        self.sessions
            .write()
            .await
            .insert(handle.id(), Arc::new(session));
        Ok(handle)
    }

    async fn ping(&self, handle: &SessionHandle) -> Result<(), ItemError> {
        let session = self.session(handle).await?;
        session.send(&HostMessage::Ping).await?;
        session
            .reply(|m| matches!(m, HelperMessage::Pong))
            .await
            .map(|_| ())
            .ok_or_else(|| ItemError::CommunicationFailure("helper exited".to_string()))
    }

    async fn install(&self, handle: &SessionHandle) -> Result<(), ItemError> {
        let session = self.session(handle).await?;
        session.send(&HostMessage::Install).await?;
        session
            .reply(|m| matches!(m, HelperMessage::Installed))
            .await
            .map(|_| ())
            .ok_or_else(|| ItemError::CommunicationFailure("helper exited".to_string()))
    }

    async fn submit_query(&self, handle: &SessionHandle, query: &str) -> Result<Subscription, ItemError> {
        let session = self.session(handle).await?;

        let (sink, subscription) = Subscription::channel(32);
        session.set_answer_sink(Some(sink));
        session.send(&HostMessage::SendQuery { text: query }).await?;

        let reply = session
            .reply(|m| {
                matches!(
                    m,
                    HelperMessage::Ack | HelperMessage::Rejected { .. } | HelperMessage::Unavailable { .. }
                )
            })
            .await;

        match reply {
            Some(HelperMessage::Ack) => Ok(subscription),
            Some(HelperMessage::Rejected { reason }) => {
                session.set_answer_sink(None);
                Err(ItemError::SubmissionRejected(reason))
            }
            Some(HelperMessage::Unavailable { reason }) => {
                session.set_answer_sink(None);
                Err(ItemError::InteractionUnavailable(reason))
            }
            _ => Err(ItemError::CommunicationFailure(
                "helper exited before acknowledging the query".to_string(),
            )),
        }
    }

    async fn destroy_session(&self, handle: SessionHandle) -> Result<(), ItemError> {
        let Some(session) = self.sessions.write().await.remove(&handle.id()) else {
            return Ok(());
        };

        if let Err(e) = session.send(&HostMessage::Cancel).await {
            trace!(error = %e, "helper gone before CANCEL");
        }
        session.set_answer_sink(None);
        session.reader.abort();

        let mut child = session.child.lock().await;
        if let Err(e) = child.kill().await {
            warn!(session = %handle.id(), error = %e, "Failed to kill helper process");
        }
        debug!(session = %handle.id(), label = handle.label(), "helper session destroyed");
        Ok(())
    }
}
