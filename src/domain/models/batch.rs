//! Batch aggregate.
//!
//! A batch is one submission of 2..=5 queries plus an integration prompt.
//! It is the only owner of the item array; workers publish snapshots and the
//! controller folds their final state back in at the barrier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::Item;
use super::query::{validate_integration_prompt, validate_queries, MAX_QUERIES};
use crate::domain::errors::ValidationError;

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Created, workers not yet launched
    Pending,
    /// Workers launched
    Running,
    /// Every item reached a terminal state
    Completed,
}

impl BatchState {
    /// Lowercase name used in logs and JSON output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Queries in submission order
    pub queries: Vec<String>,
    /// Instruction appended after the collected answers
    pub integration_prompt: String,
}

impl BatchRequest {
    /// Request from any list of queries. Not validated here.
    pub fn new<I, S>(queries: I, integration_prompt: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queries: queries.into_iter().map(Into::into).collect(),
            integration_prompt: integration_prompt.into(),
        }
    }

    /// The same query submitted `count` times.
    ///
    /// Counts past [`MAX_QUERIES`] stop one above it, enough for
    /// [`Self::validate`] to reject the request.
    pub fn repeated(query: impl Into<String>, count: usize, integration_prompt: impl Into<String>) -> Self {
        let query = query.into();
        let count = count.min(MAX_QUERIES + 1);
        Self::new(std::iter::repeat(query).take(count), integration_prompt)
    }

    /// Check query count, blank queries and prompt length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_queries(&self.queries)?;
        validate_integration_prompt(&self.integration_prompt)
    }
}

/// A running or finished batch and its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Identifier reported to control clients
    pub id: BatchId,
    /// One item per query, index order
    pub items: Vec<Item>,
    /// Instruction for the synthesis step
    pub integration_prompt: String,
    /// When the request was accepted
    pub created_at: DateTime<Utc>,
    /// Lifecycle position, moves forward only
    pub state: BatchState,
    /// Set when the barrier releases
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create a pending batch with one queued item per query.
    pub fn new(request: BatchRequest) -> Self {
        let items = request
            .queries
            .into_iter()
            .enumerate()
            .map(|(index, query)| Item::new(index, query))
            .collect();

        Self {
            id: BatchId::new(),
            items,
            integration_prompt: request.integration_prompt,
            created_at: Utc::now(),
            state: BatchState::Pending,
            completed_at: None,
        }
    }

    /// Pending → Running. Returns false if the batch was not pending.
    pub fn start(&mut self) -> bool {
        if self.state != BatchState::Pending {
            return false;
        }
        self.state = BatchState::Running;
        true
    }

    /// Running → Completed. Returns false if the batch was not running.
    pub fn complete(&mut self) -> bool {
        if self.state != BatchState::Running {
            return false;
        }
        self.state = BatchState::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// True once every item has succeeded or failed.
    pub fn all_terminal(&self) -> bool {
        self.items.iter().all(Item::is_terminal)
    }

    /// Answers in index order; `None` for items without one.
    pub fn answers(&self) -> Vec<Option<&str>> {
        self.items.iter().map(|item| item.answer.as_deref()).collect()
    }

    /// Items that captured an answer.
    pub fn succeeded_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_succeeded()).count()
    }

    /// Items that did not.
    pub fn failed_count(&self) -> usize {
        self.items.len() - self.succeeded_count()
    }
}
