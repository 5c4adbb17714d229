//! Domain errors for batch orchestration.

use std::time::Duration;

use thiserror::Error;

use super::models::{BatchId, ItemState};

/// Failure of a single attempt to obtain an answer.
///
/// Every variant is local to one item and retryable up to the retry policy's
/// limit; none of them is fatal to the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    /// The driver could not open a ready session
    #[error("Session creation failed: {0}")]
    SessionCreationFailed(String),

    /// The page-side driver never answered a ping, even after reinstall
    #[error("Interaction unavailable: {0}")]
    InteractionUnavailable(String),

    /// The remote side refused the query
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// No quiet window before the detector deadline
    #[error("Answer did not stabilize within {timeout:?}")]
    StabilityTimeout {
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// Transport or protocol failure between driver and session
    #[error("Communication failure: {0}")]
    CommunicationFailure(String),

    /// The settled answer was shorter than the configured minimum
    #[error("Answer too short: {len} chars (minimum {min})")]
    EmptyAnswer {
        /// Characters in the settled answer
        len: usize,
        /// Configured minimum
        min: usize,
    },
}

impl ItemError {
    /// Stable machine-readable name of the error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreationFailed(_) => "session_creation_failed",
            Self::InteractionUnavailable(_) => "interaction_unavailable",
            Self::SubmissionRejected(_) => "submission_rejected",
            Self::StabilityTimeout { .. } => "stability_timeout",
            Self::CommunicationFailure(_) => "communication_failure",
            Self::EmptyAnswer { .. } => "empty_answer",
        }
    }
}

/// Rejection reasons for a batch request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Too few or too many queries
    #[error("Expected between {min} and {max} queries, got {actual}")]
    QueryCount {
        /// Queries in the request
        actual: usize,
        /// Smallest accepted count
        min: usize,
        /// Largest accepted count
        max: usize,
    },

    /// A query is blank after trimming
    #[error("Query {number} is empty")]
    EmptyQuery {
        /// One-based position of the blank query
        number: usize,
    },

    /// Prompt is blank after trimming
    #[error("Integration prompt is empty")]
    EmptyPrompt,

    /// Prompt longer than the character limit
    #[error("Integration prompt is {len} characters long (limit {max})")]
    PromptTooLong {
        /// Prompt length in characters
        len: usize,
        /// Character limit
        max: usize,
    },
}

/// Errors surfaced by the batch controller.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Another batch holds the single-flight slot
    #[error("Batch {0} is still running")]
    AlreadyRunning(BatchId),

    /// The request failed validation
    #[error("Invalid batch request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// The synthesis session exhausted its retry budget
    #[error("Synthesis failed after {attempts} attempts: {source}")]
    SynthesisFailed {
        /// Attempts made, including the first
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: ItemError,
    },

    /// The coordinator task ended without a report
    #[error("Batch {0} stopped before producing a result")]
    Aborted(BatchId),
}

/// Result alias for batch controller operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Attempted item state change that the lifecycle does not allow.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid item state transition from {from} to {to}")]
pub struct InvalidTransition {
    /// State the item was in
    pub from: ItemState,
    /// State that was requested
    pub to: ItemState,
}
