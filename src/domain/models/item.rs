//! Item domain model.
//!
//! An item is one query's end-to-end processing unit within a batch. It is
//! owned by exactly one worker; everyone else sees published snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;
use super::session::SessionId;
use crate::domain::errors::{InvalidTransition, ItemError};

/// Processing state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Waiting for a session
    Queued,
    /// Session requested, not ready yet
    SessionStarting,
    /// Query handed to the driver, waiting for acknowledgement
    QuerySubmitted,
    /// Answer is streaming; waiting for it to stop changing
    AwaitingStability,
    /// Stable answer captured
    Succeeded,
    /// Attempt failed; terminal once the retry budget is spent
    Failed,
}

impl Default for ItemState {
    fn default() -> Self {
        Self::Queued
    }
}

impl ItemState {
    /// Lowercase name used in logs and JSON output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::SessionStarting => "session_starting",
            Self::QuerySubmitted => "query_submitted",
            Self::AwaitingStability => "awaiting_stability",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Queued => vec![Self::SessionStarting, Self::Failed],
            Self::SessionStarting => vec![Self::QuerySubmitted, Self::Failed],
            Self::QuerySubmitted => vec![Self::AwaitingStability, Self::Failed],
            Self::AwaitingStability => vec![Self::Succeeded, Self::Failed],
            Self::Succeeded => vec![],
            Self::Failed => vec![Self::Queued], // retry edge
        }
    }

    /// True if `new_state` is one of [`Self::valid_transitions`].
    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query and everything learned while answering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Zero-based position in the batch
    pub index: usize,

    /// Query text; retries always resubmit this
    pub query: String,

    /// Session currently owned for this item, if any
    pub session: Option<SessionId>,

    /// Retries consumed so far
    pub retry_count: u32,

    /// Current lifecycle state
    pub state: ItemState,

    /// Stable answer, present only once `Succeeded`
    pub answer: Option<String>,

    /// Message of the most recent failed attempt
    pub last_error: Option<String>,

    /// Last time any field changed
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Queued item with no session.
    pub fn new(index: usize, query: impl Into<String>) -> Self {
        Self {
            index,
            query: query.into(),
            session: None,
            retry_count: 0,
            state: ItemState::Queued,
            answer: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// One-based number used in user-facing text.
    pub const fn number(&self) -> usize {
        self.index + 1
    }

    /// Move to `new_state` if the lifecycle allows it.
    pub fn transition_to(&mut self, new_state: ItemState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(new_state) {
            return Err(InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the session this attempt runs on.
    pub fn attach_session(&mut self, session: SessionId) {
        self.session = Some(session);
        self.updated_at = Utc::now();
    }

    /// Forget the session and return it, if any.
    pub fn detach_session(&mut self) -> Option<SessionId> {
        self.updated_at = Utc::now();
        self.session.take()
    }

    /// Record the captured answer and move to `Succeeded`.
    pub fn succeed(&mut self, answer: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition_to(ItemState::Succeeded)?;
        self.answer = Some(answer.into());
        self.last_error = None;
        Ok(())
    }

    /// Record a failed attempt. Whether it is terminal depends on the policy.
    pub fn fail_attempt(&mut self, error: &ItemError) -> Result<(), InvalidTransition> {
        self.transition_to(ItemState::Failed)?;
        self.last_error = Some(error.to_string());
        Ok(())
    }

    /// Check if the item can take the retry edge under `policy`.
    pub const fn can_retry(&self, policy: RetryPolicy) -> bool {
        matches!(self.state, ItemState::Failed) && policy.allows_retry(self.retry_count)
    }

    /// Increment the retry count and return to `Queued`.
    pub fn requeue(&mut self, policy: RetryPolicy) -> Result<(), InvalidTransition> {
        if !self.can_retry(policy) {
            return Err(InvalidTransition {
                from: self.state,
                to: ItemState::Queued,
            });
        }
        self.transition_to(ItemState::Queued)?;
        self.retry_count += 1;
        Ok(())
    }

    /// Succeeded, or failed with no retry left.
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True once a stable answer was captured.
    pub const fn is_succeeded(&self) -> bool {
        matches!(self.state, ItemState::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timeout() -> ItemError {
        ItemError::StabilityTimeout {
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut item = Item::new(0, "Q1");
        item.transition_to(ItemState::SessionStarting).unwrap();
        item.transition_to(ItemState::QuerySubmitted).unwrap();
        item.transition_to(ItemState::AwaitingStability).unwrap();
        item.succeed("A1").unwrap();

        assert!(item.is_terminal());
        assert_eq!(item.answer.as_deref(), Some("A1"));
        assert!(item.state.valid_transitions().is_empty());
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut item = Item::new(0, "Q1");
        let err = item.transition_to(ItemState::AwaitingStability).unwrap_err();
        assert_eq!(err.from, ItemState::Queued);
        assert_eq!(err.to, ItemState::AwaitingStability);
        assert_eq!(item.state, ItemState::Queued);
    }

    #[test]
    fn test_requeue_keeps_query_text() {
        let policy = RetryPolicy::new(3);
        let mut item = Item::new(1, "first question");
        item.transition_to(ItemState::SessionStarting).unwrap();
        item.fail_attempt(&timeout()).unwrap();
        item.requeue(policy).unwrap();

        assert_eq!(item.state, ItemState::Queued);
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.query, "first question");
        assert!(item.last_error.is_some());
    }

    #[test]
    fn test_requeue_refused_when_budget_spent() {
        let policy = RetryPolicy::new(1);
        let mut item = Item::new(0, "Q");
        item.fail_attempt(&timeout()).unwrap();
        item.requeue(policy).unwrap();
        item.fail_attempt(&timeout()).unwrap();

        assert!(!item.can_retry(policy));
        assert!(item.requeue(policy).is_err());
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.state, ItemState::Failed);
    }

    #[test]
    fn test_succeeded_item_cannot_fail() {
        let mut item = Item::new(0, "Q");
        item.transition_to(ItemState::SessionStarting).unwrap();
        item.transition_to(ItemState::QuerySubmitted).unwrap();
        item.transition_to(ItemState::AwaitingStability).unwrap();
        item.succeed("answer").unwrap();
        assert!(item.fail_attempt(&timeout()).is_err());
    }

    #[test]
    fn test_number_is_one_based() {
        assert_eq!(Item::new(0, "Q").number(), 1);
        assert_eq!(Item::new(4, "Q").number(), 5);
    }
}
