//! Synthesis dispatcher - combines the batch answers into one request.

use std::sync::Arc;

use tracing::{info, instrument};

use super::failure_reporter::FailureReporter;
use super::item_worker::{ItemWorker, SessionDisposition, WorkerSettings};
use crate::domain::errors::{BatchError, ItemError};
use crate::domain::models::{Batch, Item, SessionHandle};
use crate::domain::ports::InteractionDriver;

/// Placeholder for items that never produced an answer.
pub const UNAVAILABLE: &str = "unavailable";

/// Build the combined prompt: one `Answer i:` block per item in index order,
/// then the integration prompt.
pub fn build_synthesis_prompt(answers: &[Option<&str>], integration_prompt: &str) -> String {
    let mut blocks: Vec<String> = answers
        .iter()
        .enumerate()
        .map(|(i, answer)| format!("Answer {}: {}", i + 1, answer.unwrap_or(UNAVAILABLE)))
        .collect();
    blocks.push(integration_prompt.to_string());
    blocks.join("\n\n")
}

/// Result of a successful synthesis run.
#[derive(Debug)]
pub struct SynthesisOutcome {
    /// Prompt that was submitted
    pub prompt: String,
    /// Stable synthesized answer
    pub answer: String,
    /// Session left open so the user can keep reading or follow up
    pub session: SessionHandle,
    /// Attempts made, first included
    pub attempts: u32,
}

/// Submits the combined answers once the barrier has released.
#[derive(Clone)]
pub struct SynthesisDispatcher {
    driver: Arc<dyn InteractionDriver>,
    reporter: FailureReporter,
    settings: WorkerSettings,
}

impl SynthesisDispatcher {
    /// Dispatcher that reuses the batch's driver and worker settings.
    pub fn new(
        driver: Arc<dyn InteractionDriver>,
        reporter: FailureReporter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            driver,
            reporter,
            settings,
        }
    }

    /// Run the synthesis request for a batch whose items are all terminal.
    ///
    /// Uses the same protocol and retry policy as an item, under index
    /// `items.len()`, and keeps the session open on success.
    #[instrument(skip(self, batch), fields(batch_id = %batch.id))]
    pub async fn dispatch(&self, batch: &Batch) -> Result<SynthesisOutcome, BatchError> {
        let prompt = build_synthesis_prompt(&batch.answers(), &batch.integration_prompt);
        let item = Item::new(batch.items.len(), prompt.clone());

        let (worker, _updates) = ItemWorker::new(
            item,
            self.driver.clone(),
            self.reporter.clone(),
            self.settings,
        );
        let outcome = worker
            .named("synthesis", "Synthesis")
            .with_disposition(SessionDisposition::Retain)
            .run()
            .await;

        let attempts = outcome.attempts;
        match (outcome.item.answer, outcome.session, outcome.error) {
            (Some(answer), Some(session), _) => {
                info!(attempts, "synthesis complete");
                Ok(SynthesisOutcome {
                    prompt,
                    answer,
                    session,
                    attempts,
                })
            }
            (_, _, Some(source)) => Err(BatchError::SynthesisFailed { attempts, source }),
            _ => Err(BatchError::SynthesisFailed {
                attempts,
                source: ItemError::CommunicationFailure(
                    "synthesis finished without an answer".to_string(),
                ),
            }),
        }
    }
}

impl std::fmt::Debug for SynthesisDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisDispatcher")
            .field("driver", &self.driver.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_orders_answers_by_index() {
        let prompt = build_synthesis_prompt(&[Some("A1"), Some("A2"), Some("A3")], "Combine.");
        assert_eq!(
            prompt,
            "Answer 1: A1\n\nAnswer 2: A2\n\nAnswer 3: A3\n\nCombine."
        );
    }

    #[test]
    fn test_missing_answers_are_unavailable() {
        let prompt = build_synthesis_prompt(&[Some("A1"), None, Some("A3")], "P");
        assert_eq!(
            prompt,
            "Answer 1: A1\n\nAnswer 2: unavailable\n\nAnswer 3: A3\n\nP"
        );
    }
}
