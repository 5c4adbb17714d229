//! Property tests for the bounded retry budget.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use multi_answer::adapters::drivers::{AttemptScript, ScriptedDriver};
use multi_answer::adapters::error_log::InMemoryErrorLog;
use multi_answer::services::ItemWorker;
use multi_answer::{ErrorLog, FailureReporter, Item, ItemState, RetryPolicy, WorkerSettings};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Run one worker whose first `failures` attempts fail to start a session.
fn run_worker(max_retries: u32, failures: u32) -> (Item, u32, usize) {
    paused_runtime().block_on(async {
        let driver = Arc::new(ScriptedDriver::new());
        for _ in 0..failures {
            driver.push_script("query-1", AttemptScript::FailSessionStart("no tab".into()));
        }
        let log = Arc::new(InMemoryErrorLog::default());
        let reporter = FailureReporter::new(log.clone(), Arc::new(common::RecordingNotifier::default()));
        let settings = WorkerSettings {
            policy: RetryPolicy::new(max_retries),
            ..common::settings()
        };

        let (worker, _rx) = ItemWorker::new(Item::new(0, "question"), driver, reporter, settings);
        let outcome = worker.run().await;
        let logged = log.entries().await.unwrap().len();
        (outcome.item, outcome.attempts, logged)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_attempts_never_exceed_budget(max_retries in 1u32..=5, failures in 0u32..=8) {
        let (item, attempts, logged) = run_worker(max_retries, failures);

        prop_assert!(attempts <= max_retries + 1);
        prop_assert!(item.retry_count <= max_retries);
        prop_assert!(item.is_terminal());

        if failures <= max_retries {
            prop_assert_eq!(item.state, ItemState::Succeeded);
            prop_assert_eq!(attempts, failures + 1);
            prop_assert_eq!(item.retry_count, failures);
            prop_assert_eq!(logged, 0);
        } else {
            prop_assert_eq!(item.state, ItemState::Failed);
            prop_assert_eq!(attempts, max_retries + 1);
            prop_assert_eq!(item.retry_count, max_retries);
            prop_assert_eq!(logged, 1);
        }
    }
}
