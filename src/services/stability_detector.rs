//! Change-stability detection for streamed answers.
//!
//! The remote interface never says "done"; an answer is considered complete
//! once its text has stopped changing for a quiet interval. Both timers live
//! inside the awaiting future and the subscription is consumed by it, so when
//! `await_stable` returns nothing is left pending.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::domain::errors::ItemError;
use crate::domain::models::StabilityConfig;
use crate::domain::ports::{DriverEvent, Subscription};

/// Resolves a subscription to its stable answer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityDetector {
    quiet_interval: Duration,
    timeout: Duration,
    min_chars: usize,
}

impl StabilityDetector {
    /// Detector that settles after `quiet_interval` without change and gives up after `timeout`.
    pub const fn new(quiet_interval: Duration, timeout: Duration) -> Self {
        Self {
            quiet_interval,
            timeout,
            min_chars: 0,
        }
    }

    /// Detector from the `stability` config section.
    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(
            Duration::from_millis(config.quiet_interval_ms),
            Duration::from_secs(config.timeout_secs),
        )
        .with_min_chars(config.min_answer_chars)
    }

    /// Ignore snapshots shorter than `min_chars` (placeholder text).
    #[must_use]
    pub const fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    /// Time without change that counts as stable.
    pub const fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }

    /// Overall deadline for one answer.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_substantive(&self, text: &str) -> bool {
        !text.is_empty() && text.chars().count() >= self.min_chars
    }

    /// Wait until the answer stops changing for the quiet interval.
    ///
    /// Settles exactly once:
    /// - `Ok(text)` when the quiet timer fires or the driver sends a final answer
    /// - `StabilityTimeout` when the overall budget runs out first
    /// - `SubmissionRejected` when the driver reports an error
    /// - `CommunicationFailure` when the stream closes without an outcome
    pub async fn await_stable(&self, mut subscription: Subscription) -> Result<String, ItemError> {
        let deadline = sleep(self.timeout);
        tokio::pin!(deadline);
        let quiet = sleep(self.quiet_interval);
        tokio::pin!(quiet);

        let mut armed = false;
        let mut last_text = String::new();

        loop {
            tokio::select! {
                biased;

                () = &mut quiet, if armed => {
                    debug!(chars = last_text.chars().count(), "answer stable");
                    return Ok(last_text);
                }

                () = &mut deadline => {
                    debug!(timeout = ?self.timeout, "answer did not stabilize");
                    return Err(ItemError::StabilityTimeout { timeout: self.timeout });
                }

                event = subscription.next() => match event {
                    Some(DriverEvent::AnswerChanged(text)) => {
                        let text = text.trim();
                        if text == last_text || !self.is_substantive(text) {
                            trace!("ignoring unchanged or trivial snapshot");
                            continue;
                        }
                        last_text = text.to_string();
                        quiet.as_mut().reset(Instant::now() + self.quiet_interval);
                        armed = true;
                        trace!(chars = last_text.chars().count(), "answer changed");
                    }
                    Some(DriverEvent::AnswerFinal(text)) => {
                        let text = text.trim();
                        if !self.is_substantive(text) {
                            return Err(ItemError::EmptyAnswer {
                                len: text.chars().count(),
                                min: self.min_chars,
                            });
                        }
                        debug!("driver reported final answer");
                        return Ok(text.to_string());
                    }
                    Some(DriverEvent::Error(message)) => {
                        return Err(ItemError::SubmissionRejected(message));
                    }
                    None => {
                        return Err(ItemError::CommunicationFailure(
                            "answer stream closed before the answer stabilized".to_string(),
                        ));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::EventSink;

    const Q: Duration = Duration::from_secs(3);
    const T: Duration = Duration::from_secs(60);

    fn changed(text: &str) -> DriverEvent {
        DriverEvent::AnswerChanged(text.to_string())
    }

    async fn emit_after(sink: &EventSink, delay: Duration, event: DriverEvent) {
        tokio::time::sleep(delay).await;
        sink.emit(event).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_with_last_text_after_silence() {
        let detector = StabilityDetector::new(Q, T);
        let (sink, subscription) = Subscription::channel(8);
        let started = Instant::now();

        let feeder = tokio::spawn(async move {
            emit_after(&sink, Duration::ZERO, changed("a")).await;
            emit_after(&sink, Duration::from_secs(1), changed("ab")).await;
            emit_after(&sink, Duration::from_secs(1), changed("ab")).await;
            sink.cancelled().await;
        });

        let result = detector.await_stable(subscription).await;
        assert_eq!(result, Ok("ab".to_string()));
        // duplicate at t=2s must not re-arm the quiet timer armed at t=1s
        assert_eq!(started.elapsed(), Duration::from_secs(1) + Q);
        feeder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_change_times_out_once() {
        let detector = StabilityDetector::new(Q, T);
        let (sink, subscription) = Subscription::channel(8);
        let started = Instant::now();

        let feeder = tokio::spawn(async move {
            let mut text = String::from("x");
            while sink.emit(changed(&text)).await {
                tokio::time::sleep(Q / 2).await;
                text.push('x');
            }
            sink.is_cancelled()
        });

        let result = detector.await_stable(subscription).await;
        assert_eq!(result, Err(ItemError::StabilityTimeout { timeout: T }));
        assert_eq!(started.elapsed(), T);
        assert!(feeder.await.unwrap(), "subscription torn down on settle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_snapshots_never_arm_quiet_timer() {
        let detector = StabilityDetector::new(Q, Duration::from_secs(10)).with_min_chars(10);
        let (sink, subscription) = Subscription::channel(8);

        let feeder = tokio::spawn(async move {
            sink.emit(changed("Loading")).await;
            sink.cancelled().await;
        });

        let result = detector.await_stable(subscription).await;
        assert!(matches!(result, Err(ItemError::StabilityTimeout { .. })));
        feeder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_answer_short_circuits() {
        let detector = StabilityDetector::new(Q, T);
        let (sink, subscription) = Subscription::channel(8);
        let started = Instant::now();

        sink.emit(changed("partial")).await;
        sink.emit(DriverEvent::AnswerFinal("  complete answer ".into())).await;

        let result = detector.await_stable(subscription).await;
        assert_eq!(result, Ok("complete answer".to_string()));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trivial_final_answer_rejected() {
        let detector = StabilityDetector::new(Q, T).with_min_chars(20);
        let (sink, subscription) = Subscription::channel(8);
        sink.emit(DriverEvent::AnswerFinal("tiny".into())).await;

        let result = detector.await_stable(subscription).await;
        assert_eq!(result, Err(ItemError::EmptyAnswer { len: 4, min: 20 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_error_rejects() {
        let detector = StabilityDetector::new(Q, T);
        let (sink, subscription) = Subscription::channel(8);
        sink.emit(DriverEvent::Error("input box not found".into())).await;

        let result = detector.await_stable(subscription).await;
        assert_eq!(
            result,
            Err(ItemError::SubmissionRejected("input box not found".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_is_communication_failure() {
        let detector = StabilityDetector::new(Q, T);
        let (sink, subscription) = Subscription::channel(8);
        drop(sink);

        let result = detector.await_stable(subscription).await;
        assert!(matches!(result, Err(ItemError::CommunicationFailure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_after_resolution_have_no_effect() {
        let detector = StabilityDetector::new(Q, T);
        let (sink, subscription) = Subscription::channel(8);
        sink.emit(changed("stable answer")).await;

        let result = detector.await_stable(subscription).await;
        assert_eq!(result, Ok("stable answer".to_string()));

        assert!(sink.is_cancelled());
        assert!(!sink.emit(changed("stable answer")).await);
        assert!(!sink.emit(changed("something new")).await);
    }
}
