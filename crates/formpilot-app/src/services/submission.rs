//! Per-record submission loop: attempt, classify the failure, and recover
//! with backoff or a resync until the attempt budget runs out.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::Record;
use crate::services::backoff::BackoffController;
use crate::services::collaborators::FormExecutor;
use crate::services::retry::{ExecutorError, RetryAction, classify};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("fatal failure submitting {title}: {source}")]
    Fatal {
        title: String,
        source: ExecutorError,
    },

    #[error("gave up on {title} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        title: String,
        attempts: u32,
        last_error: ExecutorError,
    },
}

/// Submits one record at a time through the executor, sharing a backoff
/// controller across records so overload pressure carries through the run.
pub struct SubmissionController<'a> {
    executor: &'a dyn FormExecutor,
    backoff: &'a mut BackoffController,
    max_attempts: u32,
}

impl<'a> SubmissionController<'a> {
    pub fn new(
        executor: &'a dyn FormExecutor,
        backoff: &'a mut BackoffController,
        max_attempts: u32,
    ) -> Self {
        debug_assert!(max_attempts >= 1);
        Self {
            executor,
            backoff,
            max_attempts,
        }
    }

    /// Drive one record to completion. Overload failures back off and resync,
    /// stale-reference failures resync and retry immediately, fatal failures
    /// abort without consuming further attempts.
    pub async fn submit(
        &mut self,
        directive: &str,
        record: &Record,
    ) -> Result<String, SubmissionError> {
        let title = record.display_title().to_string();
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            tracing::info!(
                event = "submit_attempt",
                title = %title,
                attempt,
                max_attempts = self.max_attempts
            );
            match self.executor.invoke(directive, record).await {
                Ok(output) => {
                    tracing::info!(event = "submit_ok", title = %title, attempt);
                    return Ok(output);
                }
                Err(err) => {
                    let kind = classify(&err);
                    tracing::warn!(
                        event = "submit_failed",
                        title = %title,
                        attempt,
                        kind = ?kind,
                        error = %err
                    );
                    match kind.action() {
                        RetryAction::Abort => {
                            return Err(SubmissionError::Fatal { title, source: err });
                        }
                        action => {
                            last_error = Some(err);
                            if attempt == self.max_attempts {
                                break;
                            }
                            match action {
                                RetryAction::BackoffAndResync => {
                                    let delay = self.backoff.on_overload();
                                    tracing::info!(
                                        event = "backoff_sleep",
                                        title = %title,
                                        delay_ms = delay.as_millis() as u64,
                                        circuit_open = self.backoff.circuit_open()
                                    );
                                    tokio::time::sleep(delay).await;
                                    self.best_effort_resync().await;
                                }
                                RetryAction::ResyncImmediately => {
                                    self.best_effort_resync().await;
                                }
                                RetryAction::Abort => unreachable!("handled above"),
                            }
                        }
                    }
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| ExecutorError::new("no attempts made"));
        Err(SubmissionError::RetriesExhausted {
            title,
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn best_effort_resync(&self) {
        match self.executor.resync().await {
            Ok(()) => tracing::debug!(event = "resync_done"),
            Err(err) => tracing::debug!(event = "resync_failed", error = %err),
        }
    }
}

/// Sleep inserted between consecutive submissions so the target sees a steady
/// pace rather than a burst.
pub fn inter_record_pause(fast_mode: bool) -> Duration {
    if fast_mode {
        Duration::from_millis(250)
    } else {
        Duration::from_millis(1000)
    }
}

/// Build the executor directive for one record. Field order is fixed so the
/// executor fills the form top to bottom.
pub fn build_directive(record: &Record, confirm_before_save: bool, fast_mode: bool) -> String {
    let mut lines = Vec::new();
    lines.push("Fill out the activity form with these values, in order:".to_string());
    lines.push(format!("a. Category: {}", record.category));
    lines.push(format!("b. Main Technology: {}", record.main_technology));
    let additional: Vec<&str> = record
        .additional_technologies
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    lines.push(format!(
        "c. Additional Technologies: {}",
        additional.join(", ")
    ));
    lines.push(format!("d. Title: {}", record.title));
    lines.push(format!("e. Description: {}", record.description));
    lines.push(format!("f. Internal Notes: {}", record.internal_notes));
    match record.views {
        Some(views) => lines.push(format!("g. Views: {views}")),
        None => lines.push("g. Views: SKIP this field".to_string()),
    }
    lines.push(format!("h. URL: {}", record.url));
    lines.push(format!("i. Audience: {}", record.audience.join(", ")));
    lines.push(format!("j. Date: {}", record.date));
    if let Some(start) = &record.start_date {
        lines.push(format!("   Start Date: {start}"));
    }
    if let Some(end) = &record.end_date {
        lines.push(format!("   End Date: {end}"));
    }
    lines.push(format!("k. Quantity: {}", record.quantity));
    if fast_mode {
        lines.push(
            "Work from your current view of the page; only take a fresh snapshot if an \
             element cannot be found."
                .to_string(),
        );
    } else {
        lines.push("Take a fresh snapshot of the page before filling each field.".to_string());
    }
    if confirm_before_save {
        lines.push(
            "After filling every field, STOP and wait for confirmation. Do NOT save.".to_string(),
        );
    } else {
        lines.push("After filling every field, save the form.".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Call {
        Invoke,
        Resync,
    }

    struct ScriptedExecutor {
        // One scripted outcome per invoke, Err holds the failure message.
        outcomes: Mutex<Vec<Result<String, String>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedExecutor {
        fn new(outcomes: Vec<Result<String, String>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FormExecutor for ScriptedExecutor {
        async fn invoke(
            &self,
            _directive: &str,
            _record: &Record,
        ) -> Result<String, ExecutorError> {
            self.calls.lock().unwrap().push(Call::Invoke);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(ExecutorError::new("script exhausted"));
            }
            outcomes.remove(0).map_err(ExecutorError::new)
        }

        async fn resync(&self) -> Result<(), ExecutorError> {
            self.calls.lock().unwrap().push(Call::Resync);
            Ok(())
        }

        async fn shutdown(&self) {}
    }

    fn record() -> Record {
        Record {
            title: "A talk".to_string(),
            quantity: 1,
            ..Record::default()
        }
    }

    fn tiny_backoff() -> BackoffController {
        BackoffController::with_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn first_attempt_success_returns_output() {
        let executor = ScriptedExecutor::new(vec![Ok("saved".to_string())]);
        let mut backoff = tiny_backoff();
        let mut controller = SubmissionController::new(&executor, &mut backoff, 3);
        let output = controller.submit("directive", &record()).await.unwrap();
        assert_eq!(output, "saved");
        assert_eq!(executor.calls(), vec![Call::Invoke]);
    }

    #[tokio::test]
    async fn fatal_failure_aborts_without_retrying() {
        let executor = ScriptedExecutor::new(vec![Err("permission denied".to_string())]);
        let mut backoff = tiny_backoff();
        let mut controller = SubmissionController::new(&executor, &mut backoff, 3);
        let err = controller.submit("directive", &record()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Fatal { .. }));
        assert_eq!(executor.calls(), vec![Call::Invoke]);
    }

    #[tokio::test]
    async fn stale_reference_resyncs_and_retries_immediately() {
        let executor = ScriptedExecutor::new(vec![
            Err("stale element handle".to_string()),
            Ok("saved".to_string()),
        ]);
        let mut backoff = tiny_backoff();
        let mut controller = SubmissionController::new(&executor, &mut backoff, 3);
        let output = controller.submit("directive", &record()).await.unwrap();
        drop(controller);
        assert_eq!(output, "saved");
        assert_eq!(
            executor.calls(),
            vec![Call::Invoke, Call::Resync, Call::Invoke]
        );
        assert_eq!(backoff.recent_failures(), 0);
    }

    #[tokio::test]
    async fn overload_backs_off_then_resyncs() {
        let executor = ScriptedExecutor::new(vec![
            Err("429 too many requests".to_string()),
            Ok("saved".to_string()),
        ]);
        let mut backoff = tiny_backoff();
        let mut controller = SubmissionController::new(&executor, &mut backoff, 3);
        let output = controller.submit("directive", &record()).await.unwrap();
        drop(controller);
        assert_eq!(output, "saved");
        assert_eq!(
            executor.calls(),
            vec![Call::Invoke, Call::Resync, Call::Invoke]
        );
        assert_eq!(backoff.recent_failures(), 1);
    }

    #[tokio::test]
    async fn retries_exhausted_after_max_attempts() {
        let executor = ScriptedExecutor::new(vec![
            Err("rate limited".to_string()),
            Err("rate limited".to_string()),
            Err("rate limited".to_string()),
        ]);
        let mut backoff = tiny_backoff();
        let mut controller = SubmissionController::new(&executor, &mut backoff, 3);
        let err = controller.submit("directive", &record()).await.unwrap_err();
        match err {
            SubmissionError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        // Last attempt fails without a trailing backoff or resync.
        assert_eq!(
            executor.calls(),
            vec![
                Call::Invoke,
                Call::Resync,
                Call::Invoke,
                Call::Resync,
                Call::Invoke
            ]
        );
    }

    #[test]
    fn directive_lists_fields_in_order_and_skips_missing_views() {
        let mut rec = record();
        rec.category = "Talk".to_string();
        rec.main_technology = "Cloud Computing".to_string();
        rec.additional_technologies = ["Python".to_string(), String::new()];
        rec.audience = vec!["Developer".to_string(), "Student".to_string()];
        let directive = build_directive(&rec, false, false);

        let a = directive.find("a. Category: Talk").unwrap();
        let b = directive.find("b. Main Technology: Cloud Computing").unwrap();
        let c = directive.find("c. Additional Technologies: Python").unwrap();
        let k = directive.find("k. Quantity: 1").unwrap();
        assert!(a < b && b < c && c < k);
        assert!(directive.contains("g. Views: SKIP"));
        assert!(directive.contains("i. Audience: Developer, Student"));
        assert!(directive.contains("save the form"));
    }

    #[test]
    fn directive_respects_confirm_and_fast_flags() {
        let directive = build_directive(&record(), true, true);
        assert!(directive.contains("Do NOT save"));
        assert!(directive.contains("current view of the page"));

        let mut rec = record();
        rec.views = Some(250);
        let directive = build_directive(&rec, false, false);
        assert!(directive.contains("g. Views: 250"));
        assert!(directive.contains("fresh snapshot of the page before"));
    }

    #[test]
    fn directive_includes_date_range_when_present() {
        let mut rec = record();
        rec.start_date = Some("2025-03-01".to_string());
        rec.end_date = Some("2025-03-03".to_string());
        let directive = build_directive(&rec, false, false);
        assert!(directive.contains("Start Date: 2025-03-01"));
        assert!(directive.contains("End Date: 2025-03-03"));
    }
}
