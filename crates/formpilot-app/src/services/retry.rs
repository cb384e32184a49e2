//! Executor failure classification and the recovery action each class maps
//! to.

use thiserror::Error;

/// Opaque failure surfaced by the form executor. Classification works on the
/// message text alone.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecutorError {
    message: String,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// How an executor failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The target is throttling. Back off before trying again.
    Overload,
    /// The executor's view of the page is stale. Resync and retry at once.
    StaleReference,
    /// Nothing a retry would fix.
    Fatal,
}

impl FailureKind {
    pub fn action(self) -> RetryAction {
        match self {
            Self::Overload => RetryAction::BackoffAndResync,
            Self::StaleReference => RetryAction::ResyncImmediately,
            Self::Fatal => RetryAction::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    BackoffAndResync,
    ResyncImmediately,
    Abort,
}

/// Classify an executor failure by its message. Overload markers take
/// priority over stale-reference markers when both appear.
pub fn classify(error: &ExecutorError) -> FailureKind {
    let message = error.message().to_lowercase();
    if message.contains("rate") || message.contains("429") {
        return FailureKind::Overload;
    }
    if message.contains("snapshot")
        || message.contains("ref not found")
        || message.contains("stale")
    {
        return FailureKind::StaleReference;
    }
    FailureKind::Fatal
}
