//! Trait seams for the external collaborators the pipeline drives: the
//! document parser, the notes generator, and the form executor.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::Record;
use crate::services::retry::ExecutorError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// Turns a source document into text the pipeline can decode records from.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<String, ProviderError>;
}

/// Produces rewritten or summarized text. Failures are recoverable; callers
/// fall back to deterministic local transforms.
#[async_trait]
pub trait NotesGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Drives the target form. `invoke` submits one record under a directive and
/// returns the executor's final output text; `resync` refreshes the
/// executor's view of the page after a failure.
#[async_trait]
pub trait FormExecutor: Send + Sync {
    async fn invoke(&self, directive: &str, record: &Record) -> Result<String, ExecutorError>;

    async fn resync(&self) -> Result<(), ExecutorError>;

    /// Inspect the live form and return its dropdown payload, if the
    /// executor can see one. Consulted once per run when the cache holds no
    /// option pools; the default reports nothing, which sends callers to
    /// their built-in fallbacks.
    async fn discover_options(&self) -> Result<Option<serde_json::Value>, ExecutorError> {
        Ok(None)
    }

    /// Release any session the executor holds. Called exactly once per run,
    /// on success and failure alike.
    async fn shutdown(&self);
}
