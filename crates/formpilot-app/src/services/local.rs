//! Local collaborator implementations used by the CLI: a passthrough parser
//! for pre-extracted text files, a generator stub that always defers to the
//! deterministic fallbacks, and a dry-run executor that prints directives
//! instead of driving a browser.

use std::path::Path;

use async_trait::async_trait;

use crate::pipeline::Record;
use crate::services::collaborators::{DocumentParser, FormExecutor, NotesGenerator, ProviderError};
use crate::services::retry::ExecutorError;

/// Reads the document as UTF-8 text. Suitable for JSON exports and any
/// document already converted to text upstream.
pub struct PassthroughParser;

#[async_trait]
impl DocumentParser for PassthroughParser {
    async fn parse(&self, path: &Path) -> Result<String, ProviderError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Generator that reports itself unavailable, so enrichment always takes the
/// local sanitize-and-truncate path.
pub struct UnavailableGenerator;

#[async_trait]
impl NotesGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::message("no notes generator configured"))
    }
}

/// Executor that logs each directive and reports success without touching any
/// form. Used to rehearse a run before pointing at the real target.
pub struct DryRunExecutor;

#[async_trait]
impl FormExecutor for DryRunExecutor {
    async fn invoke(&self, directive: &str, record: &Record) -> Result<String, ExecutorError> {
        tracing::info!(
            event = "dry_run_invoke",
            title = %record.display_title()
        );
        println!("--- dry run directive ---\n{directive}\n---");
        Ok(format!("dry run: {} not submitted", record.display_title()))
    }

    async fn resync(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn shutdown(&self) {}
}
