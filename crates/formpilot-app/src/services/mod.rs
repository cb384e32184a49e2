//! Stateful services behind the pipeline: backoff and failure recovery,
//! the artifact cache, enrichment, submission, and the orchestrator that
//! ties them together.

pub mod backoff;
pub mod cache;
pub mod collaborators;
pub mod context;
pub mod enrich;
pub mod local;
pub mod orchestrator;
pub mod retry;
pub mod submission;

pub use backoff::{BackoffController, BackoffPreset};
pub use cache::{ArtifactCache, content_hash};
pub use collaborators::{DocumentParser, FormExecutor, NotesGenerator, ProviderError};
pub use context::{PipelineError, PipelineResult, RunContext, build_run_context};
pub use enrich::Enricher;
pub use orchestrator::{
    PipelineOrchestrator, ProcessMode, RunOptions, RunReport, decode_records, fmt_duration,
};
pub use retry::{ExecutorError, FailureKind, RetryAction, classify};
pub use submission::{SubmissionController, SubmissionError, build_directive};
