//! Pipeline error type and shared per-run state.

use thiserror::Error;

use crate::config::AppConfig;
use crate::paths::{AppPaths, PathError};
use crate::services::backoff::{BackoffController, BackoffPreset};
use crate::services::cache::ArtifactCache;
use crate::services::collaborators::ProviderError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Message(String),

    #[error("failed to decode records: {reason}")]
    Parse { reason: String, raw: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl PipelineError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// State shared across one pipeline run.
pub struct RunContext {
    pub paths: AppPaths,
    pub cache: ArtifactCache,
    pub backoff: BackoffController,
}

pub fn build_run_context(config: &AppConfig, fast: bool) -> PipelineResult<RunContext> {
    let paths = AppPaths::from_config(config);
    paths.ensure_dirs()?;
    let cache = ArtifactCache::open(paths.cache_file());
    let preset = if fast {
        BackoffPreset::Fast
    } else {
        BackoffPreset::Normal
    };
    Ok(RunContext {
        paths,
        cache,
        backoff: BackoffController::new(preset),
    })
}
