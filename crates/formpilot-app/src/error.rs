//! Application-level error type shared between the binary and the services.

use std::path::PathBuf;

use thiserror::Error;

use crate::config;
use crate::services::PipelineError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] config::AppConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("input document not found: {path}")]
    MissingDocument { path: PathBuf },
}
