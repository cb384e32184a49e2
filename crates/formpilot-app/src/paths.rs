//! Filesystem path helpers (XDG-aware) for the artifact cache and run state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AppConfig;

const CACHE_FILE: &str = "artifact_cache.json";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Container providing filesystem paths for the application. In production
/// this is rooted at the configured storage path; tests may construct custom
/// instances.
#[derive(Debug, Clone)]
pub struct AppPaths {
    base_dir: PathBuf,
}

impl AppPaths {
    /// Construct paths rooted under the provided directory.
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base_dir: base.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.storage.path)
    }

    /// Base data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    /// Path of the artifact cache file (`.../artifact_cache.json`).
    pub fn cache_file(&self) -> PathBuf {
        self.base_dir.join(CACHE_FILE)
    }

    /// Create the base directory if it does not exist.
    pub fn ensure_dirs(&self) -> Result<(), PathError> {
        ensure_dir(&self.base_dir)
    }
}

fn ensure_dir(path: &Path) -> Result<(), PathError> {
    fs::create_dir_all(path).map_err(|source| PathError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
