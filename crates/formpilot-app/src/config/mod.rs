//! Configuration loading and XDG path helpers.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "config/settings";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub automation: AutomationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    /// Address of the form the executor is pointed at.
    pub target_url: String,
    pub max_attempts: u32,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

pub fn load() -> Result<AppConfig, AppConfigError> {
    let default_storage = default_storage_path()?;
    let builder = Config::builder()
        .set_default(
            "automation.target_url",
            "https://aka.ms/community-activities",
        )?
        .set_default("automation.max_attempts", 3)?
        .set_default("automation.batch_size", 3)?
        .set_default(
            "storage.path",
            default_storage.to_string_lossy().to_string(),
        )?
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix("FORMPILOT").separator("__"));

    let cfg = builder.build()?.try_deserialize()?;
    Ok(cfg)
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("dev", "formpilot", "formpilot").ok_or(AppConfigError::MissingProjectDirs)
}

fn default_storage_path() -> Result<PathBuf, AppConfigError> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}
