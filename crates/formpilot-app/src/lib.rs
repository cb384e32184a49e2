//! Formpilot: a resilience layer for submitting activity records through a
//! fallible form executor. Parsing, enrichment, and option matching are pure;
//! the services wrap them with caching, backoff, and failure recovery.

pub mod cli;
pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod services;
pub mod text;

pub use error::AppError;
