//! Pure pipeline transformations that operate on activity record data.
//!
//! Modules under this namespace must remain free of IO and external side
//! effects so they can be reused across the run orchestrator and test
//! harnesses.

pub mod options;
pub mod record;

pub use options::{DEFAULT_AUDIENCE, OptionSet, TechChoice, choose, extract_discovered, resolve};
pub use record::{REQUIRED_FIELDS, Record, normalize_keys};
