//! Text utilities kept pure for reuse across services and pipelines.
//!
//! Functions exposed here must remain side-effect free so they can be
//! composed from the enrichment and submission services without introducing
//! hidden IO or mutable state.

pub mod cleanup;

pub use cleanup::{
    ensure_sentence_end, normalize_dashes, sanitize_notes, strip_urls, truncate_at_boundary,
};
