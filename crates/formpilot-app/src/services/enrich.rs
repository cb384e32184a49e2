//! Record enrichment: internal-notes synthesis and long-field rewriting, both
//! cache-first with deterministic local fallbacks.

use crate::pipeline::Record;
use crate::services::cache::{ArtifactCache, SECTION_PRIVATE_DESC, SECTION_REWRITE, content_hash};
use crate::services::collaborators::NotesGenerator;
use crate::text::{ensure_sentence_end, sanitize_notes, truncate_at_boundary};

pub const NOTES_MAX_LEN: usize = 400;
pub const FIELD_HARD_LIMIT: usize = 1000;
pub const FIELD_REWRITE_TARGET: usize = 850;

const FALLBACK_NOTES: &str = "This is a concise internal summary for tracking this activity.";

const NOTES_PROMPT: &str = "Write a short private summary (max 2 sentences, under 400 \
characters) of the following activity for internal tracking. Plain prose, no links, no \
markdown.";

const REWRITE_PROMPT: &str = "Rewrite the following text to be at most 850 characters while \
keeping every key fact. Plain prose, no links, no markdown.";

/// Fills in missing generated text on parsed records. Generator failures are
/// recoverable; every path ends with a usable value.
pub struct Enricher<'a> {
    generator: &'a dyn NotesGenerator,
    cache: &'a mut ArtifactCache,
}

impl<'a> Enricher<'a> {
    pub fn new(generator: &'a dyn NotesGenerator, cache: &'a mut ArtifactCache) -> Self {
        Self { generator, cache }
    }

    /// Ensure every record carries non-empty internal notes. Cache first,
    /// then the generator, then a sanitized description, then a fixed
    /// fallback sentence.
    pub async fn ensure_internal_notes(&mut self, records: &mut [Record]) {
        let mut dirty = false;
        for record in records {
            if !record.internal_notes.trim().is_empty() {
                continue;
            }
            let key = content_hash(&[&record.title, &record.description]);
            if let Some(cached) = self.cache.get_text(SECTION_PRIVATE_DESC, &key) {
                tracing::debug!(
                    event = "notes_cache_hit",
                    title = %record.display_title()
                );
                record.internal_notes = cached.to_string();
                continue;
            }

            let prompt = format!(
                "{NOTES_PROMPT}\n\nTitle: {}\nDescription: {}",
                record.title, record.description
            );
            let notes = match self.generator.generate(&prompt).await {
                Ok(text) => sanitize_notes(&text, NOTES_MAX_LEN),
                Err(err) => {
                    tracing::warn!(
                        event = "notes_generation_failed",
                        title = %record.display_title(),
                        error = %err,
                        "falling back to local notes"
                    );
                    String::new()
                }
            };
            let notes = if notes.is_empty() {
                let local = sanitize_notes(&record.description, NOTES_MAX_LEN);
                if local.is_empty() {
                    FALLBACK_NOTES.to_string()
                } else {
                    local
                }
            } else {
                notes
            };

            self.cache.set_text(SECTION_PRIVATE_DESC, &key, &notes);
            dirty = true;
            record.internal_notes = notes;
        }
        if dirty {
            self.cache.save();
        }
    }

    /// Rewrite description and internal notes that exceed the hard field
    /// limit down to the rewrite target.
    pub async fn enforce_field_limits(&mut self, records: &mut [Record]) {
        let mut dirty = false;
        for record in records {
            if record.description.chars().count() > FIELD_HARD_LIMIT {
                let source = record.description.clone();
                record.description = self.rewrite("desc850", &source, &mut dirty).await;
            }
            if record.internal_notes.chars().count() > FIELD_HARD_LIMIT {
                let source = record.internal_notes.clone();
                record.internal_notes = self.rewrite("pdesc850", &source, &mut dirty).await;
            }
        }
        if dirty {
            self.cache.save();
        }
    }

    async fn rewrite(&mut self, tag: &str, source: &str, dirty: &mut bool) -> String {
        let key = content_hash(&[tag, source]);
        if let Some(cached) = self.cache.get_text(SECTION_REWRITE, &key) {
            return cached.to_string();
        }

        let prompt = format!("{REWRITE_PROMPT}\n\n{source}");
        let rewritten = match self.generator.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) | Err(_) => {
                tracing::warn!(event = "rewrite_failed", tag, "truncating locally");
                String::new()
            }
        };
        let rewritten = if rewritten.is_empty() {
            source.to_string()
        } else {
            rewritten
        };
        // The generator is not trusted to respect the limit.
        let bounded = if rewritten.chars().count() > FIELD_REWRITE_TARGET {
            truncate_at_boundary(&rewritten, FIELD_REWRITE_TARGET)
        } else {
            rewritten
        };
        let final_text = ensure_sentence_end(&bounded);

        self.cache.set_text(SECTION_REWRITE, &key, &final_text);
        *dirty = true;
        final_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::collaborators::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedGenerator {
        responses: Mutex<Vec<Result<String, String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String, String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl NotesGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ProviderError::message("script exhausted"));
            }
            responses.remove(0).map_err(ProviderError::message)
        }
    }

    fn record(title: &str, description: &str) -> Record {
        Record {
            title: title.to_string(),
            description: description.to_string(),
            ..Record::default()
        }
    }

    fn cache(dir: &TempDir) -> ArtifactCache {
        ArtifactCache::open(dir.path().join("cache.json"))
    }

    #[tokio::test]
    async fn generated_notes_are_sanitized_and_cached() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let generator = ScriptedGenerator::new(vec![Ok(
            "A summary with a link https://example.com and more".to_string(),
        )]);
        let mut records = vec![record("Title", "Description")];

        Enricher::new(&generator, &mut cache)
            .ensure_internal_notes(&mut records)
            .await;

        assert!(!records[0].internal_notes.contains("http"));
        assert!(records[0].internal_notes.ends_with('.'));
        let key = content_hash(&["Title", "Description"]);
        assert_eq!(
            cache.get_text(SECTION_PRIVATE_DESC, &key),
            Some(records[0].internal_notes.as_str())
        );
    }

    #[tokio::test]
    async fn cached_notes_skip_the_generator() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let key = content_hash(&["Title", "Description"]);
        cache.set_text(SECTION_PRIVATE_DESC, &key, "from cache.");
        let generator = ScriptedGenerator::new(vec![]);
        let mut records = vec![record("Title", "Description")];

        Enricher::new(&generator, &mut cache)
            .ensure_internal_notes(&mut records)
            .await;

        assert_eq!(records[0].internal_notes, "from cache.");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_description() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let generator = ScriptedGenerator::new(vec![Err("unavailable".to_string())]);
        let mut records = vec![record("Title", "A useful description of the talk")];

        Enricher::new(&generator, &mut cache)
            .ensure_internal_notes(&mut records)
            .await;

        assert!(records[0].internal_notes.starts_with("A useful description"));
    }

    #[tokio::test]
    async fn empty_description_falls_back_to_fixed_notes() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let generator = ScriptedGenerator::new(vec![Err("unavailable".to_string())]);
        let mut records = vec![record("Title", "")];

        Enricher::new(&generator, &mut cache)
            .ensure_internal_notes(&mut records)
            .await;

        assert_eq!(records[0].internal_notes, FALLBACK_NOTES);
    }

    #[tokio::test]
    async fn existing_notes_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let generator = ScriptedGenerator::new(vec![]);
        let mut records = vec![record("Title", "Description")];
        records[0].internal_notes = "already here.".to_string();

        Enricher::new(&generator, &mut cache)
            .ensure_internal_notes(&mut records)
            .await;

        assert_eq!(records[0].internal_notes, "already here.");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_description_is_rewritten_within_target() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        // Generator ignores the limit; the local bound must still hold.
        let generator = ScriptedGenerator::new(vec![Ok("word ".repeat(300))]);
        let mut records = vec![record("Title", &"long sentence. ".repeat(100))];

        Enricher::new(&generator, &mut cache)
            .enforce_field_limits(&mut records)
            .await;

        assert!(records[0].description.chars().count() <= FIELD_REWRITE_TARGET);
        assert!(records[0].description.ends_with('.'));
    }

    #[tokio::test]
    async fn rewrite_failure_truncates_locally() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let generator = ScriptedGenerator::new(vec![Err("unavailable".to_string())]);
        let mut records = vec![record("Title", &"long sentence. ".repeat(100))];

        Enricher::new(&generator, &mut cache)
            .enforce_field_limits(&mut records)
            .await;

        assert!(records[0].description.chars().count() <= FIELD_REWRITE_TARGET);
        assert!(records[0].description.starts_with("long sentence."));
    }

    #[tokio::test]
    async fn fields_within_limits_are_untouched() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let generator = ScriptedGenerator::new(vec![]);
        let mut records = vec![record("Title", "short description")];
        records[0].internal_notes = "short notes.".to_string();

        Enricher::new(&generator, &mut cache)
            .enforce_field_limits(&mut records)
            .await;

        assert_eq!(records[0].description, "short description");
        assert_eq!(generator.calls(), 0);
    }
}
