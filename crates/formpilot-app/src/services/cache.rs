//! JSON-backed artifact cache for generated text and discovered dropdown
//! pools. Persistence is best effort: a cache failure never fails a run.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::pipeline::OptionSet;

pub const SECTION_PRIVATE_DESC: &str = "private_desc";
pub const SECTION_REWRITE: &str = "rewrite850";
const SECTION_DROPDOWNS: &str = "dropdowns";
const KEY_TECH_OPTIONS: &str = "tech_options";
const KEY_AUDIENCE: &str = "target_audience";

/// On-disk cache keyed by content hashes. Each section is a flat string map
/// except `dropdowns`, which holds the discovered option pools.
#[derive(Debug)]
pub struct ArtifactCache {
    path: PathBuf,
    data: Map<String, Value>,
}

impl ArtifactCache {
    /// Open the cache at `path`. A missing or corrupt file yields an empty
    /// cache; the dropdown skeleton is seeded so later reads have a stable
    /// shape.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut data = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        event = "cache_corrupt",
                        path = %path.display(),
                        "artifact cache unreadable, starting empty"
                    );
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        let seeded = seed_dropdowns(&mut data);
        let cache = Self { path, data };
        if seeded {
            cache.save();
        }
        cache
    }

    pub fn get_text(&self, section: &str, key: &str) -> Option<&str> {
        self.data.get(section)?.get(key)?.as_str()
    }

    pub fn set_text(&mut self, section: &str, key: &str, value: &str) {
        let entry = self
            .data
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    pub fn tech_options(&self) -> Option<OptionSet> {
        let options = self.data.get(SECTION_DROPDOWNS)?.get(KEY_TECH_OPTIONS)?;
        let primary = string_list(options.get("primary")?);
        let additional = string_list(options.get("additional")?);
        if primary.is_empty() && additional.is_empty() {
            return None;
        }
        Some(OptionSet {
            primary,
            additional,
        })
    }

    pub fn set_tech_options(&mut self, set: &OptionSet) {
        self.dropdowns_mut().insert(
            KEY_TECH_OPTIONS.to_string(),
            json!({ "primary": set.primary, "additional": set.additional }),
        );
    }

    pub fn target_audience(&self) -> Option<Vec<String>> {
        let list = string_list(self.data.get(SECTION_DROPDOWNS)?.get(KEY_AUDIENCE)?);
        (!list.is_empty()).then_some(list)
    }

    pub fn set_target_audience(&mut self, audience: &[String]) {
        self.dropdowns_mut()
            .insert(KEY_AUDIENCE.to_string(), json!(audience));
    }

    fn dropdowns_mut(&mut self) -> &mut Map<String, Value> {
        let entry = self
            .data
            .entry(SECTION_DROPDOWNS.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("dropdowns entry is an object"),
        }
    }

    /// Write the cache to disk via a temp file and rename. Failures are
    /// logged and swallowed.
    pub fn save(&self) {
        if let Err(err) = self.write_atomic() {
            tracing::warn!(
                event = "cache_save_failed",
                path = %self.path.display(),
                error = %err,
                "failed to persist artifact cache"
            );
        }
    }

    fn write_atomic(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(&Value::Object(self.data.clone()))?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn seed_dropdowns(data: &mut Map<String, Value>) -> bool {
    let mut seeded = false;
    let dropdowns = data
        .entry(SECTION_DROPDOWNS.to_string())
        .or_insert_with(|| {
            seeded = true;
            Value::Object(Map::new())
        });
    if let Value::Object(map) = dropdowns {
        if !map.contains_key(KEY_TECH_OPTIONS) {
            map.insert(
                KEY_TECH_OPTIONS.to_string(),
                json!({ "primary": [], "additional": [] }),
            );
            seeded = true;
        }
        if !map.contains_key(KEY_AUDIENCE) {
            map.insert(KEY_AUDIENCE.to_string(), json!([]));
            seeded = true;
        }
    }
    seeded
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Stable content hash over the given parts, delimiter-separated so adjacent
/// parts cannot collide by concatenation.
pub fn content_hash(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_text_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = ArtifactCache::open(&path);
        let key = content_hash(&["A title", "A description"]);
        cache.set_text(SECTION_PRIVATE_DESC, &key, "cached notes");
        cache.save();

        let reloaded = ArtifactCache::open(&path);
        assert_eq!(
            reloaded.get_text(SECTION_PRIVATE_DESC, &key),
            Some("cached notes")
        );
    }

    #[test]
    fn missing_file_opens_empty_with_seeded_dropdowns() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::open(dir.path().join("absent.json"));
        assert!(cache.tech_options().is_none());
        assert!(cache.target_audience().is_none());
        // Skeleton was persisted.
        assert!(cache.path().exists());
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();
        let cache = ArtifactCache::open(&path);
        assert!(cache.get_text(SECTION_PRIVATE_DESC, "k").is_none());
    }

    #[test]
    fn dropdown_pools_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = ArtifactCache::open(&path);
        let set = OptionSet {
            primary: vec!["Cloud Computing".to_string()],
            additional: vec!["Python".to_string(), "Rust".to_string()],
        };
        cache.set_tech_options(&set);
        cache.set_target_audience(&["Developer".to_string()]);
        cache.save();

        let reloaded = ArtifactCache::open(&path);
        assert_eq!(reloaded.tech_options(), Some(set));
        assert_eq!(
            reloaded.target_audience(),
            Some(vec!["Developer".to_string()])
        );
    }

    #[test]
    fn hash_delimiter_separates_adjacent_parts() {
        assert_ne!(content_hash(&["ab", "c"]), content_hash(&["a", "bc"]));
        assert_eq!(content_hash(&["a", "b"]), content_hash(&["a", "b"]));
    }
}
