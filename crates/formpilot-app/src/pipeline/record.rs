//! Activity record model, legacy field-name normalization, and the
//! required-field validation gate.

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Fields that must be non-empty for a record to be submittable. `Views` and
/// `Additional Technologies` are excluded by policy: a missing `Views` is
/// skipped downstream rather than treated as invalid.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "Category",
    "Main Technology",
    "Title",
    "Description",
    "Internal Notes",
    "URL",
    "Date",
    "Quantity",
    "Audience",
];

/// Legacy field-name synonyms mapped to their canonical names.
const SYNONYMS: [(&str, &str); 8] = [
    ("Activity Type", "Category"),
    ("Primary Technology Area", "Main Technology"),
    ("Additional Technology Areas", "Additional Technologies"),
    ("Private Description", "Internal Notes"),
    ("Number of Views", "Views"),
    ("Activity URL", "URL"),
    ("Target Audience", "Audience"),
    ("Published Date", "Date"),
];

/// Map legacy synonyms in a raw parsed object to canonical field names and
/// default `Quantity` to 1 when absent or empty.
///
/// Collisions resolve in favor of the canonical name: insertion is
/// last-write-wins by iteration order, and any canonical key present in the
/// raw input is re-inserted after the loop so its value always prevails.
/// The mapping is idempotent, so normalizing an already-normalized object is
/// a no-op.
pub fn normalize_keys(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in raw {
        let canonical = SYNONYMS
            .iter()
            .find(|(legacy, _)| legacy == key)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(key.as_str());
        out.insert(canonical.to_string(), value.clone());
    }
    for (_, canonical) in SYNONYMS {
        if let Some(value) = raw.get(canonical) {
            out.insert(canonical.to_string(), value.clone());
        }
    }
    if !out.get("Quantity").is_some_and(value_present) {
        out.insert("Quantity".to_string(), json!(1));
    }
    out
}

fn value_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// One unit of submission work with canonical fields. Produced once per parse
/// pass and mutated in place by enrichment and option resolution; never
/// outlives a single pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Record {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Main Technology")]
    pub main_technology: String,
    #[serde(rename = "Additional Technologies")]
    pub additional_technologies: [String; 2],
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Internal Notes")]
    pub internal_notes: String,
    #[serde(rename = "Views", skip_serializing_if = "Option::is_none")]
    pub views: Option<i64>,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Audience")]
    pub audience: Vec<String>,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "Start Date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "End Date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl Record {
    /// Build a record from a raw parsed object, applying synonym
    /// normalization first.
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let normalized = normalize_keys(raw);
        Self::from_normalized(&normalized)
    }

    fn from_normalized(map: &Map<String, Value>) -> Self {
        Self {
            category: text_field(map, "Category"),
            main_technology: text_field(map, "Main Technology"),
            additional_technologies: pair_field(map, "Additional Technologies"),
            title: text_field(map, "Title"),
            description: text_field(map, "Description"),
            internal_notes: text_field(map, "Internal Notes"),
            views: integer_field(map, "Views"),
            url: text_field(map, "URL"),
            audience: list_field(map, "Audience"),
            date: text_field(map, "Date"),
            quantity: integer_field(map, "Quantity").unwrap_or(1),
            start_date: optional_text_field(map, "Start Date"),
            end_date: optional_text_field(map, "End Date"),
        }
    }

    /// Canonical required fields that are still empty on this record.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for field in REQUIRED_FIELDS {
            let present = match field {
                "Category" => !self.category.trim().is_empty(),
                "Main Technology" => !self.main_technology.trim().is_empty(),
                "Title" => !self.title.trim().is_empty(),
                "Description" => !self.description.trim().is_empty(),
                "Internal Notes" => !self.internal_notes.trim().is_empty(),
                "URL" => !self.url.trim().is_empty(),
                "Date" => !self.date.trim().is_empty(),
                "Quantity" => self.quantity > 0,
                "Audience" => !self.audience.is_empty(),
                _ => true,
            };
            if !present {
                missing.push(field);
            }
        }
        missing
    }

    /// Title for log lines; never empty.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Unknown"
        } else {
            &self.title
        }
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn optional_text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    let text = text_field(map, key);
    (!text.is_empty()).then_some(text)
}

fn integer_field(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn list_field(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn pair_field(map: &Map<String, Value>, key: &str) -> [String; 2] {
    let mut slots = [String::new(), String::new()];
    let mut seen = Vec::new();
    for item in list_field(map, key) {
        if seen.contains(&item) {
            continue;
        }
        if seen.len() < 2 {
            seen.push(item);
        }
    }
    for (slot, value) in slots.iter_mut().zip(seen) {
        *slot = value;
    }
    slots
}
