//! Token-overlap matching of record content against technology option pools,
//! pool-membership resolution, and discovery-payload extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern must compile"));

/// Default audience pool used when the cache holds no discovered values.
pub const DEFAULT_AUDIENCE: [&str; 5] = [
    "Developer",
    "IT Pro",
    "Business Decision Maker",
    "Technical Decision Maker",
    "Student",
];

const AUDIENCE_HINTS: [&str; 6] = [
    "developer",
    "it pro",
    "business decision maker",
    "technical decision maker",
    "student",
    "author",
];

/// Primary and additional technology option pools as presented by the target
/// form. The two pools may overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSet {
    pub primary: Vec<String>,
    pub additional: Vec<String>,
}

impl OptionSet {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.additional.is_empty()
    }

    /// Built-in pools used when no discovered option set is available.
    pub fn fallback() -> Self {
        let primary = [
            "AI and Machine Learning",
            "Cloud Computing",
            "Data and Analytics",
            "Developer Tools",
            "DevOps",
            "Internet of Things",
            "Low Code",
            "Mixed Reality",
            "Mobile Development",
            "Modern Work",
            "Security",
            "Web Development",
        ];
        let additional = [
            "AI and Machine Learning",
            "Business Applications",
            "C#",
            "C++",
            "Cloud Computing",
            "Containers",
            "Data and Analytics",
            "Databases",
            "Developer Tools",
            "DevOps",
            "Game Development",
            "Go",
            "Internet of Things",
            "Java",
            "JavaScript",
            "Kubernetes",
            "Low Code",
            "Mixed Reality",
            "Mobile Development",
            "Modern Work",
            "Networking",
            "Node.js",
            "PowerShell",
            "Python",
            "React",
            "Rust",
            "Security",
            "Serverless",
            "TypeScript",
            "Web Development",
        ];
        Self {
            primary: primary.iter().map(|s| s.to_string()).collect(),
            additional: additional.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A chosen main technology plus exactly two additional slots. Unfilled slots
/// hold empty strings so the directive always addresses both dropdowns.
#[derive(Debug, Clone, PartialEq)]
pub struct TechChoice {
    pub main: String,
    pub additional: [String; 2],
}

fn tokens(text: &str) -> HashSet<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn score(option: &str, content: &HashSet<String>) -> usize {
    tokens(option).intersection(content).count()
}

/// Pick the best-scoring option from a pool. Ties resolve to the earliest
/// entry; a pool where nothing scores resolves to the first entry.
fn best_match<'a>(pool: &'a [String], content: &HashSet<String>) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for option in pool {
        let s = score(option, content);
        match best {
            Some((_, top)) if s <= top => {}
            _ => best = Some((option, s)),
        }
    }
    best.map(|(option, _)| option)
}

/// Choose a main technology and up to two additional technologies for a record
/// by scoring each pool option on token overlap with the title and
/// description.
pub fn choose(title: &str, description: &str, set: &OptionSet) -> TechChoice {
    let content = tokens(&format!("{title} {description}"));

    let main_pool = if set.primary.is_empty() {
        &set.additional
    } else {
        &set.primary
    };
    let main = best_match(main_pool, &content)
        .unwrap_or_default()
        .to_string();

    // Additional candidates: the additional pool in order, then primary
    // entries not already present, with the chosen main excluded.
    let mut candidates: Vec<&str> = Vec::new();
    for option in set.additional.iter().chain(&set.primary) {
        if option == &main || candidates.contains(&option.as_str()) {
            continue;
        }
        candidates.push(option);
    }

    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .map(|option| (score(option, &content), *option))
        .collect();
    // Stable sort keeps pool order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut additional = [String::new(), String::new()];
    for (slot, (_, option)) in additional.iter_mut().zip(scored.iter().take(2)) {
        *slot = option.to_string();
    }
    TechChoice { main, additional }
}

/// Match a chosen value against a pool: case-insensitive exact match first,
/// then substring containment of the choice within a pool entry.
fn match_in_pool<'a>(choice: &str, pool: &'a [String]) -> Option<&'a str> {
    let needle = choice.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    pool.iter()
        .find(|entry| entry.to_lowercase() == needle)
        .or_else(|| pool.iter().find(|entry| entry.to_lowercase().contains(&needle)))
        .map(String::as_str)
}

/// Snap a choice onto the live pools. An unmatched main falls back to the
/// first pool entry; unmatched additional values are dropped and the slots
/// re-padded with empty strings. Additional values are matched against the
/// combined additional-then-primary pool, since the scorer draws candidates
/// from both.
pub fn resolve(choice: &TechChoice, set: &OptionSet) -> TechChoice {
    let main_pool = if set.primary.is_empty() {
        &set.additional
    } else {
        &set.primary
    };
    let main = match_in_pool(&choice.main, main_pool)
        .or_else(|| main_pool.first().map(String::as_str))
        .unwrap_or_default()
        .to_string();

    let combined: Vec<String> = set
        .additional
        .iter()
        .chain(&set.primary)
        .cloned()
        .collect();
    let mut resolved: Vec<String> = Vec::new();
    for value in &choice.additional {
        if let Some(matched) = match_in_pool(value, &combined)
            && matched != main
            && !resolved.iter().any(|r| r == matched)
        {
            resolved.push(matched.to_string());
        }
    }
    let mut additional = [String::new(), String::new()];
    for (slot, value) in additional.iter_mut().zip(resolved) {
        *slot = value;
    }
    TechChoice { main, additional }
}

/// Walk a discovery payload and pull out technology option pools and an
/// audience pool, if present. String lists are classified by their path
/// through the payload: audience lists by member overlap with known audience
/// values, technology lists by path keywords.
pub fn extract_discovered(payload: &Value) -> (Option<OptionSet>, Option<Vec<String>>) {
    let mut lists: Vec<(String, Vec<String>)> = Vec::new();
    collect_string_lists(payload, String::new(), &mut lists);

    let mut audience = None;
    let mut primary = None;
    let mut additional = None;
    let mut tech_candidates: Vec<Vec<String>> = Vec::new();

    for (path, list) in lists {
        let hits = list
            .iter()
            .filter(|item| AUDIENCE_HINTS.contains(&item.to_lowercase().as_str()))
            .count();
        if hits >= 2 && audience.is_none() {
            audience = Some(list);
            continue;
        }
        let path_lower = path.to_lowercase();
        if path_lower.contains("primary") || path_lower.contains("main") {
            primary.get_or_insert(list);
        } else if path_lower.contains("additional") {
            additional.get_or_insert(list);
        } else if path_lower.contains("tech") {
            tech_candidates.push(list);
        }
    }

    // Unlabeled technology lists fill whichever pool is still empty, largest
    // list first for the additional pool.
    tech_candidates.sort_by_key(|list| std::cmp::Reverse(list.len()));
    let mut tech_candidates = tech_candidates.into_iter();
    if additional.is_none() {
        additional = tech_candidates.next();
    }
    if primary.is_none() {
        primary = tech_candidates.next();
    }

    let set = match (primary, additional) {
        (None, None) => None,
        (primary, additional) => Some(OptionSet {
            primary: primary.unwrap_or_default(),
            additional: additional.unwrap_or_default(),
        }),
    };
    (set, audience)
}

fn collect_string_lists(value: &Value, path: String, out: &mut Vec<(String, Vec<String>)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                collect_string_lists(child, child_path, out);
            }
        }
        Value::Array(items) => {
            let strings: Vec<String> = items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !strings.is_empty() && strings.len() == items.len() {
                out.push((path, strings));
            } else {
                for (i, child) in items.iter().enumerate() {
                    collect_string_lists(child, format!("{path}[{i}]"), out);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(primary: &[&str], additional: &[&str]) -> OptionSet {
        OptionSet {
            primary: primary.iter().map(|s| s.to_string()).collect(),
            additional: additional.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn chooses_by_token_overlap() {
        let set = set(
            &["Cloud Computing", "Web Development"],
            &["Python", "JavaScript"],
        );
        let choice = choose(
            "Serverless Python on Azure Functions",
            "Deploying Python functions to cloud computing platforms",
            &set,
        );
        assert_eq!(choice.main, "Cloud Computing");
        assert_eq!(choice.additional[0], "Python");
    }

    #[test]
    fn zero_score_falls_back_to_first_option() {
        let set = set(&["Security", "DevOps"], &["Rust", "Go"]);
        let choice = choose("Watercolor painting basics", "Brushes and paper", &set);
        assert_eq!(choice.main, "Security");
    }

    #[test]
    fn ties_resolve_to_earliest_pool_entry() {
        let set = set(&["Data and Analytics", "AI and Machine Learning"], &[]);
        let choice = choose("Working with data and machine learning", "", &set);
        // Both score; earliest wins only when scores are equal.
        assert!(!choice.main.is_empty());
        let tied = choose("nothing relevant here at all", "", &set);
        assert_eq!(tied.main, "Data and Analytics");
    }

    #[test]
    fn additional_slots_always_two_padded_with_empty() {
        let set = set(&["Cloud Computing"], &["Python"]);
        let choice = choose("Python in the cloud", "", &set);
        assert_eq!(choice.additional.len(), 2);
        assert_eq!(choice.additional[1], "");
    }

    #[test]
    fn main_choice_excluded_from_additional() {
        let set = set(&["Python"], &["Python", "Rust"]);
        let choice = choose("Python Python Python", "", &set);
        assert_eq!(choice.main, "Python");
        assert_ne!(choice.additional[0], "Python");
    }

    #[test]
    fn empty_primary_pool_chooses_from_additional() {
        let set = set(&[], &["Rust", "Go"]);
        let choice = choose("Writing servers in Rust", "", &set);
        assert_eq!(choice.main, "Rust");
    }

    #[test]
    fn resolve_exact_then_substring() {
        let pools = set(
            &["AI and Machine Learning", "Cloud Computing"],
            &["Python", "JavaScript"],
        );
        let choice = TechChoice {
            main: "machine learning".to_string(),
            additional: ["python".to_string(), "Haskell".to_string()],
        };
        let resolved = resolve(&choice, &pools);
        assert_eq!(resolved.main, "AI and Machine Learning");
        assert_eq!(resolved.additional, ["Python".to_string(), String::new()]);
    }

    #[test]
    fn resolve_keeps_additional_choices_drawn_from_the_primary_pool() {
        let pools = set(&["Mixed Reality", "Security"], &["Python"]);
        let choice = choose("Securing Python apps for mixed reality headsets", "", &pools);
        assert!(choice.additional.contains(&"Security".to_string()));
        let resolved = resolve(&choice, &pools);
        assert!(resolved.additional.contains(&"Security".to_string()));
        assert!(resolved.additional.contains(&"Python".to_string()));
    }

    #[test]
    fn resolve_unmatched_main_falls_back_to_pool_first() {
        let pools = set(&["Security", "DevOps"], &[]);
        let choice = TechChoice {
            main: "Gardening".to_string(),
            additional: [String::new(), String::new()],
        };
        let resolved = resolve(&choice, &pools);
        assert_eq!(resolved.main, "Security");
    }

    #[test]
    fn extracts_pools_and_audience_from_discovery_payload() {
        let payload = json!({
            "form": {
                "primary_technologies": ["Cloud Computing", "Security"],
                "additional_technologies": ["Python", "Rust"],
                "audiences": ["Developer", "Student", "IT Pro"],
            }
        });
        let (set, audience) = extract_discovered(&payload);
        let set = set.unwrap();
        assert_eq!(set.primary, vec!["Cloud Computing", "Security"]);
        assert_eq!(set.additional, vec!["Python", "Rust"]);
        assert_eq!(audience.unwrap(), vec!["Developer", "Student", "IT Pro"]);
    }

    #[test]
    fn unlabeled_tech_lists_fill_empty_pools() {
        let payload = json!({
            "tech_options": ["Python", "Rust", "Go"],
            "tech_areas": ["Cloud Computing"],
        });
        let (set, audience) = extract_discovered(&payload);
        let set = set.unwrap();
        assert_eq!(set.additional, vec!["Python", "Rust", "Go"]);
        assert_eq!(set.primary, vec!["Cloud Computing"]);
        assert!(audience.is_none());
    }

    #[test]
    fn fallback_pools_are_non_empty() {
        let set = OptionSet::fallback();
        assert!(!set.is_empty());
        assert!(set.primary.contains(&"Cloud Computing".to_string()));
        assert!(set.additional.contains(&"Python".to_string()));
    }
}
