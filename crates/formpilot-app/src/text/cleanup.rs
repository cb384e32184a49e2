//! Sanitation applied to generated notes and rewritten long fields.

use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern must compile"));

/// Remove any http(s) URLs from the text.
pub fn strip_urls(text: &str) -> String {
    URL_RE.replace_all(text, "").trim().to_string()
}

/// Replace em/en dashes and non-breaking hyphens with a plain hyphen.
pub fn normalize_dashes(text: &str) -> String {
    text.replace(['\u{2014}', '\u{2013}', '\u{2011}'], "-")
}

/// Ensure the text ends with sentence punctuation (`.`, `!` or `?`).
pub fn ensure_sentence_end(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.ends_with(['.', '!', '?']) {
        return trimmed.to_string();
    }
    let mut out = trimmed.trim_end_matches(['.', ' ']).to_string();
    out.push('.');
    out
}

/// Cap the text at `max_chars` characters, preferring a sentence boundary and
/// falling back to a word boundary; never cuts mid-word.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut = byte_index_for_char(trimmed, max_chars);
    let window = &trimmed[..cut];
    let boundary = window.rfind('.').or_else(|| window.rfind(' '));
    let end = boundary.unwrap_or(cut);
    trimmed[..end].trim().to_string()
}

/// Full sanitation chain for internal notes and rewrite output: normalize
/// dashes, strip URLs, drop trailing ellipses, cap at a boundary, and force a
/// sentence ending. Returns an empty string when nothing survives so callers
/// can substitute their own fallback text.
pub fn sanitize_notes(text: &str, max_chars: usize) -> String {
    let mut out = strip_urls(&normalize_dashes(text));
    out = out
        .trim_end_matches('\u{2026}')
        .trim_end_matches(|c| c == '.')
        .trim()
        .to_string();
    if out.is_empty() {
        return out;
    }
    out = truncate_at_boundary(&out, max_chars);
    ensure_sentence_end(&out)
}

fn byte_index_for_char(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
}
