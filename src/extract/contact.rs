//! Email and phone extraction. Both return up to three values, padded with empty strings.

use regex::Regex;
use std::sync::LazyLock;

use super::pad_three;

static RE_EMAIL_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").expect("valid regex"));
static RE_EMAIL_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:e-mail|email|mail|contact)[\s:]+(\S+@\S+)").expect("valid regex")
});
static RE_EMAIL_VALID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.+-]+@[\w-]+(?:\.[\w-]+)*\.[A-Za-z]{2,}$").expect("valid regex")
});

static RE_PHONE_GENERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[-\s]?)?\(?\d{3}\)?[-\s]?\d{3}[-\s]?\d{4}").expect("valid regex")
});
static RE_PHONE_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:phone|tel|call|text)[\s:]+([+\d()\s-]{7,})").expect("valid regex")
});
static RE_PHONE_VALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{7,15}$").expect("valid regex"));

/// Trim wrapping punctuation and trailing dots, lowercase. None when the result is not a valid address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim_matches(|c: char| {
            matches!(c, '<' | '>' | '(' | ')' | '"' | '\'' | ',' | ';' | ':' | '.')
        });
    let lower = trimmed.to_lowercase();
    RE_EMAIL_VALID.is_match(&lower).then_some(lower)
}

/// Keep digits and `+` only. None when the result is not 7..=15 digits with an optional leading `+`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    RE_PHONE_VALID.is_match(&digits).then_some(digits)
}

/// Normalized, deduplicated values ordered by where they start in the text.
fn ordered_unique(mut found: Vec<(usize, String)>) -> Vec<String> {
    found.sort_by_key(|(pos, _)| *pos);
    let mut out: Vec<String> = Vec::with_capacity(found.len());
    for (_, v) in found {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// First three distinct emails in `text`, lowercased.
pub fn extract_emails(text: &str) -> [String; 3] {
    let mut found: Vec<(usize, String)> = RE_EMAIL_SCAN
        .find_iter(text)
        .filter_map(|m| normalize_email(m.as_str()).map(|e| (m.start(), e)))
        .collect();
    for caps in RE_EMAIL_LABELLED.captures_iter(text) {
        if let Some(m) = caps.get(1)
            && let Some(e) = normalize_email(m.as_str())
        {
            found.push((m.start(), e));
        }
    }
    pad_three(ordered_unique(found))
}

/// First three distinct phone numbers in `text`, digits (and leading `+`) only.
pub fn extract_phones(text: &str) -> [String; 3] {
    let mut found: Vec<(usize, String)> = RE_PHONE_GENERIC
        .find_iter(text)
        .filter_map(|m| normalize_phone(m.as_str()).map(|p| (m.start(), p)))
        .collect();
    for caps in RE_PHONE_LABELLED.captures_iter(text) {
        if let Some(m) = caps.get(1)
            && let Some(p) = normalize_phone(m.as_str())
        {
            found.push((m.start(), p));
        }
    }
    pad_three(ordered_unique(found))
}
