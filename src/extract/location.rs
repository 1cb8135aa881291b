//! Location marker and postal code extraction.

use regex::Regex;
use std::sync::LazyLock;

// Captured text runs until the first character outside word/space/comma/period/hyphen.
static RE_LOCATION_PIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[📍📌][ \t]*([\w\t ,.-]*)").expect("valid regex"));
static RE_LOCATION_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\blocation[ \t]*:|\bbased in\b|\bfrom[ \t]*:)[ \t]*([\w\t ,.-]*)")
        .expect("valid regex")
});
static RE_POSTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{5}(?:-\d{4})?|[A-Z]\d[A-Z] ?\d[A-Z]\d)\b").expect("valid regex")
});

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub raw: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .trim()
                .trim_end_matches(['.', ',', '-'])
                .trim_end()
                .to_string()
        })
        .filter(|s| !s.is_empty())
}

/// Pin emoji first, then a `location:` / `based in` / `from:` phrase. Default when neither is present.
pub fn extract_location(bio: &str) -> Location {
    let Some(raw) =
        first_capture(&RE_LOCATION_PIN, bio).or_else(|| first_capture(&RE_LOCATION_PHRASE, bio))
    else {
        return Location::default();
    };
    let mut parts = raw.splitn(3, ',').map(|p| p.trim().to_string());
    Location {
        city: parts.next().unwrap_or_default(),
        state: parts.next().unwrap_or_default(),
        country: parts.next().unwrap_or_default(),
        raw,
    }
}

/// First US ZIP (`12345`, `12345-6789`) or Canadian (`A1A 1A1`) postal code in `bio`.
pub fn extract_postal_code(bio: &str) -> String {
    RE_POSTAL
        .find(bio)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
