//! Name split, age / birth year, and gender guess.

use regex::Regex;
use std::sync::LazyLock;

static RE_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:yo|years?\s+old)\b").expect("valid regex")
});
static RE_BORN_IN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bborn\s+in\s+(\d{4})\b").expect("valid regex"));

const MALE_WORDS: &[&str] = &[
    "he", "him", "his", "male", "man", "boy", "father", "dad", "brother", "son",
];
const FEMALE_WORDS: &[&str] = &[
    "she", "her", "hers", "female", "woman", "girl", "mother", "mom", "sister", "daughter",
];

/// Birth years at or below this are treated as noise.
const MIN_BIRTH_YEAR: i32 = 1940;

/// First whitespace token is the given name; the rest, space-joined, the family name.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut tokens = full_name.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// `(age, birth_year)` as text; both empty when the bio states neither.
pub fn extract_age(bio: &str, current_year: i32) -> (String, String) {
    if let Some(age) = RE_AGE
        .captures(bio)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
    {
        return (age.to_string(), (current_year - age).to_string());
    }
    if let Some(year) = RE_BORN_IN
        .captures(bio)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        && year > MIN_BIRTH_YEAR
        && year < current_year
    {
        return ((current_year - year).to_string(), year.to_string());
    }
    (String::new(), String::new())
}

/// "M" or "F" by majority of whole-word indicator hits; empty on a tie.
pub fn guess_gender(bio: &str) -> String {
    let lower = bio.to_lowercase();
    let (mut male, mut female) = (0usize, 0usize);
    for word in lower.split(|c: char| !c.is_alphanumeric()) {
        if MALE_WORDS.contains(&word) {
            male += 1;
        } else if FEMALE_WORDS.contains(&word) {
            female += 1;
        }
    }
    match male.cmp(&female) {
        std::cmp::Ordering::Greater => "M".to_string(),
        std::cmp::Ordering::Less => "F".to_string(),
        std::cmp::Ordering::Equal => String::new(),
    }
}
