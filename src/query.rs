// src/query.rs
//! Query shaping: cache-key normalization, marketing-noise cleanup, locale focus.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Words that describe the shopping intent rather than the product.
const NOISE_WORDS: &[&str] = &[
    "buy", "cheap", "cheapest", "best", "top", "latest", "mobile", "online", "under", "offer",
    "offers", "deal", "deals", "cost", "price", "prices",
];

const NUMBER_WORDS: &[(&str, &str)] = &[
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
    ("eleven", "11"),
    ("twelve", "12"),
    ("thirteen", "13"),
    ("fourteen", "14"),
    ("fifteen", "15"),
    ("sixteen", "16"),
    ("seventeen", "17"),
];

/// Comparison form used for cache keys: trimmed, lowercased, single-spaced.
pub fn normalize_for_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Strip marketing noise from a user query. Falls back to the trimmed input
/// when nothing product-like survives.
pub fn clean_query(raw: &str) -> String {
    static RE_PHRASE: OnceCell<Regex> = OnceCell::new();
    static RE_JUNK: OnceCell<Regex> = OnceCell::new();
    static RE_YEAR: OnceCell<Regex> = OnceCell::new();
    let re_phrase =
        RE_PHRASE.get_or_init(|| Regex::new(r"(?i)\b(price\s+in\s+india|in\s+india)\b").unwrap());
    let re_junk = RE_JUNK.get_or_init(|| Regex::new(r"[^a-z0-9\s]").unwrap());
    let re_year = RE_YEAR.get_or_init(|| Regex::new(r"^20\d{2}$").unwrap());

    let lowered = raw.to_lowercase();
    let no_phrase = re_phrase.replace_all(&lowered, " ");
    let ascii = re_junk.replace_all(&no_phrase, " ");

    let words: Vec<&str> = ascii
        .split_whitespace()
        .filter(|w| !NOISE_WORDS.contains(w) && !re_year.is_match(w))
        .map(|w| {
            NUMBER_WORDS
                .iter()
                .find(|(word, _)| *word == w)
                .map(|(_, digits)| *digits)
                .unwrap_or(w)
        })
        .collect();

    if words.is_empty() {
        return raw.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    words.join(" ")
}

/// Append the locale focus suffix unless the query already carries it.
pub fn with_locale_suffix(query: &str, suffix: Option<&str>) -> String {
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) if !query.to_lowercase().contains(&s.to_lowercase()) => format!("{query} {s}"),
        _ => query.to_string(),
    }
}

/// Short anonymized id for logs; raw queries are never logged.
pub(crate) fn anon_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
