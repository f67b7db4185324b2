//! Topic-id normalization and slug helpers.

use std::sync::LazyLock;

use regex::Regex;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Normalize a topic name into its identity form: lowercase, hyphen-separated.
///
/// `"WAL Recovery"` and `"wal_recovery"` both become `"wal-recovery"`.
pub fn normalize_topic_id(topic: &str) -> String {
    let lower = topic.trim().to_lowercase();
    NON_ALNUM
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Generate a URL-safe slug. Empty input yields `"article"`.
pub fn slugify(text: &str) -> String {
    let slug = normalize_topic_id(text);
    if slug.is_empty() {
        "article".to_string()
    } else {
        slug
    }
}

/// Turn a hyphenated id back into words: `"wal-recovery"` → `"wal recovery"`.
pub fn humanize(topic_id: &str) -> String {
    topic_id
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case a hyphenated id: `"wal-recovery"` → `"Wal Recovery"`.
pub fn title_case(topic_id: &str) -> String {
    humanize(topic_id)
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
