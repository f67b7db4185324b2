//! Seed builder: expand a bare topic request into a fully populated seed.

use topicwiki_shared::{TopicRequest, TopicSeed, humanize};

/// Parts shorter than this get no suffix variants.
const MIN_VARIANT_LEN: usize = 3;

/// Build a [`TopicSeed`] from a request.
///
/// A missing description becomes `"Discover code related to <topic>"`.
/// Explicit non-empty hints are kept exactly; otherwise hints are generated
/// from the topic's hyphen-delimited parts.
pub fn build_seed(request: &TopicRequest) -> TopicSeed {
    let topic_id = request.topic_id();

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Discover code related to {}", humanize(&topic_id)));

    let hints = match request.hints.as_ref().filter(|h| !h.is_empty()) {
        Some(explicit) => explicit.clone(),
        None => generate_hints(&topic_id),
    };

    TopicSeed {
        topic: topic_id,
        description,
        hints,
    }
}

/// Generate search hints for a normalized topic id.
///
/// Each part, the full id, and for parts of 3+ characters the `-ing`,
/// `-or` and `-er` variants. Order is stable and duplicates are dropped.
pub fn generate_hints(topic_id: &str) -> Vec<String> {
    let parts: Vec<&str> = topic_id.split('-').filter(|p| !p.is_empty()).collect();

    let mut hints: Vec<String> = Vec::new();
    let mut push = |hint: String| {
        if !hint.is_empty() && !hints.contains(&hint) {
            hints.push(hint);
        }
    };

    for part in &parts {
        push(part.to_string());
    }
    push(topic_id.to_string());

    for &part in &parts {
        if part.chars().count() < MIN_VARIANT_LEN {
            continue;
        }
        let stem = part.strip_suffix('e').unwrap_or(part);
        push(format!("{stem}ing"));
        push(format!("{part}or"));
        push(format!("{part}er"));
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_topic_includes_parts_and_whole() {
        let seed = build_seed(&TopicRequest::new("wal-recovery"));
        assert!(seed.hints.contains(&"wal".to_string()));
        assert!(seed.hints.contains(&"recovery".to_string()));
        assert!(seed.hints.contains(&"wal-recovery".to_string()));
        assert_eq!(seed.description, "Discover code related to wal recovery");
    }

    #[test]
    fn suffix_variants_for_long_parts() {
        let hints = generate_hints("compact");
        assert!(hints.contains(&"compacting".to_string()));
        assert!(hints.contains(&"compactor".to_string()));
        assert!(hints.contains(&"compacter".to_string()));
    }

    #[test]
    fn trailing_e_is_replaced_for_ing() {
        let hints = generate_hints("cache");
        assert!(hints.contains(&"caching".to_string()));
        assert!(!hints.contains(&"cacheing".to_string()));
        // Only -ing drops the e; -or and -er are plain suffixes.
        assert!(hints.contains(&"cacheor".to_string()));
        assert!(hints.contains(&"cacheer".to_string()));
        assert!(!hints.contains(&"cacher".to_string()));
    }

    #[test]
    fn short_parts_get_no_variants() {
        let hints = generate_hints("io");
        assert_eq!(hints, vec!["io"]);
        assert!(!hints.contains(&"ioing".to_string()));
    }

    #[test]
    fn explicit_hints_override_generation() {
        let mut request = TopicRequest::new("compaction");
        request.hints = Some(vec!["merge".into(), "sstable".into()]);
        request.description = Some("How segments merge".into());

        let seed = build_seed(&request);
        assert_eq!(seed.hints, vec!["merge", "sstable"]);
        assert_eq!(seed.description, "How segments merge");
    }

    #[test]
    fn empty_hints_are_generated() {
        let mut request = TopicRequest::new("Rate Limiting");
        request.hints = Some(vec![]);
        let seed = build_seed(&request);
        assert_eq!(seed.topic, "rate-limiting");
        assert!(!seed.hints.is_empty());
        assert_eq!(seed.hints[0], "rate");
    }
}
