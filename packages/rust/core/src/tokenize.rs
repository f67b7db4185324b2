//! Keyword extraction and module scoring.
//!
//! [`tokenize`] turns a topic name, description and hints into a keyword
//! list; [`score_modules`] ranks every module of the graph against it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use topicwiki_shared::{ModuleGraph, ModuleInfo, RelatedModule, Relevance};

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid regex"));

/// Common English words that never make useful keywords.
const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "but", "by", "can", "code", "could", "do", "does", "each", "for", "from", "has",
    "have", "how", "if", "in", "into", "is", "it", "its", "more", "most", "not", "of", "on",
    "or", "other", "our", "out", "over", "related", "should", "so", "some", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "to",
    "under", "up", "use", "used", "uses", "using", "via", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "will", "with", "within", "would", "you", "your",
    "discover",
];

/// Score for a keyword equal to a whole word of a module's id or name.
const NAME_MATCH_SCORE: u32 = 3;
/// Score for a keyword contained in a module's purpose text.
const PURPOSE_MATCH_SCORE: u32 = 2;
/// Score for a keyword contained in a module's generated article.
const ARTICLE_MATCH_SCORE: u32 = 1;

/// Extract normalized keywords from a topic name and optional description/hints.
///
/// Each input is split on hyphens, camel-case boundaries and any other
/// non-alphanumeric run; tokens are lowercased, and tokens of length ≤1 or
/// in the stop-word set are dropped. Duplicates are removed, keeping the
/// first occurrence.
pub fn tokenize(topic: &str, description: Option<&str>, hints: Option<&[String]>) -> Vec<String> {
    let mut inputs: Vec<&str> = vec![topic];
    if let Some(description) = description {
        inputs.push(description);
    }
    if let Some(hints) = hints {
        inputs.extend(hints.iter().map(String::as_str));
    }

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for input in inputs {
        for part in input.split('-') {
            let split = CAMEL_BOUNDARY.replace_all(part, "$1 $2");
            for raw in NON_ALNUM.split(&split) {
                let token = raw.to_lowercase();
                if token.chars().count() <= 1 || STOP_WORDS.contains(&token.as_str()) {
                    continue;
                }
                if seen.insert(token.clone()) {
                    keywords.push(token);
                }
            }
        }
    }

    keywords
}

/// Path of a module's generated article relative to the wiki directory.
///
/// Modules that belong to a domain live under `domains/<domain>/modules/`.
pub fn module_article_path(module: &ModuleInfo) -> PathBuf {
    match module.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(domain) => Path::new("domains")
            .join(domain)
            .join("modules")
            .join(format!("{}.md", module.id)),
        None => Path::new("modules").join(format!("{}.md", module.id)),
    }
}

/// Score every module of the graph against `keywords`.
///
/// Modules scoring zero are omitted. The result is ordered high, medium,
/// low; graph order is kept within each bucket.
pub fn score_modules(keywords: &[String], graph: &ModuleGraph, wiki_dir: &Path) -> Vec<RelatedModule> {
    let mut related: Vec<RelatedModule> = graph
        .modules
        .iter()
        .filter_map(|module| score_module(keywords, module, wiki_dir))
        .collect();

    // sort_by_key is stable
    related.sort_by_key(|m| m.relevance);

    debug!(
        keywords = keywords.len(),
        modules = graph.modules.len(),
        matched = related.len(),
        "scored modules"
    );
    related
}

fn score_module(keywords: &[String], module: &ModuleInfo, wiki_dir: &Path) -> Option<RelatedModule> {
    if keywords.is_empty() {
        return None;
    }

    let name_words: HashSet<String> = tokenize(&module.id, Some(module.name.as_str()), None)
        .into_iter()
        .collect();
    let purpose = module.purpose.to_lowercase();
    let article = std::fs::read_to_string(wiki_dir.join(module_article_path(module)))
        .map(|text| text.to_lowercase())
        .unwrap_or_default();

    let mut score = 0;
    let mut name_hits = Vec::new();
    let mut purpose_hits = Vec::new();
    let mut article_hits = Vec::new();

    for keyword in keywords {
        if name_words.contains(keyword) {
            score += NAME_MATCH_SCORE;
            name_hits.push(keyword.as_str());
        }
        if purpose.contains(keyword.as_str()) {
            score += PURPOSE_MATCH_SCORE;
            purpose_hits.push(keyword.as_str());
        }
        if !article.is_empty() && article.contains(keyword.as_str()) {
            score += ARTICLE_MATCH_SCORE;
            article_hits.push(keyword.as_str());
        }
    }

    let relevance = relevance_for(score)?;

    let mut reasons = Vec::new();
    if !name_hits.is_empty() {
        reasons.push(format!("name matches {}", name_hits.join(", ")));
    }
    if !purpose_hits.is_empty() {
        reasons.push(format!("purpose mentions {}", purpose_hits.join(", ")));
    }
    if !article_hits.is_empty() {
        reasons.push(format!("article mentions {}", article_hits.join(", ")));
    }

    Some(RelatedModule {
        module_id: module.id.clone(),
        module_name: module.name.clone(),
        path: module.path.clone(),
        relevance,
        score,
        match_reason: reasons.join("; "),
    })
}

/// Map a score to a relevance bucket. Zero maps to `None`.
pub fn relevance_for(score: u32) -> Option<Relevance> {
    match score {
        s if s >= 5 => Some(Relevance::High),
        s if s >= 3 => Some(Relevance::Medium),
        s if s > 0 => Some(Relevance::Low),
        _ => None,
    }
}
