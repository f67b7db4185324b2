//! Core domain types: the module graph, topic requests, and every artifact
//! produced by the topic pipeline.
//!
//! JSON field names are camelCase so that `module-graph.json` and the cache
//! files stay readable by the rest of the wiki tooling.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::ids::normalize_topic_id;

// ---------------------------------------------------------------------------
// Module graph
// ---------------------------------------------------------------------------

/// Project metadata stored at the top of `module-graph.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<String>,
}

/// A module (component) of the analysed codebase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
    pub path: String,
    pub purpose: String,
    pub key_files: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<String>,
    pub complexity: String,
    pub category: String,
    /// Owning domain id, for wikis organised by domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// A higher-level grouping of modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainInfo {
    pub id: String,
    pub name: String,
    pub path: String,
    pub description: String,
    pub modules: Vec<String>,
}

/// The existing knowledge base (`<wikiDir>/module-graph.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleGraph {
    pub project: ProjectInfo,
    pub modules: Vec<ModuleInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<DomainInfo>,
    /// Entries that do not parse are dropped one by one, so a single foreign
    /// record never hides the rest of the graph.
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_topics")]
    pub topics: Vec<TopicAreaMeta>,
}

fn lenient_topics<'de, D>(deserializer: D) -> std::result::Result<Vec<TopicAreaMeta>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed topic entry in module graph");
                None
            }
        })
        .collect())
}

impl ModuleGraph {
    /// Look up a module by id.
    pub fn module(&self, id: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Look up a previously generated topic by its normalized id.
    pub fn topic(&self, topic_id: &str) -> Option<&TopicAreaMeta> {
        self.topics.iter().find(|t| t.id == topic_id)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How finely a topic is decomposed into articles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Shallow,
    #[default]
    Normal,
    Deep,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shallow => "shallow",
            Self::Normal => "normal",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Depth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shallow" => Ok(Self::Shallow),
            "normal" => Ok(Self::Normal),
            "deep" => Ok(Self::Deep),
            other => Err(format!(
                "invalid depth '{other}': expected shallow, normal, or deep"
            )),
        }
    }
}

/// One comprehensive article vs. an index plus focused sub-articles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicLayout {
    #[default]
    Single,
    Area,
}

impl TopicLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Area => "area",
        }
    }
}

impl fmt::Display for TopicLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Requests and seeds
// ---------------------------------------------------------------------------

/// A caller's request to document a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRequest {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<String>>,
}

impl TopicRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            description: None,
            hints: None,
        }
    }

    /// Identity of the request: the normalized topic name.
    pub fn topic_id(&self) -> String {
        normalize_topic_id(&self.topic)
    }
}

/// A fully populated topic request, produced by the seed builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSeed {
    pub topic: String,
    pub description: String,
    pub hints: Vec<String>,
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

/// Whether a topic is already documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Exists,
    Partial,
    New,
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exists => "exists",
            Self::Partial => "partial",
            Self::New => "new",
        })
    }
}

/// How strongly a module relates to a topic. Ordered high → low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

/// A module scored against a topic's keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedModule {
    pub module_id: String,
    pub module_name: String,
    pub path: String,
    pub relevance: Relevance,
    pub score: u32,
    pub match_reason: String,
}

/// Outcome of the coverage check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCoverageCheck {
    pub status: CoverageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_article_path: Option<String>,
    pub related_modules: Vec<RelatedModule>,
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// A module the probe found relevant to the topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeFoundModule {
    pub id: String,
    pub name: String,
    pub path: String,
    pub purpose: String,
    pub key_files: Vec<String>,
    pub evidence: String,
}

/// Raw probe output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeResult {
    pub topic: String,
    pub found_modules: Vec<ProbeFoundModule>,
    pub summary: String,
}

/// Probe findings partitioned against the module graph.
///
/// `existing_module_ids` and `new_module_ids` are disjoint and together hold
/// every id in `probe_result.found_modules`. `all_key_files` is deduplicated
/// in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichedProbeResult {
    pub probe_result: ProbeResult,
    pub existing_module_ids: Vec<String>,
    pub new_module_ids: Vec<String>,
    pub all_key_files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// One planned article of a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicArticlePlan {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub is_index: bool,
    pub covered_module_ids: Vec<String>,
    pub covered_files: Vec<String>,
}

/// A module taking part in a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicInvolvedModule {
    pub module_id: String,
    pub role: String,
    pub key_files: Vec<String>,
}

/// The planned set of articles for a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicOutline {
    pub topic_id: String,
    pub title: String,
    pub layout: TopicLayout,
    pub articles: Vec<TopicArticlePlan>,
    pub involved_modules: Vec<TopicInvolvedModule>,
}

impl TopicOutline {
    /// The index article, if the outline has one.
    pub fn index_article(&self) -> Option<&TopicArticlePlan> {
        self.articles.iter().find(|a| a.is_index)
    }

    pub fn article(&self, slug: &str) -> Option<&TopicArticlePlan> {
        self.articles.iter().find(|a| a.slug == slug)
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Analysis notes for a single planned article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleAnalysis {
    pub slug: String,
    pub key_points: Vec<String>,
    pub key_files: Vec<String>,
    pub notes: String,
}

/// Topic-wide analysis feeding article generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicAnalysis {
    pub topic_id: String,
    pub overview: String,
    pub data_flow: String,
    pub cross_cutting_concerns: Vec<String>,
    pub articles: Vec<ArticleAnalysis>,
}

impl TopicAnalysis {
    pub fn for_article(&self, slug: &str) -> Option<&ArticleAnalysis> {
        self.articles.iter().find(|a| a.slug == slug)
    }
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// Kind of a generated article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticleType {
    TopicIndex,
    TopicArticle,
}

impl ArticleType {
    /// `topic-index` for the `index` slug, `topic-article` otherwise.
    pub fn for_slug(slug: &str) -> Self {
        if slug == "index" {
            Self::TopicIndex
        } else {
            Self::TopicArticle
        }
    }
}

/// A generated markdown article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicArticle {
    #[serde(rename = "type")]
    pub article_type: ArticleType,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub topic_id: String,
    #[serde(default)]
    pub covered_module_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Wiki record
// ---------------------------------------------------------------------------

/// Reference to a written article, relative to the wiki directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicArticleRef {
    pub slug: String,
    pub title: String,
    pub path: String,
}

/// The durable, wiki-visible record of a generated topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAreaMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layout: TopicLayout,
    #[serde(default)]
    pub articles: Vec<TopicArticleRef>,
    #[serde(default)]
    pub involved_module_ids: Vec<String>,
    #[serde(default)]
    pub directory_path: String,
    #[serde(with = "generated_at")]
    pub generated_at: DateTime<Utc>,
}

/// `generatedAt` is written as epoch milliseconds; RFC 3339 strings from
/// other wiki tooling are accepted on read.
mod generated_at {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stamp {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.timestamp_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let millis = match Stamp::deserialize(deserializer)? {
            Stamp::Millis(ms) => ms,
            Stamp::Fractional(ms) => ms as i64,
            Stamp::Text(text) => {
                return DateTime::parse_from_rfc3339(text.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| D::Error::custom(format!("invalid generatedAt {text:?}: {e}")));
            }
        };
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| D::Error::custom(format!("generatedAt out of range: {millis}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_graph_tolerates_missing_sections() {
        let json = r#"{
            "project": { "name": "demo", "language": "Rust" },
            "modules": [
                { "id": "storage", "name": "Storage", "path": "src/storage", "purpose": "Persists data", "keyFiles": ["src/storage/mod.rs"] }
            ],
            "categories": ["core"]
        }"#;
        let graph: ModuleGraph = serde_json::from_str(json).expect("parse graph");
        assert_eq!(graph.project.name, "demo");
        assert_eq!(graph.modules[0].key_files, vec!["src/storage/mod.rs"]);
        assert!(graph.topics.is_empty());
        assert!(graph.module("storage").is_some());
    }

    #[test]
    fn topic_meta_uses_millisecond_timestamps() {
        let json = r#"{
            "id": "compaction",
            "title": "Compaction",
            "layout": "area",
            "articles": [{ "slug": "index", "title": "Compaction", "path": "topics/compaction/index.md" }],
            "involvedModuleIds": ["storage"],
            "directoryPath": "topics/compaction",
            "generatedAt": 1700000000000
        }"#;
        let meta: TopicAreaMeta = serde_json::from_str(json).expect("parse meta");
        assert_eq!(meta.layout, TopicLayout::Area);
        assert_eq!(meta.generated_at.timestamp_millis(), 1_700_000_000_000);

        let back = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(back["generatedAt"], 1_700_000_000_000i64);
    }

    #[test]
    fn topic_meta_accepts_rfc3339_timestamps() {
        let json = r#"{ "id": "compaction", "title": "Compaction", "generatedAt": "2024-05-01T10:00:00.000Z" }"#;
        let meta: TopicAreaMeta = serde_json::from_str(json).expect("parse meta");
        assert_eq!(meta.generated_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let back = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(back["generatedAt"], meta.generated_at.timestamp_millis());
    }

    #[test]
    fn malformed_topic_entries_are_skipped_individually() {
        let json = r#"{
            "modules": [{ "id": "storage", "name": "Storage", "path": "src/storage" }],
            "topics": [
                { "title": "No id", "generatedAt": 1700000000000 },
                { "id": "recovery", "title": "Recovery", "generatedAt": "yesterday" },
                { "id": "compaction", "title": "Compaction", "generatedAt": "2024-05-01T10:00:00.000Z" }
            ]
        }"#;
        let graph: ModuleGraph = serde_json::from_str(json).expect("parse graph");
        assert_eq!(graph.modules.len(), 1);
        assert_eq!(graph.topics.len(), 1);
        assert!(graph.topic("compaction").is_some());
    }

    #[test]
    fn article_type_serializes_kebab_case() {
        let article = TopicArticle {
            article_type: ArticleType::for_slug("index"),
            slug: "index".into(),
            title: "Overview".into(),
            content: "# Overview".into(),
            topic_id: "compaction".into(),
            covered_module_ids: vec![],
        };
        let json = serde_json::to_value(&article).expect("serialize");
        assert_eq!(json["type"], "topic-index");
        assert_eq!(ArticleType::for_slug("merge"), ArticleType::TopicArticle);
    }

    #[test]
    fn request_identity_is_normalized() {
        let request = TopicRequest::new("WAL Recovery");
        assert_eq!(request.topic_id(), "wal-recovery");
    }

    #[test]
    fn depth_parses_case_insensitively() {
        assert_eq!("Deep".parse::<Depth>(), Ok(Depth::Deep));
        assert!("extreme".parse::<Depth>().is_err());
    }

    #[test]
    fn relevance_orders_high_first() {
        let mut levels = vec![Relevance::Low, Relevance::High, Relevance::Medium];
        levels.sort();
        assert_eq!(levels, vec![Relevance::High, Relevance::Medium, Relevance::Low]);
    }
}
