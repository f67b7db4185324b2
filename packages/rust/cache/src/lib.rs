//! Content-hash-keyed artifact cache for the topic pipeline.
//!
//! The [`ArtifactCache`] stores one directory per topic under
//! `<wikiDir>/.wiki-cache/topics/`:
//!
//! ```text
//! <topicId>/
//! ├── probe-result.json
//! ├── outline.json
//! ├── analysis.json
//! └── articles/
//!     ├── index.json
//!     └── <slug>.json
//! ```
//!
//! Every file is an envelope `{ "gitHash", "timestamp", "<payloadKey>": ... }`.
//!
//! **Access rules:**
//! - Reads never fail: a missing, unreadable, or corrupted file is a miss.
//! - Writes are atomic per file (temp file + rename); the cache assumes a
//!   single writer process.

mod artifact;

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use topicwiki_shared::{
    EnrichedProbeResult, Result, TopicAnalysis, TopicArticle, TopicOutline, TopicWikiError,
    slugify,
};

pub use artifact::{Artifact, TopicArtifact};

/// Cache directory name inside the wiki directory.
pub const CACHE_DIR_NAME: &str = ".wiki-cache";

/// Sub-directory holding per-topic caches.
pub const TOPICS_DIR_NAME: &str = "topics";

/// Sub-directory of a topic cache holding one file per article.
pub const ARTICLES_DIR_NAME: &str = "articles";

/// A cached payload together with its invalidation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Repository content hash at the time the payload was written.
    pub git_hash: String,
    /// Unix timestamp (milliseconds) of the write.
    pub timestamp: i64,
    pub payload: T,
}

/// Filesystem-backed store for pipeline artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    topics_root: PathBuf,
}

impl ArtifactCache {
    /// Open the cache of a wiki directory. Nothing is created until the first write.
    pub fn new(wiki_dir: &Path) -> Self {
        Self {
            topics_root: wiki_dir.join(CACHE_DIR_NAME).join(TOPICS_DIR_NAME),
        }
    }

    /// Root directory holding all topic caches.
    pub fn topics_root(&self) -> &Path {
        &self.topics_root
    }

    /// Cache directory of one topic.
    pub fn topic_dir(&self, topic_id: &str) -> PathBuf {
        self.topics_root.join(safe_file_stem(topic_id))
    }

    // -----------------------------------------------------------------------
    // Topic-level artifacts (probe, outline, analysis)
    // -----------------------------------------------------------------------

    /// Write a topic-level artifact, replacing any previous version.
    pub fn save<T: TopicArtifact>(&self, topic_id: &str, payload: &T, git_hash: &str) -> Result<()> {
        let path = self.topic_dir(topic_id).join(T::FILE_NAME);
        write_envelope(&path, payload, git_hash)?;
        debug!(topic_id, file = T::FILE_NAME, "cached artifact");
        Ok(())
    }

    /// Read a topic-level artifact. `None` on any miss or corruption.
    pub fn load<T: TopicArtifact>(&self, topic_id: &str) -> Option<T> {
        self.load_envelope::<T>(topic_id).map(|env| env.payload)
    }

    /// Read a topic-level artifact with its envelope metadata.
    pub fn load_envelope<T: TopicArtifact>(&self, topic_id: &str) -> Option<CacheEnvelope<T>> {
        read_envelope(&self.topic_dir(topic_id).join(T::FILE_NAME))
    }

    pub fn save_probe_result(
        &self,
        topic_id: &str,
        probe: &EnrichedProbeResult,
        git_hash: &str,
    ) -> Result<()> {
        self.save(topic_id, probe, git_hash)
    }

    pub fn get_probe_result(&self, topic_id: &str) -> Option<EnrichedProbeResult> {
        self.load(topic_id)
    }

    pub fn save_outline(&self, topic_id: &str, outline: &TopicOutline, git_hash: &str) -> Result<()> {
        self.save(topic_id, outline, git_hash)
    }

    pub fn get_outline(&self, topic_id: &str) -> Option<TopicOutline> {
        self.load(topic_id)
    }

    pub fn save_analysis(
        &self,
        topic_id: &str,
        analysis: &TopicAnalysis,
        git_hash: &str,
    ) -> Result<()> {
        self.save(topic_id, analysis, git_hash)
    }

    pub fn get_analysis(&self, topic_id: &str) -> Option<TopicAnalysis> {
        self.load(topic_id)
    }

    // -----------------------------------------------------------------------
    // Articles
    // -----------------------------------------------------------------------

    /// Write one article. Independent of every other article's presence.
    pub fn save_article(&self, topic_id: &str, article: &TopicArticle, git_hash: &str) -> Result<()> {
        let path = self.article_path(topic_id, &article.slug);
        write_envelope(&path, article, git_hash)?;
        debug!(topic_id, slug = %article.slug, "cached article");
        Ok(())
    }

    /// Read one article by slug. `None` on any miss or corruption.
    pub fn get_article(&self, topic_id: &str, slug: &str) -> Option<TopicArticle> {
        read_envelope::<TopicArticle>(&self.article_path(topic_id, slug)).map(|env| env.payload)
    }

    /// Read every cached article of a topic, skipping files that fail to parse.
    ///
    /// The `index` article comes first, the rest are ordered by slug.
    pub fn get_all_articles(&self, topic_id: &str) -> Vec<TopicArticle> {
        let dir = self.topic_dir(topic_id).join(ARTICLES_DIR_NAME);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut articles: Vec<TopicArticle> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| read_envelope::<TopicArticle>(&path))
            .map(|env| env.payload)
            .collect();

        articles.sort_by(|a, b| {
            (a.slug != "index")
                .cmp(&(b.slug != "index"))
                .then_with(|| a.slug.cmp(&b.slug))
        });
        articles
    }

    fn article_path(&self, topic_id: &str, slug: &str) -> PathBuf {
        self.topic_dir(topic_id)
            .join(ARTICLES_DIR_NAME)
            .join(format!("{}.json", safe_file_stem(slug)))
    }

    // -----------------------------------------------------------------------
    // Validity
    // -----------------------------------------------------------------------

    /// Hash stored with the cached probe result, if readable.
    pub fn cached_hash(&self, topic_id: &str) -> Option<String> {
        self.load_envelope::<EnrichedProbeResult>(topic_id)
            .map(|env| env.git_hash)
    }

    /// `true` iff a probe result is cached and was written for `git_hash`.
    pub fn is_valid(&self, topic_id: &str, git_hash: &str) -> bool {
        self.cached_hash(topic_id)
            .is_some_and(|cached| cached == git_hash)
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Ids of every topic with a cache directory.
    pub fn list_topics(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.topics_root) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Remove one topic's cache. Returns whether anything existed.
    pub fn clear_topic(&self, topic_id: &str) -> Result<bool> {
        let dir = self.topic_dir(topic_id);
        remove_dir(&dir)
    }

    /// Remove every topic cache. Returns whether anything existed.
    pub fn clear_all(&self) -> Result<bool> {
        remove_dir(&self.topics_root)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Restrict a cache key to characters that are safe as a file name.
fn safe_file_stem(key: &str) -> String {
    let trimmed = key.trim();
    if !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        trimmed.to_string()
    } else {
        slugify(trimmed)
    }
}

/// Write `payload` wrapped in an envelope, atomically (temp file, then rename).
fn write_envelope<T: Artifact>(path: &Path, payload: &T, git_hash: &str) -> Result<()> {
    let payload_value = serde_json::to_value(payload).map_err(|e| {
        TopicWikiError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let mut envelope = Map::new();
    envelope.insert("gitHash".into(), Value::String(git_hash.to_string()));
    envelope.insert("timestamp".into(), Value::from(Utc::now().timestamp_millis()));
    envelope.insert(T::PAYLOAD_KEY.into(), payload_value);

    let json = serde_json::to_string_pretty(&Value::Object(envelope)).map_err(|e| {
        TopicWikiError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let parent = path
        .parent()
        .ok_or_else(|| TopicWikiError::validation(format!("invalid cache path {}", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| TopicWikiError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, json).map_err(|e| TopicWikiError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| TopicWikiError::io(path, e))?;
    Ok(())
}

/// Read and validate an envelope. Every failure mode is a miss.
fn read_envelope<T: Artifact>(path: &Path) -> Option<CacheEnvelope<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cache miss");
            return None;
        }
    };

    let value: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupted cache file, ignoring");
            return None;
        }
    };

    let envelope = match parse_envelope::<T>(value) {
        Some(envelope) => envelope,
        None => {
            warn!(path = %path.display(), "cache file missing required fields, ignoring");
            return None;
        }
    };

    Some(envelope)
}

fn parse_envelope<T: Artifact>(value: Value) -> Option<CacheEnvelope<T>> {
    let Value::Object(mut map) = value else {
        return None;
    };

    let git_hash = map.get("gitHash")?.as_str()?.to_string();
    let timestamp = map.get("timestamp")?.as_i64()?;
    let payload_value = map.remove(T::PAYLOAD_KEY)?;
    if !payload_value.is_object() {
        return None;
    }

    let payload: T = serde_json::from_value(payload_value).ok()?;
    if !payload.is_complete() {
        return None;
    }

    Some(CacheEnvelope {
        git_hash,
        timestamp,
        payload,
    })
}

fn remove_dir(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(dir).map_err(|e| TopicWikiError::io(dir, e))?;
    info!(path = %dir.display(), "cleared cache");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use topicwiki_shared::{
        ArticleType, ProbeFoundModule, ProbeResult, TopicArticlePlan, TopicLayout,
    };

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tw-cache-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_probe() -> EnrichedProbeResult {
        EnrichedProbeResult {
            probe_result: ProbeResult {
                topic: "compaction".into(),
                found_modules: vec![ProbeFoundModule {
                    id: "storage".into(),
                    name: "Storage".into(),
                    path: "src/storage".into(),
                    purpose: "Persists data".into(),
                    key_files: vec!["src/storage/compact.rs".into()],
                    evidence: "compaction loop".into(),
                }],
                summary: "Compaction lives in storage".into(),
            },
            existing_module_ids: vec!["storage".into()],
            new_module_ids: vec![],
            all_key_files: vec!["src/storage/compact.rs".into()],
        }
    }

    fn make_outline(title: &str) -> TopicOutline {
        TopicOutline {
            topic_id: "compaction".into(),
            title: title.into(),
            layout: TopicLayout::Single,
            articles: vec![TopicArticlePlan {
                slug: "index".into(),
                title: title.into(),
                description: "Overview".into(),
                is_index: true,
                covered_module_ids: vec!["storage".into()],
                covered_files: vec![],
            }],
            involved_modules: vec![],
        }
    }

    fn make_article(slug: &str) -> TopicArticle {
        TopicArticle {
            article_type: ArticleType::for_slug(slug),
            slug: slug.into(),
            title: format!("Article {slug}"),
            content: format!("# {slug}\n"),
            topic_id: "compaction".into(),
            covered_module_ids: vec!["storage".into()],
        }
    }

    #[test]
    fn probe_roundtrip_and_envelope() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        let probe = make_probe();

        cache.save_probe_result("compaction", &probe, "abc123").unwrap();
        assert_eq!(cache.get_probe_result("compaction"), Some(probe));

        let path = tmp.join(".wiki-cache/topics/compaction/probe-result.json");
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["gitHash"], "abc123");
        assert!(raw["timestamp"].as_i64().unwrap() > 0);
        assert!(raw["probeResult"].is_object());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn later_save_wins() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);

        cache.save_outline("compaction", &make_outline("First"), "h1").unwrap();
        cache.save_outline("compaction", &make_outline("Second"), "h2").unwrap();

        assert_eq!(cache.get_outline("compaction").unwrap().title, "Second");
        let env = cache.load_envelope::<TopicOutline>("compaction").unwrap();
        assert_eq!(env.git_hash, "h2");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn analysis_roundtrip() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        let analysis = TopicAnalysis {
            topic_id: "compaction".into(),
            overview: "Merges segments".into(),
            ..Default::default()
        };

        cache.save_analysis("compaction", &analysis, "h").unwrap();
        assert_eq!(cache.get_analysis("compaction"), Some(analysis));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn corrupted_files_read_as_missing() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        let dir = cache.topic_dir("compaction");
        std::fs::create_dir_all(&dir).unwrap();

        std::fs::write(dir.join("probe-result.json"), "{ not json").unwrap();
        std::fs::write(dir.join("outline.json"), r#"{"gitHash":"h","timestamp":1}"#).unwrap();
        std::fs::write(dir.join("analysis.json"), r#"{"timestamp":1,"analysis":{"topicId":"x"}}"#)
            .unwrap();

        assert!(cache.get_probe_result("compaction").is_none());
        assert!(cache.get_outline("compaction").is_none());
        assert!(cache.get_analysis("compaction").is_none());
        assert!(!cache.is_valid("compaction", "h"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn probe_missing_its_fields_is_a_miss() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        let dir = cache.topic_dir("compaction");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("probe-result.json"),
            r#"{"gitHash":"h","timestamp":1,"probeResult":{"unrelated":true}}"#,
        )
        .unwrap();

        assert!(cache.get_probe_result("compaction").is_none());
        assert!(!cache.is_valid("compaction", "h"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn outline_without_articles_is_a_miss() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        let dir = cache.topic_dir("compaction");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("outline.json"),
            r#"{"gitHash":"h","timestamp":1,"outline":{"topicId":"compaction","articles":[]}}"#,
        )
        .unwrap();

        assert!(cache.get_outline("compaction").is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn articles_save_independently() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);

        cache.save_article("compaction", &make_article("merge-policy"), "h").unwrap();
        assert!(cache.get_article("compaction", "index").is_none());
        assert_eq!(
            cache.get_article("compaction", "merge-policy").unwrap().title,
            "Article merge-policy"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bulk_read_skips_corrupted_siblings() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);

        cache.save_article("compaction", &make_article("zeta"), "h").unwrap();
        cache.save_article("compaction", &make_article("index"), "h").unwrap();
        cache.save_article("compaction", &make_article("alpha"), "h").unwrap();

        let articles_dir = cache.topic_dir("compaction").join(ARTICLES_DIR_NAME);
        std::fs::write(articles_dir.join("broken.json"), "{{{").unwrap();
        std::fs::write(articles_dir.join("partial.json"), r#"{"gitHash":"h","timestamp":1}"#).unwrap();
        std::fs::write(articles_dir.join("notes.txt"), "ignored").unwrap();

        let slugs: Vec<String> = cache
            .get_all_articles("compaction")
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(slugs, vec!["index", "alpha", "zeta"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bulk_read_of_unknown_topic_is_empty() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        assert!(cache.get_all_articles("nothing").is_empty());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn validity_tracks_probe_hash() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);

        assert!(!cache.is_valid("compaction", "abc"));

        cache.save_probe_result("compaction", &make_probe(), "abc").unwrap();
        assert!(cache.is_valid("compaction", "abc"));
        assert!(!cache.is_valid("compaction", "def"));
        assert_eq!(cache.cached_hash("compaction").as_deref(), Some("abc"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn clear_topic_leaves_siblings_intact() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);

        cache.save_probe_result("compaction", &make_probe(), "h").unwrap();
        cache.save_probe_result("recovery", &make_probe(), "h").unwrap();
        cache.save_article("recovery", &make_article("index"), "h").unwrap();

        assert!(cache.clear_topic("compaction").unwrap());
        assert!(!cache.clear_topic("compaction").unwrap());

        assert!(cache.get_probe_result("compaction").is_none());
        assert!(cache.get_probe_result("recovery").is_some());
        assert_eq!(cache.get_all_articles("recovery").len(), 1);
        assert_eq!(cache.list_topics(), vec!["recovery"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn clear_all_reports_whether_anything_existed() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);

        assert!(!cache.clear_all().unwrap());

        cache.save_outline("compaction", &make_outline("T"), "h").unwrap();
        assert!(cache.clear_all().unwrap());
        assert!(!cache.topics_root().exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unsafe_keys_are_sanitized() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        assert!(cache.topic_dir("../escape").starts_with(cache.topics_root()));
        assert!(cache.topic_dir("../escape").ends_with("escape"));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = temp_dir();
        let cache = ArtifactCache::new(&tmp);
        cache.save_article("compaction", &make_article("index"), "h").unwrap();

        let dir = cache.topic_dir("compaction").join(ARTICLES_DIR_NAME);
        for entry in std::fs::read_dir(&dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
