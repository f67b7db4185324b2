//! Coverage detection: is a topic already documented?

use std::path::Path;

use tracing::{debug, instrument};

use topicwiki_shared::{
    CoverageStatus, ModuleGraph, RelatedModule, Relevance, TopicCoverageCheck, TopicRequest,
};

use crate::tokenize::{score_modules, tokenize};

/// Match reason attached to modules of an already generated topic.
pub const EXISTING_TOPIC_REASON: &str = "belongs to existing topic";

/// Classify a topic request against the module graph.
///
/// An exact topic-id match is `exists`. Otherwise any module scoring
/// `high` makes the topic `partial`, and no high match makes it `new`.
#[instrument(skip_all, fields(topic = %request.topic))]
pub fn check_coverage(request: &TopicRequest, graph: &ModuleGraph, wiki_dir: &Path) -> TopicCoverageCheck {
    let topic_id = request.topic_id();

    if let Some(existing) = graph.topic(&topic_id) {
        let related_modules = existing
            .involved_module_ids
            .iter()
            .map(|id| {
                let module = graph.module(id);
                RelatedModule {
                    module_id: id.clone(),
                    module_name: module.map(|m| m.name.clone()).unwrap_or_else(|| id.clone()),
                    path: module.map(|m| m.path.clone()).unwrap_or_default(),
                    relevance: Relevance::High,
                    score: 0,
                    match_reason: EXISTING_TOPIC_REASON.to_string(),
                }
            })
            .collect();

        debug!(topic_id, "topic already generated");
        return TopicCoverageCheck {
            status: CoverageStatus::Exists,
            existing_article_path: existing.articles.first().map(|a| a.path.clone()),
            related_modules,
        };
    }

    let keywords = tokenize(
        &request.topic,
        request.description.as_deref(),
        request.hints.as_deref(),
    );
    let related_modules = score_modules(&keywords, graph, wiki_dir);

    let status = if related_modules.iter().any(|m| m.relevance == Relevance::High) {
        CoverageStatus::Partial
    } else {
        CoverageStatus::New
    };

    debug!(topic_id, %status, related = related_modules.len(), "coverage checked");
    TopicCoverageCheck {
        status,
        existing_article_path: None,
        related_modules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use topicwiki_shared::{ModuleInfo, TopicAreaMeta, TopicArticleRef, TopicLayout};

    fn graph() -> ModuleGraph {
        ModuleGraph {
            modules: vec![
                ModuleInfo {
                    id: "auth".into(),
                    name: "Authentication".into(),
                    path: "src/auth".into(),
                    purpose: "Session tokens and login".into(),
                    ..Default::default()
                },
                ModuleInfo {
                    id: "storage".into(),
                    name: "Storage".into(),
                    path: "src/storage".into(),
                    purpose: "Persists rows".into(),
                    ..Default::default()
                },
            ],
            topics: vec![TopicAreaMeta {
                id: "compaction".into(),
                title: "Compaction".into(),
                description: String::new(),
                layout: TopicLayout::Single,
                articles: vec![TopicArticleRef {
                    slug: "index".into(),
                    title: "Compaction".into(),
                    path: "topics/compaction.md".into(),
                }],
                involved_module_ids: vec!["storage".into(), "gone".into()],
                directory_path: "topics".into(),
                generated_at: Utc::now(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn exact_topic_match_exists() {
        let check = check_coverage(&TopicRequest::new("Compaction"), &graph(), Path::new("/nonexistent"));
        assert_eq!(check.status, CoverageStatus::Exists);
        assert_eq!(check.existing_article_path.as_deref(), Some("topics/compaction.md"));
        assert_eq!(check.related_modules.len(), 2);
        assert!(check.related_modules.iter().all(|m| m.relevance == Relevance::High));
        assert_eq!(check.related_modules[0].module_name, "Storage");
        assert_eq!(check.related_modules[1].module_name, "gone");
        assert_eq!(check.related_modules[0].match_reason, EXISTING_TOPIC_REASON);
    }

    #[test]
    fn single_high_match_is_partial() {
        let mut request = TopicRequest::new("login");
        request.hints = Some(vec!["auth".into()]);
        let check = check_coverage(&request, &graph(), Path::new("/nonexistent"));
        assert_eq!(check.status, CoverageStatus::Partial);
        assert_eq!(check.related_modules[0].module_id, "auth");
        assert!(check.existing_article_path.is_none());
    }

    #[test]
    fn medium_match_alone_is_new() {
        let check = check_coverage(&TopicRequest::new("storage"), &graph(), Path::new("/nonexistent"));
        assert_eq!(check.status, CoverageStatus::New);
        assert_eq!(check.related_modules.len(), 1);
        assert_eq!(check.related_modules[0].relevance, Relevance::Medium);
    }

    #[test]
    fn no_match_is_new() {
        let check = check_coverage(
            &TopicRequest::new("observability"),
            &graph(),
            Path::new("/nonexistent"),
        );
        assert_eq!(check.status, CoverageStatus::New);
        assert!(check.related_modules.is_empty());
    }
}
