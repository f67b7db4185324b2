//! Wiki integration: write topic articles, record the topic in
//! `module-graph.json`, and cross-link module articles.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use topicwiki_shared::{
    ModuleGraph, Result, TopicArticle, TopicArticleRef, TopicAreaMeta, TopicLayout, TopicOutline,
    TopicWikiError,
};

use crate::tokenize::module_article_path;

/// Knowledge-graph file inside the wiki directory.
pub const MODULE_GRAPH_FILE: &str = "module-graph.json";

/// Directory holding generated topic articles.
pub const TOPICS_DIR: &str = "topics";

/// Heading of the section cross-linking module articles to topics.
pub const RELATED_TOPICS_HEADING: &str = "## Related Topics";

/// Load `module-graph.json`. A missing or corrupted file reads as `None`.
pub fn load_module_graph(wiki_dir: &Path) -> Option<ModuleGraph> {
    let path = wiki_dir.join(MODULE_GRAPH_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no module graph");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(graph) => Some(graph),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupted module graph, ignoring");
            None
        }
    }
}

/// What integration wrote.
#[derive(Debug, Clone)]
pub struct IntegrationReport {
    pub meta: TopicAreaMeta,
    /// Absolute paths of the written article files.
    pub written: Vec<PathBuf>,
    /// Module ids whose articles received a topic link.
    pub cross_linked: Vec<String>,
}

/// Write the articles of a topic into the wiki and record the topic.
///
/// `articles` may be a subset of the outline (failed slugs are absent);
/// they are written in outline order.
#[instrument(skip_all, fields(topic = %outline.topic_id, layout = %outline.layout))]
pub fn integrate_topic(
    wiki_dir: &Path,
    outline: &TopicOutline,
    description: &str,
    articles: &[TopicArticle],
    graph: Option<&ModuleGraph>,
    cross_link: bool,
) -> Result<IntegrationReport> {
    if articles.is_empty() {
        return Err(TopicWikiError::Integration(format!(
            "no articles to write for topic '{}'",
            outline.topic_id
        )));
    }

    let topic_id = outline.topic_id.as_str();
    let directory_path = match outline.layout {
        TopicLayout::Single => TOPICS_DIR.to_string(),
        TopicLayout::Area => format!("{TOPICS_DIR}/{topic_id}"),
    };

    let mut refs = Vec::new();
    let mut written = Vec::new();
    for plan in &outline.articles {
        let Some(article) = articles.iter().find(|a| a.slug == plan.slug) else {
            continue;
        };
        let relative = match outline.layout {
            TopicLayout::Single => format!("{TOPICS_DIR}/{topic_id}.md"),
            TopicLayout::Area => format!("{directory_path}/{}.md", article.slug),
        };
        let path = wiki_dir.join(&relative);
        write_atomic(&path, &article.content).map_err(integration_error)?;
        debug!(path = %path.display(), "wrote article");

        refs.push(TopicArticleRef {
            slug: article.slug.clone(),
            title: article.title.clone(),
            path: relative,
        });
        written.push(path);

        if outline.layout == TopicLayout::Single {
            break;
        }
    }

    let meta = TopicAreaMeta {
        id: topic_id.to_string(),
        title: outline.title.clone(),
        description: description.to_string(),
        layout: outline.layout,
        articles: refs,
        involved_module_ids: outline
            .involved_modules
            .iter()
            .map(|m| m.module_id.clone())
            .collect(),
        directory_path,
        generated_at: Utc::now(),
    };

    record_topic(wiki_dir, &meta).map_err(integration_error)?;

    let cross_linked = match (cross_link, graph) {
        (true, Some(graph)) => cross_link_modules(wiki_dir, graph, &meta),
        _ => Vec::new(),
    };

    info!(
        articles = written.len(),
        cross_linked = cross_linked.len(),
        "topic integrated"
    );
    Ok(IntegrationReport {
        meta,
        written,
        cross_linked,
    })
}

fn integration_error(e: TopicWikiError) -> TopicWikiError {
    match e {
        TopicWikiError::Integration(_) => e,
        other => TopicWikiError::Integration(other.to_string()),
    }
}

/// Replace or append `meta` in the graph's `topics` array.
///
/// The graph is edited as raw JSON so fields this crate does not model
/// survive. A missing graph is created.
pub fn record_topic(wiki_dir: &Path, meta: &TopicAreaMeta) -> Result<()> {
    let path = wiki_dir.join(MODULE_GRAPH_FILE);

    let mut root = match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                return Err(TopicWikiError::Integration(format!(
                    "{} is not a JSON object; refusing to overwrite it",
                    path.display()
                )));
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut map = Map::new();
            map.insert("project".into(), json!({}));
            map.insert("modules".into(), json!([]));
            map
        }
        Err(e) => return Err(TopicWikiError::io(&path, e)),
    };

    let entry = serde_json::to_value(meta)
        .map_err(|e| TopicWikiError::validation(format!("JSON serialization failed: {e}")))?;

    let topics = root
        .entry("topics")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !topics.is_array() {
        *topics = Value::Array(Vec::new());
    }
    if let Value::Array(items) = topics {
        match items
            .iter_mut()
            .find(|item| item.get("id").and_then(Value::as_str) == Some(meta.id.as_str()))
        {
            Some(existing) => *existing = entry,
            None => items.push(entry),
        }
    }

    let json = serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| TopicWikiError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(&path, &json)
}

/// Add a link to the topic in every involved module's article.
///
/// Modules without an article on disk are skipped; links already present
/// are not duplicated. Failures only warn.
pub fn cross_link_modules(wiki_dir: &Path, graph: &ModuleGraph, meta: &TopicAreaMeta) -> Vec<String> {
    let Some(target) = meta.articles.first() else {
        return Vec::new();
    };

    let mut linked = Vec::new();
    for id in &meta.involved_module_ids {
        let Some(module) = graph.module(id) else {
            continue;
        };
        let relative = module_article_path(module);
        let path = wiki_dir.join(&relative);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };

        let link = format!(
            "- [{}]({})",
            meta.title,
            relative_link(&relative, Path::new(&target.path))
        );
        let Some(updated) = add_related_topic(&content, &link) else {
            continue;
        };

        match write_atomic(&path, &updated) {
            Ok(()) => linked.push(id.clone()),
            Err(e) => warn!(module = %id, error = %e, "cross-link failed"),
        }
    }
    linked
}

/// Insert `link` under the related-topics section, creating it if needed.
/// `None` when the link is already present.
pub fn add_related_topic(content: &str, link: &str) -> Option<String> {
    if content.lines().any(|line| line.trim() == link) {
        return None;
    }

    let lines: Vec<&str> = content.lines().collect();
    let Some(heading) = lines.iter().position(|l| l.trim() == RELATED_TOPICS_HEADING) else {
        return Some(format!(
            "{}\n\n{RELATED_TOPICS_HEADING}\n\n{link}\n",
            content.trim_end()
        ));
    };

    // End of the section: the next heading or end of file.
    let section_end = lines[heading + 1..]
        .iter()
        .position(|l| l.starts_with('#'))
        .map(|offset| heading + 1 + offset)
        .unwrap_or(lines.len());
    let insert_at = lines[heading + 1..section_end]
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|offset| heading + 1 + offset + 1)
        .unwrap_or(heading + 1);

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    if insert_at == heading + 1 {
        out.insert(insert_at, String::new());
        out.insert(insert_at + 1, link.to_string());
    } else {
        out.insert(insert_at, link.to_string());
    }
    Some(format!("{}\n", out.join("\n").trim_end()))
}

/// Link from the file at `from` to the file at `to`, both wiki-relative.
fn relative_link(from: &Path, to: &Path) -> String {
    let depth = from
        .parent()
        .map(|p| p.components().filter(|c| matches!(c, Component::Normal(_))).count())
        .unwrap_or(0);
    let mut link = "../".repeat(depth);
    link.push_str(&to.to_string_lossy().replace('\\', "/"));
    link
}

/// Write a file atomically (temp file + rename), creating parent directories.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| TopicWikiError::validation(format!("invalid path {}", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| TopicWikiError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));
    std::fs::write(&temp, content).map_err(|e| TopicWikiError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| TopicWikiError::io(path, e))?;
    Ok(())
}
