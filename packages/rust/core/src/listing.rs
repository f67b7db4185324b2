//! Topic listing: graph records merged with what is on disk.

use std::fmt;
use std::path::Path;

use topicwiki_shared::{ModuleGraph, TopicLayout, title_case};

use crate::wiki::TOPICS_DIR;

/// Where a listed topic was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOrigin {
    Graph,
    Filesystem,
}

impl fmt::Display for TopicOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graph => "graph",
            Self::Filesystem => "filesystem",
        })
    }
}

/// One row of `--list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicListing {
    pub id: String,
    pub title: String,
    pub layout: TopicLayout,
    pub article_count: usize,
    pub origin: TopicOrigin,
}

/// List every known topic.
///
/// Graph entries come first, in graph order. Topics found only under
/// `<wikiDir>/topics/` are appended sorted by id: a sub-directory is an
/// `area` topic (its `.md` files are the articles), a bare `.md` file is a
/// `single` topic.
pub fn list_topics(graph: Option<&ModuleGraph>, wiki_dir: &Path) -> Vec<TopicListing> {
    let mut listings: Vec<TopicListing> = graph
        .map(|g| {
            g.topics
                .iter()
                .map(|t| TopicListing {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    layout: t.layout,
                    article_count: t.articles.len(),
                    origin: TopicOrigin::Graph,
                })
                .collect()
        })
        .unwrap_or_default();

    let mut scanned = scan_topics_dir(&wiki_dir.join(TOPICS_DIR));
    scanned.retain(|s| !listings.iter().any(|l| l.id == s.id));
    scanned.sort_by(|a, b| a.id.cmp(&b.id));
    listings.extend(scanned);
    listings
}

fn scan_topics_dir(dir: &Path) -> Vec<TopicListing> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<TopicListing> = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            let article_count = std::fs::read_dir(&path)
                .map(|files| {
                    files
                        .filter_map(|f| f.ok())
                        .filter(|f| is_markdown(&f.path()))
                        .count()
                })
                .unwrap_or(0);
            found.push(TopicListing {
                title: title_case(&name),
                id: name,
                layout: TopicLayout::Area,
                article_count,
                origin: TopicOrigin::Filesystem,
            });
        } else if is_markdown(&path) {
            let Some(id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            // A directory of the same name wins.
            if found.iter().any(|f| f.id == id) || dir.join(&id).is_dir() {
                continue;
            }
            found.push(TopicListing {
                title: title_case(&id),
                id,
                layout: TopicLayout::Single,
                article_count: 1,
                origin: TopicOrigin::Filesystem,
            });
        }
    }
    found
}

fn is_markdown(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use topicwiki_shared::TopicAreaMeta;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tw-listing-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn merges_graph_and_filesystem() {
        let tmp = temp_dir();
        let topics = tmp.join("topics");
        std::fs::create_dir_all(topics.join("compaction")).unwrap();
        std::fs::write(topics.join("compaction/index.md"), "# c").unwrap();
        std::fs::create_dir_all(topics.join("auth")).unwrap();
        std::fs::write(topics.join("auth/index.md"), "# a").unwrap();
        std::fs::write(topics.join("auth/tokens.md"), "# t").unwrap();
        std::fs::write(topics.join("auth/notes.txt"), "x").unwrap();
        std::fs::write(topics.join("wal.md"), "# w").unwrap();
        std::fs::write(topics.join(".hidden.md"), "# h").unwrap();

        let graph = ModuleGraph {
            topics: vec![TopicAreaMeta {
                id: "compaction".into(),
                title: "Compaction Deep Dive".into(),
                description: String::new(),
                layout: TopicLayout::Area,
                articles: vec![],
                involved_module_ids: vec![],
                directory_path: "topics/compaction".into(),
                generated_at: Utc::now(),
            }],
            ..Default::default()
        };

        let listings = list_topics(Some(&graph), &tmp);
        let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["compaction", "auth", "wal"]);

        assert_eq!(listings[0].title, "Compaction Deep Dive");
        assert_eq!(listings[0].origin, TopicOrigin::Graph);
        assert_eq!(listings[1].layout, TopicLayout::Area);
        assert_eq!(listings[1].article_count, 2);
        assert_eq!(listings[2].layout, TopicLayout::Single);
        assert_eq!(listings[2].origin, TopicOrigin::Filesystem);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_wiki_lists_nothing() {
        let tmp = temp_dir();
        assert!(list_topics(None, &tmp).is_empty());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
