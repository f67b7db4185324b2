//! Repository content hash and file listing.

use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::{debug, instrument};

use topicwiki_shared::{Result, TopicWikiError};

/// Directories never walked.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Cap on files listed for prompts.
pub const MAX_LISTED_FILES: usize = 400;

/// Stable identifier of the repository's current content.
///
/// `git rev-parse HEAD` when the repository is a git checkout, otherwise a
/// SHA-256 over the sorted relative paths, sizes and modification times.
/// `exclude` (typically the wiki directory) is left out of the walk so that
/// writing the wiki does not change the hash.
#[instrument(skip_all, fields(repo = %repo_path.display()))]
pub async fn repo_content_hash(repo_path: &Path, exclude: Option<&Path>) -> Result<String> {
    if let Some(head) = git_head(repo_path).await {
        debug!(%head, "using git HEAD");
        return Ok(head);
    }

    let mut files = Vec::new();
    walk(repo_path, repo_path, exclude, &mut files, usize::MAX)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relative, size, mtime) in &files {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(size.to_le_bytes());
        hasher.update(mtime.to_le_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    debug!(files = files.len(), %digest, "hashed repository contents");
    Ok(digest)
}

async fn git_head(repo_path: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("HEAD")
        .current_dir(repo_path)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let head = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!head.is_empty()).then_some(head)
}

/// Up to `limit` repository files, relative and sorted.
pub fn list_repo_files(repo_path: &Path, exclude: Option<&Path>, limit: usize) -> Vec<String> {
    let mut files = Vec::new();
    if walk(repo_path, repo_path, exclude, &mut files, limit).is_err() {
        return Vec::new();
    }
    let mut paths: Vec<String> = files.into_iter().map(|(p, _, _)| p).collect();
    paths.sort();
    paths.truncate(limit);
    paths
}

fn walk(
    root: &Path,
    dir: &Path,
    exclude: Option<&Path>,
    out: &mut Vec<(String, u64, u64)>,
    limit: usize,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| TopicWikiError::io(dir, e))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if out.len() >= limit {
            return Ok(());
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();

        if file_type.is_dir() {
            if name.starts_with('.')
                || SKIPPED_DIRS.contains(&name.as_str())
                || exclude.is_some_and(|ex| ex == path)
            {
                continue;
            }
            walk(root, &path, exclude, out, limit)?;
        } else if file_type.is_file() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push((relative, metadata.len(), mtime));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_repo() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tw-repo-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::create_dir_all(dir.join("target/debug")).unwrap();
        std::fs::create_dir_all(dir.join(".cache")).unwrap();
        std::fs::write(dir.join("src/lib.rs"), "pub fn a() {}").unwrap();
        std::fs::write(dir.join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(dir.join("target/debug/out"), "bin").unwrap();
        std::fs::write(dir.join(".cache/x"), "x").unwrap();
        dir
    }

    #[test]
    fn listing_skips_build_and_hidden_dirs() {
        let repo = temp_repo();
        assert_eq!(list_repo_files(&repo, None, 100), vec!["Cargo.toml", "src/lib.rs"]);
        assert_eq!(list_repo_files(&repo, None, 1).len(), 1);
        assert_eq!(list_repo_files(&repo, Some(repo.join("src").as_path()), 100), vec!["Cargo.toml"]);
        let _ = std::fs::remove_dir_all(&repo);
    }

    #[tokio::test]
    async fn hash_is_stable_and_tracks_changes() {
        let repo = temp_repo();
        let first = repo_content_hash(&repo, None).await.unwrap();
        assert_eq!(first, repo_content_hash(&repo, None).await.unwrap());

        std::fs::write(repo.join("src/new.rs"), "fn b() {}").unwrap();
        assert_ne!(first, repo_content_hash(&repo, None).await.unwrap());

        let _ = std::fs::remove_dir_all(&repo);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let missing = std::env::temp_dir().join(format!("tw-missing-{}", uuid::Uuid::now_v7()));
        assert!(repo_content_hash(&missing, None).await.is_err());
    }

    #[tokio::test]
    async fn excluded_directory_does_not_affect_hash() {
        let repo = temp_repo();
        let wiki = repo.join("wiki");
        std::fs::create_dir_all(&wiki).unwrap();
        let before = repo_content_hash(&repo, Some(wiki.as_path())).await.unwrap();

        std::fs::write(wiki.join("page.md"), "# page").unwrap();
        assert_eq!(before, repo_content_hash(&repo, Some(wiki.as_path())).await.unwrap());

        let _ = std::fs::remove_dir_all(&repo);
    }
}
