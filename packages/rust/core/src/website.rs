//! Website regeneration through an external command.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, instrument};

use topicwiki_shared::{Result, TopicWikiError, WebsiteConfig};

/// Run the configured site generator with the wiki directory as last argument.
///
/// Returns `Ok(false)` when no command is configured.
#[instrument(skip_all, fields(wiki_dir = %wiki_dir.display()))]
pub async fn regenerate_website(config: &WebsiteConfig, wiki_dir: &Path) -> Result<bool> {
    let Some(command) = config.command.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(false);
    };

    info!(%command, args = ?config.args, "regenerating website");
    let output = Command::new(command)
        .args(&config.args)
        .arg(wiki_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| TopicWikiError::Website(format!("failed to spawn `{command}`: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TopicWikiError::Website(format!(
            "`{command}` exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    info!("website regenerated");
    Ok(true)
}
