//! Application configuration for topicwiki.
//!
//! User config lives at `~/.topicwiki/topicwiki.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TopicWikiError};
use crate::types::Depth;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "topicwiki.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".topicwiki";

// ---------------------------------------------------------------------------
// Config structs (matching topicwiki.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings for the AI service.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Per-phase AI call timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Website regeneration hook.
    #[serde(default)]
    pub website: WebsiteConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default wiki directory (relative paths resolve against the repository).
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default outline depth.
    #[serde(default)]
    pub depth: Depth,

    /// Default number of articles generated in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            depth: Depth::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> String {
    "wiki".into()
}
fn default_concurrency() -> usize {
    4
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model used when `--model` is not given.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: Url,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_base_url() -> Url {
    Url::parse("https://openrouter.ai/api/v1/").expect("static URL is valid")
}

/// `[timeouts]` section, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_outline_secs")]
    pub outline_secs: u64,
    #[serde(default = "default_analysis_secs")]
    pub analysis_secs: u64,
    #[serde(default = "default_article_secs")]
    pub article_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            outline_secs: default_outline_secs(),
            analysis_secs: default_analysis_secs(),
            article_secs: default_article_secs(),
        }
    }
}

fn default_probe_secs() -> u64 {
    120
}
fn default_outline_secs() -> u64 {
    60
}
fn default_analysis_secs() -> u64 {
    180
}
fn default_article_secs() -> u64 {
    180
}

/// `[website]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// Command that regenerates the static site. The wiki directory is appended
    /// as the last argument. Unset means the phase is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Extra arguments placed before the wiki directory.
    #[serde(default)]
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// Phase timeouts (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Resolved timeouts for each AI-backed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub probe: Duration,
    pub outline: Duration,
    pub analysis: Duration,
    pub article: Duration,
}

impl PhaseTimeouts {
    /// Use the same timeout for every phase (the `--timeout` flag).
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            probe: timeout,
            outline: timeout,
            analysis: timeout,
            article: timeout,
        }
    }
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutsConfig::default())
    }
}

impl From<&TimeoutsConfig> for PhaseTimeouts {
    fn from(config: &TimeoutsConfig) -> Self {
        Self {
            probe: Duration::from_secs(config.probe_secs),
            outline: Duration::from_secs(config.outline_secs),
            analysis: Duration::from_secs(config.analysis_secs),
            article: Duration::from_secs(config.article_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.topicwiki/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TopicWikiError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.topicwiki/topicwiki.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TopicWikiError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TopicWikiError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TopicWikiError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TopicWikiError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TopicWikiError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
