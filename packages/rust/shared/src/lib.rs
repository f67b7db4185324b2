//! Shared types, error model, and configuration for topicwiki.
//!
//! This crate is the foundation depended on by all other topicwiki crates.
//! It provides:
//! - [`TopicWikiError`]: the unified error type
//! - Domain types ([`ModuleGraph`], [`TopicRequest`], [`TopicOutline`], [`TopicAreaMeta`], ...)
//! - Configuration ([`AppConfig`], [`PhaseTimeouts`], config loading)
//! - Topic-id and slug helpers

pub mod config;
pub mod error;
pub mod ids;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OpenRouterConfig, PhaseTimeouts, TimeoutsConfig, WebsiteConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{
    EXIT_AI_UNAVAILABLE, EXIT_CONFIG_ERROR, EXIT_EXECUTION_ERROR, EXIT_SUCCESS, Result,
    TopicWikiError,
};
pub use ids::{humanize, normalize_topic_id, slugify, title_case};
pub use types::{
    ArticleAnalysis, ArticleType, CoverageStatus, Depth, DomainInfo, EnrichedProbeResult,
    ModuleGraph, ModuleInfo, ProbeFoundModule, ProbeResult, ProjectInfo, RelatedModule,
    Relevance, TopicAnalysis, TopicArticle, TopicArticlePlan, TopicArticleRef, TopicAreaMeta,
    TopicCoverageCheck, TopicInvolvedModule, TopicLayout, TopicOutline, TopicRequest, TopicSeed,
};
