//! Core pipeline orchestration and domain logic for topicwiki.
//!
//! This crate decides whether a topic is already documented, decomposes it
//! into an outline of articles (AI first, deterministic heuristics as
//! fallback), generates the articles, and writes them into the wiki. Every
//! intermediate artifact goes through the artifact cache so reruns resume.

pub mod analysis;
pub mod articles;
pub mod coverage;
pub mod generation;
pub mod json_repair;
pub mod listing;
pub mod outline;
pub mod pipeline;
pub mod probe;
pub mod prompts;
pub mod repo_hash;
pub mod seed;
pub mod tokenize;
pub mod website;
pub mod wiki;

pub use coverage::check_coverage;
pub use generation::{GenerationOptions, Source};
pub use listing::{TopicListing, TopicOrigin, list_topics};
pub use pipeline::{
    Phase, PhaseRecord, PhaseState, ProgressReporter, SilentProgress, TopicRunConfig,
    TopicRunOutcome, TopicRunResult, check_topic, run_topic, validate_repo_path,
};
pub use seed::build_seed;
pub use tokenize::{score_modules, tokenize};
pub use wiki::load_module_graph;
