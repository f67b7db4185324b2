//! Topic pipeline: coverage gate → probe → outline → analysis → articles →
//! wiki integration → website.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use topicwiki_ai::AiService;
use topicwiki_cache::ArtifactCache;
use topicwiki_shared::{
    CoverageStatus, Depth, EnrichedProbeResult, PhaseTimeouts, Result, TopicAnalysis,
    TopicAreaMeta, TopicArticle, TopicCoverageCheck, TopicOutline, TopicRequest, TopicWikiError,
    WebsiteConfig,
};

use crate::analysis::run_analysis;
use crate::articles::{ArticleContext, generate_articles};
use crate::coverage::check_coverage;
use crate::generation::{GenerationOptions, Source, ai_ready};
use crate::outline::generate_outline;
use crate::probe::run_probe;
use crate::repo_hash::{MAX_LISTED_FILES, list_repo_files, repo_content_hash};
use crate::seed::build_seed;
use crate::website::regenerate_website;
use crate::wiki::{integrate_topic, load_module_graph};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Probe,
    Outline,
    Analysis,
    ArticleGeneration,
    WikiIntegration,
    WebsiteRegeneration,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Probe,
        Phase::Outline,
        Phase::Analysis,
        Phase::ArticleGeneration,
        Phase::WikiIntegration,
        Phase::WebsiteRegeneration,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Probe => "Probing repository",
            Self::Outline => "Planning outline",
            Self::Analysis => "Analysing topic",
            Self::ArticleGeneration => "Writing articles",
            Self::WikiIntegration => "Integrating into wiki",
            Self::WebsiteRegeneration => "Regenerating website",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Probe => "probe",
            Self::Outline => "outline",
            Self::Analysis => "analysis",
            Self::ArticleGeneration => "article-generation",
            Self::WikiIntegration => "wiki-integration",
            Self::WebsiteRegeneration => "website-regeneration",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

/// Final state of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub state: PhaseState,
    /// Which path produced the phase output, for the generating phases.
    pub source: Option<Source>,
}

/// A phase that fell back from the AI path, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub phase: Phase,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called on every phase transition.
    fn phase_changed(&self, phase: Phase, state: PhaseState);
    /// A user-visible status line (fallbacks, gates, partial failures).
    fn status(&self, message: &str);
    /// Called as each article completes.
    fn article_done(&self, slug: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &TopicRunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase_changed(&self, _phase: Phase, _state: PhaseState) {}
    fn status(&self, _message: &str) {}
    fn article_done(&self, _slug: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &TopicRunResult) {}
}

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Configuration for [`run_topic`].
#[derive(Debug, Clone)]
pub struct TopicRunConfig {
    /// Repository being documented.
    pub repo_path: PathBuf,
    /// Wiki root holding `module-graph.json`, `topics/` and `.wiki-cache/`.
    pub wiki_dir: PathBuf,
    pub request: TopicRequest,
    /// Bypass the coverage gate and every cached artifact.
    pub force: bool,
    /// Accept cached artifacts even when the repository hash changed.
    pub use_cache: bool,
    pub model: Option<String>,
    pub depth: Depth,
    pub timeouts: PhaseTimeouts,
    /// Articles generated in parallel.
    pub concurrency: usize,
    /// Link the topic from the involved modules' articles.
    pub cross_link: bool,
    /// `None` skips website regeneration.
    pub website: Option<WebsiteConfig>,
    /// Fail before any phase when the AI service is unavailable.
    pub require_ai: bool,
}

impl TopicRunConfig {
    pub fn new(repo_path: impl Into<PathBuf>, wiki_dir: impl Into<PathBuf>, request: TopicRequest) -> Self {
        Self {
            repo_path: repo_path.into(),
            wiki_dir: wiki_dir.into(),
            request,
            force: false,
            use_cache: false,
            model: None,
            depth: Depth::default(),
            timeouts: PhaseTimeouts::default(),
            concurrency: 4,
            cross_link: true,
            website: None,
            require_ai: true,
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum TopicRunOutcome {
    /// The topic is already documented and `force` was not set.
    AlreadyCovered(TopicCoverageCheck),
    Completed(TopicRunResult),
}

/// Result of a completed run.
#[derive(Debug)]
pub struct TopicRunResult {
    pub run_id: Uuid,
    pub topic_id: String,
    pub meta: TopicAreaMeta,
    pub coverage: CoverageStatus,
    /// Articles written to the wiki.
    pub article_count: usize,
    /// Of those, how many came from the cache.
    pub cached_articles: usize,
    pub failed_slugs: Vec<String>,
    pub written_files: Vec<PathBuf>,
    pub cross_linked: Vec<String>,
    pub fallbacks: Vec<Fallback>,
    pub phases: Vec<PhaseRecord>,
    pub elapsed: Duration,
}

impl TopicRunResult {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.phases.iter().find(|r| r.phase == phase)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// The repository path must exist and be a directory.
pub fn validate_repo_path(repo_path: &Path) -> Result<PathBuf> {
    if !repo_path.exists() {
        return Err(TopicWikiError::config(format!(
            "repository path does not exist: {}",
            repo_path.display()
        )));
    }
    if !repo_path.is_dir() {
        return Err(TopicWikiError::config(format!(
            "repository path is not a directory: {}",
            repo_path.display()
        )));
    }
    std::fs::canonicalize(repo_path).map_err(|e| TopicWikiError::io(repo_path, e))
}

fn validate_request(request: &TopicRequest) -> Result<String> {
    let topic_id = request.topic_id();
    if topic_id.is_empty() {
        return Err(TopicWikiError::config("a topic name is required"));
    }
    Ok(topic_id)
}

/// Coverage check only (`--check`). Never touches the artifact cache.
#[instrument(skip_all, fields(topic = %request.topic))]
pub fn check_topic(repo_path: &Path, wiki_dir: &Path, request: &TopicRequest) -> Result<TopicCoverageCheck> {
    validate_repo_path(repo_path)?;
    validate_request(request)?;
    let graph = load_module_graph(wiki_dir).unwrap_or_default();
    Ok(check_coverage(request, &graph, wiki_dir))
}

/// Run the full topic pipeline.
///
/// Every generated artifact is written to the artifact cache as soon as it
/// exists, so an interrupted run resumes where it stopped.
#[instrument(skip_all, fields(topic = %config.request.topic, repo = %config.repo_path.display()))]
pub async fn run_topic(
    config: &TopicRunConfig,
    ai: Arc<dyn AiService>,
    progress: &dyn ProgressReporter,
) -> Result<TopicRunOutcome> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();

    let repo_path = validate_repo_path(&config.repo_path)?;
    let topic_id = validate_request(&config.request)?;
    let wiki_dir = config.wiki_dir.as_path();
    info!(%run_id, %topic_id, "starting topic pipeline");

    // --- Coverage gate ---
    let loaded_graph = load_module_graph(wiki_dir);
    let graph = loaded_graph.clone().unwrap_or_default();
    let coverage = check_coverage(&config.request, &graph, wiki_dir);
    match coverage.status {
        CoverageStatus::Exists if !config.force => {
            progress.status(&format!(
                "Topic '{topic_id}' is already documented{}; use --force to regenerate",
                coverage
                    .existing_article_path
                    .as_deref()
                    .map(|p| format!(" at {p}"))
                    .unwrap_or_default()
            ));
            info!(%topic_id, "topic already covered, nothing to do");
            return Ok(TopicRunOutcome::AlreadyCovered(coverage));
        }
        CoverageStatus::Exists => {
            progress.status(&format!("Topic '{topic_id}' exists, regenerating (--force)"));
        }
        CoverageStatus::Partial => {
            let names: Vec<&str> = coverage
                .related_modules
                .iter()
                .take(5)
                .map(|m| m.module_name.as_str())
                .collect();
            progress.status(&format!(
                "Topic '{topic_id}' is partially covered by: {}",
                names.join(", ")
            ));
        }
        CoverageStatus::New => {}
    }

    // --- AI gate ---
    if config.require_ai {
        if let Err(reason) = ai_ready(ai.as_ref()).await {
            return Err(TopicWikiError::ai_unavailable(reason));
        }
    }

    let seed = build_seed(&config.request);
    let excluded = std::fs::canonicalize(wiki_dir).unwrap_or_else(|_| wiki_dir.to_path_buf());
    let git_hash = repo_content_hash(&repo_path, Some(&excluded)).await?;

    let cache = ArtifactCache::new(wiki_dir);
    let cache_usable = !config.force && (config.use_cache || cache.is_valid(&topic_id, &git_hash));
    if !cache_usable {
        // Stale artifacts must never be mixed into a fresh run.
        if cache.clear_topic(&topic_id)? {
            debug!(%topic_id, "cleared stale topic cache");
        }
    } else {
        debug!(%topic_id, "topic cache usable");
    }

    let mut base_options = GenerationOptions::new(config.timeouts.probe);
    base_options.model = config.model.clone();
    base_options.working_directory = Some(repo_path.clone());

    let mut tracker = PhaseTracker::new(progress, config.website.is_some());
    let mut fallbacks = Vec::new();

    // --- Probe ---
    tracker.start(Phase::Probe);
    let probe: EnrichedProbeResult = match cache_usable.then(|| cache.get_probe_result(&topic_id)).flatten() {
        Some(cached) => {
            tracker.succeed(Phase::Probe, Source::Cache);
            cached
        }
        None => {
            let repo_files = list_repo_files(&repo_path, Some(&excluded), MAX_LISTED_FILES);
            let outcome = match run_probe(ai.as_ref(), &seed, &graph, wiki_dir, &repo_files, &base_options).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracker.fail(Phase::Probe);
                    return Err(e);
                }
            };
            note_fallback(&mut fallbacks, progress, Phase::Probe, outcome.fallback_reason);
            persist("probe result", cache.save_probe_result(&topic_id, &outcome.result, &git_hash));
            tracker.succeed(Phase::Probe, outcome.source);
            outcome.result
        }
    };
    info!(
        modules = probe.probe_result.found_modules.len(),
        existing = probe.existing_module_ids.len(),
        new = probe.new_module_ids.len(),
        "probe ready"
    );

    // --- Outline ---
    tracker.start(Phase::Outline);
    let outline: TopicOutline = match cache_usable.then(|| cache.get_outline(&topic_id)).flatten() {
        Some(cached) => {
            tracker.succeed(Phase::Outline, Source::Cache);
            cached
        }
        None => {
            let options = base_options.with_timeout(config.timeouts.outline);
            let outcome = generate_outline(ai.as_ref(), &seed, &probe, config.depth, &options).await;
            note_fallback(&mut fallbacks, progress, Phase::Outline, outcome.fallback_reason);
            persist("outline", cache.save_outline(&topic_id, &outcome.outline, &git_hash));
            tracker.succeed(Phase::Outline, outcome.source);
            outcome.outline
        }
    };
    info!(layout = %outline.layout, articles = outline.articles.len(), "outline ready");

    // --- Analysis ---
    tracker.start(Phase::Analysis);
    let analysis: TopicAnalysis = match cache_usable.then(|| cache.get_analysis(&topic_id)).flatten() {
        Some(cached) => {
            tracker.succeed(Phase::Analysis, Source::Cache);
            cached
        }
        None => {
            let options = base_options.with_timeout(config.timeouts.analysis);
            let outcome = run_analysis(ai.as_ref(), &seed, &outline, &probe, &options).await;
            note_fallback(&mut fallbacks, progress, Phase::Analysis, outcome.fallback_reason);
            persist("analysis", cache.save_analysis(&topic_id, &outcome.analysis, &git_hash));
            tracker.succeed(Phase::Analysis, outcome.source);
            outcome.analysis
        }
    };

    // --- Article generation ---
    tracker.start(Phase::ArticleGeneration);
    let cached_articles: Vec<TopicArticle> = if cache_usable {
        cache
            .get_all_articles(&topic_id)
            .into_iter()
            .filter(|a| outline.article(&a.slug).is_some())
            .collect()
    } else {
        Vec::new()
    };
    let missing: Vec<_> = outline
        .articles
        .iter()
        .filter(|plan| !cached_articles.iter().any(|a| a.slug == plan.slug))
        .cloned()
        .collect();

    let total = outline.articles.len();
    let reused = cached_articles.len();
    if reused > 0 {
        progress.status(&format!("Reusing {reused} cached article(s), {} to write", missing.len()));
    }

    let context = Arc::new(ArticleContext {
        seed: seed.clone(),
        outline: outline.clone(),
        analysis,
        depth: config.depth,
        options: base_options.with_timeout(config.timeouts.article),
    });
    let mut completed = reused;
    let batch = generate_articles(Arc::clone(&ai), context, missing, config.concurrency, |article| {
        completed += 1;
        persist("article", cache.save_article(&topic_id, article, &git_hash));
        progress.article_done(&article.slug, completed, total);
    })
    .await;

    if batch.source == Some(Source::Heuristic) {
        note_fallback(
            &mut fallbacks,
            progress,
            Phase::ArticleGeneration,
            Some("AI unavailable, articles rendered from template".to_string()),
        );
    }

    // Outline order, cached and fresh merged.
    let mut articles: Vec<TopicArticle> = Vec::with_capacity(total);
    for plan in &outline.articles {
        if let Some(article) = cached_articles
            .iter()
            .chain(batch.articles.iter())
            .find(|a| a.slug == plan.slug)
        {
            articles.push(article.clone());
        }
    }

    if articles.is_empty() {
        tracker.fail(Phase::ArticleGeneration);
        return Err(TopicWikiError::Generation(format!(
            "no article could be generated for topic '{topic_id}' (failed: {})",
            batch.failed_slugs.join(", ")
        )));
    }
    if !batch.failed_slugs.is_empty() {
        progress.status(&format!(
            "{} of {total} article(s) failed: {}",
            batch.failed_slugs.len(),
            batch.failed_slugs.join(", ")
        ));
    }
    // Nothing generated means every article came from the cache.
    tracker.succeed(Phase::ArticleGeneration, batch.source.unwrap_or(Source::Cache));

    // --- Wiki integration ---
    tracker.start(Phase::WikiIntegration);
    let report = match integrate_topic(
        wiki_dir,
        &outline,
        &seed.description,
        &articles,
        loaded_graph.as_ref(),
        config.cross_link,
    ) {
        Ok(report) => report,
        Err(e) => {
            tracker.fail(Phase::WikiIntegration);
            return Err(e);
        }
    };
    tracker.finish(Phase::WikiIntegration, PhaseState::Succeeded, None);

    // --- Website regeneration (best effort) ---
    if let Some(website) = &config.website {
        tracker.start(Phase::WebsiteRegeneration);
        let state = match regenerate_website(website, wiki_dir).await {
            Ok(true) => PhaseState::Succeeded,
            Ok(false) => PhaseState::Skipped,
            Err(e) => {
                warn!(error = %e, "website regeneration failed");
                progress.status(&format!("Website regeneration failed: {e}"));
                PhaseState::Failed
            }
        };
        tracker.finish(Phase::WebsiteRegeneration, state, None);
    }

    let result = TopicRunResult {
        run_id,
        topic_id,
        meta: report.meta,
        coverage: coverage.status,
        article_count: articles.len(),
        cached_articles: reused,
        failed_slugs: batch.failed_slugs,
        written_files: report.written,
        cross_linked: report.cross_linked,
        fallbacks,
        phases: tracker.into_records(),
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        %run_id,
        topic = %result.topic_id,
        articles = result.article_count,
        cached = result.cached_articles,
        failed = result.failed_slugs.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "topic pipeline complete"
    );

    Ok(TopicRunOutcome::Completed(result))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records phase states and forwards transitions to the reporter.
struct PhaseTracker<'a> {
    progress: &'a dyn ProgressReporter,
    records: Vec<PhaseRecord>,
}

impl<'a> PhaseTracker<'a> {
    fn new(progress: &'a dyn ProgressReporter, with_website: bool) -> Self {
        let records = Phase::ALL
            .into_iter()
            .map(|phase| PhaseRecord {
                phase,
                state: if phase == Phase::WebsiteRegeneration && !with_website {
                    PhaseState::Skipped
                } else {
                    PhaseState::Pending
                },
                source: None,
            })
            .collect();
        Self { progress, records }
    }

    fn start(&mut self, phase: Phase) {
        self.set(phase, PhaseState::Running, None);
    }

    fn succeed(&mut self, phase: Phase, source: Source) {
        self.finish(phase, PhaseState::Succeeded, Some(source));
    }

    fn fail(&mut self, phase: Phase) {
        self.finish(phase, PhaseState::Failed, None);
    }

    fn finish(&mut self, phase: Phase, state: PhaseState, source: Option<Source>) {
        self.set(phase, state, source);
    }

    fn set(&mut self, phase: Phase, state: PhaseState, source: Option<Source>) {
        if let Some(record) = self.records.iter_mut().find(|r| r.phase == phase) {
            record.state = state;
            if source.is_some() {
                record.source = source;
            }
        }
        debug!(%phase, %state, "phase transition");
        self.progress.phase_changed(phase, state);
    }

    fn into_records(self) -> Vec<PhaseRecord> {
        self.records
    }
}

fn note_fallback(
    fallbacks: &mut Vec<Fallback>,
    progress: &dyn ProgressReporter,
    phase: Phase,
    reason: Option<String>,
) {
    if let Some(reason) = reason {
        progress.status(&format!("{}: using heuristic fallback ({reason})", phase.label()));
        fallbacks.push(Fallback { phase, reason });
    }
}

/// Cache writes are best effort; a failed write only costs a future rerun.
fn persist(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(artifact = what, error = %e, "failed to write artifact cache");
    }
}
