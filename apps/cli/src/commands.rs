//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use topicwiki_ai::{AiService, OpenRouterService, UnavailableService};
use topicwiki_cache::ArtifactCache;
use topicwiki_core::{
    Phase, PhaseState, ProgressReporter, TopicRunConfig, TopicRunOutcome, TopicRunResult,
    check_topic, list_topics, load_module_graph, run_topic, validate_repo_path,
};
use topicwiki_shared::{
    AppConfig, Depth, PhaseTimeouts, TopicCoverageCheck, TopicRequest, TopicWikiError, init_config,
    load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// topicwiki: document a codebase one topic at a time.
#[derive(Parser)]
#[command(
    name = "topicwiki",
    version,
    about = "Plan, generate and integrate topic articles into a codebase wiki.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate (or check, or list) a topic for a repository's wiki.
    Topic(TopicArgs),

    /// Artifact cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub(crate) struct TopicArgs {
    /// Repository to document.
    pub repo_path: PathBuf,

    /// Topic name, e.g. "compaction" or "wal-recovery".
    pub topic: Option<String>,

    /// What the topic is about; defaults to a description derived from the name.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Search hint (repeatable). Replaces the generated hints.
    #[arg(long = "hint")]
    pub hints: Vec<String>,

    /// Regenerate even if the topic exists, ignoring every cached artifact.
    #[arg(short, long)]
    pub force: bool,

    /// Reuse cached artifacts even if the repository changed.
    #[arg(long)]
    pub use_cache: bool,

    /// Only report whether the topic is already covered.
    #[arg(long, conflicts_with = "list")]
    pub check: bool,

    /// List the topics already in the wiki.
    #[arg(long)]
    pub list: bool,

    /// Model id passed to the AI service.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Outline depth: shallow, normal, or deep.
    #[arg(long)]
    pub depth: Option<Depth>,

    /// Timeout in seconds for every AI call (overrides the per-phase config).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Articles generated in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Do not link the topic from module articles.
    #[arg(long)]
    pub no_cross_link: bool,

    /// Skip website regeneration.
    #[arg(long)]
    pub no_website: bool,

    /// Run without the AI service, using heuristics and templates only.
    #[arg(long)]
    pub offline: bool,

    /// Wiki directory (defaults to `<repo>/<defaults.output_dir>`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Remove cached artifacts for one topic or all of them.
    Clear {
        /// Repository whose wiki cache is cleared.
        repo_path: PathBuf,

        /// Only clear this topic.
        #[arg(long)]
        topic: Option<String>,

        /// Wiki directory (defaults to `<repo>/<defaults.output_dir>`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

fn log_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    ["topicwiki", "topicwiki_core", "topicwiki_cache", "topicwiki_ai"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Topic(args) => cmd_topic(args).await,
        Command::Cache { action } => match action {
            CacheAction::Clear {
                repo_path,
                topic,
                output,
            } => cmd_cache_clear(&repo_path, topic.as_deref(), output.as_deref()),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Wiki directory: `--output` as given, otherwise the configured output
/// directory under the repository.
fn resolve_wiki_dir(repo_path: &Path, output: Option<&Path>, config: &AppConfig) -> PathBuf {
    match output {
        Some(dir) => dir.to_path_buf(),
        None => repo_path.join(&config.defaults.output_dir),
    }
}

fn build_request(args: &TopicArgs, topic: &str) -> TopicRequest {
    TopicRequest {
        topic: topic.to_string(),
        description: args.description.clone().filter(|d| !d.trim().is_empty()),
        hints: (!args.hints.is_empty()).then(|| args.hints.clone()),
    }
}

fn build_run_config(args: &TopicArgs, topic: &str, wiki_dir: PathBuf, config: &AppConfig) -> TopicRunConfig {
    let timeouts = match args.timeout {
        Some(secs) => PhaseTimeouts::uniform(Duration::from_secs(secs)),
        None => PhaseTimeouts::from(&config.timeouts),
    };
    TopicRunConfig {
        repo_path: args.repo_path.clone(),
        wiki_dir,
        request: build_request(args, topic),
        force: args.force,
        use_cache: args.use_cache,
        model: args.model.clone(),
        depth: args.depth.unwrap_or(config.defaults.depth),
        timeouts,
        concurrency: args.concurrency.unwrap_or(config.defaults.concurrency).max(1),
        cross_link: !args.no_cross_link,
        website: (!args.no_website).then(|| config.website.clone()),
        require_ai: !args.offline,
    }
}

fn build_ai_service(offline: bool, config: &AppConfig) -> Result<Arc<dyn AiService>> {
    if offline {
        return Ok(Arc::new(UnavailableService::new("offline mode (--offline)")));
    }
    Ok(Arc::new(OpenRouterService::new(&config.openrouter)?))
}

// ---------------------------------------------------------------------------
// topic
// ---------------------------------------------------------------------------

async fn cmd_topic(args: TopicArgs) -> Result<()> {
    let config = load_config()?;
    let wiki_dir = resolve_wiki_dir(&args.repo_path, args.output.as_deref(), &config);

    if args.list {
        validate_repo_path(&args.repo_path)?;
        return cmd_list(&wiki_dir);
    }

    let Some(topic) = args.topic.as_deref() else {
        return Err(TopicWikiError::config("a topic name is required (or use --list)").into());
    };

    if args.check {
        let check = check_topic(&args.repo_path, &wiki_dir, &build_request(&args, topic))?;
        print_check(topic, &check);
        return Ok(());
    }

    let run_config = build_run_config(&args, topic, wiki_dir, &config);
    let ai = build_ai_service(args.offline, &config)?;

    info!(
        topic,
        repo = %run_config.repo_path.display(),
        wiki = %run_config.wiki_dir.display(),
        depth = %run_config.depth,
        offline = args.offline,
        "generating topic"
    );

    let reporter = CliProgress::new();
    let outcome = run_topic(&run_config, ai, &reporter).await;
    reporter.finish();

    match outcome? {
        TopicRunOutcome::AlreadyCovered(check) => {
            println!();
            println!("  Topic '{topic}' is already documented.");
            if let Some(path) = &check.existing_article_path {
                println!("  Article: {path}");
            }
            println!("  Use --force to regenerate it.");
            println!();
        }
        TopicRunOutcome::Completed(result) => print_summary(&result),
    }
    Ok(())
}

fn cmd_list(wiki_dir: &Path) -> Result<()> {
    let graph = load_module_graph(wiki_dir);
    let topics = list_topics(graph.as_ref(), wiki_dir);

    if topics.is_empty() {
        println!("No topics found in {}", wiki_dir.display());
        return Ok(());
    }

    println!("  {:<28} {:<36} {:<7} {:>8}  SOURCE", "ID", "TITLE", "LAYOUT", "ARTICLES");
    for topic in &topics {
        println!(
            "  {:<28} {:<36} {:<7} {:>8}  {}",
            topic.id,
            topic.title,
            topic.layout.as_str(),
            topic.article_count,
            topic.origin
        );
    }
    Ok(())
}

fn print_check(topic: &str, check: &TopicCoverageCheck) {
    println!();
    println!("  Topic:    {topic}");
    println!("  Coverage: {}", check.status);
    if let Some(path) = &check.existing_article_path {
        println!("  Article:  {path}");
    }
    if !check.related_modules.is_empty() {
        println!("  Related modules:");
        for module in check.related_modules.iter().take(10) {
            println!(
                "    {:<6} {} ({})",
                module.relevance.to_string(),
                module.module_name,
                module.match_reason
            );
        }
    }
    println!();
}

fn print_summary(result: &TopicRunResult) {
    println!();
    println!("  Topic generated successfully!");
    println!("  Topic:    {} ({})", result.meta.title, result.topic_id);
    println!("  Layout:   {}", result.meta.layout);
    println!(
        "  Articles: {} ({} from cache)",
        result.article_count, result.cached_articles
    );
    if !result.failed_slugs.is_empty() {
        println!(
            "  Failed:   {} ({})",
            result.failed_slugs.len(),
            result.failed_slugs.join(", ")
        );
    }
    for fallback in &result.fallbacks {
        println!("  Fallback: {} ({})", fallback.phase, fallback.reason);
    }
    if !result.cross_linked.is_empty() {
        println!("  Linked:   {}", result.cross_linked.join(", "));
    }
    if let Some(record) = result.phase(Phase::WebsiteRegeneration) {
        println!("  Website:  {}", record.state);
    }
    println!("  Path:     {}", result.meta.directory_path);
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase_changed(&self, phase: Phase, state: PhaseState) {
        match state {
            PhaseState::Running => self.spinner.set_message(phase.label().to_string()),
            PhaseState::Failed => self.spinner.println(format!("  ✗ {}", phase.label())),
            _ => {}
        }
    }

    fn status(&self, message: &str) {
        self.spinner.println(format!("  {message}"));
    }

    fn article_done(&self, slug: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("{} [{current}/{total}] {slug}", Phase::ArticleGeneration.label()));
    }

    fn done(&self, _result: &TopicRunResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// cache / config
// ---------------------------------------------------------------------------

fn cmd_cache_clear(repo_path: &Path, topic: Option<&str>, output: Option<&Path>) -> Result<()> {
    validate_repo_path(repo_path)?;
    let config = load_config()?;
    let wiki_dir = resolve_wiki_dir(repo_path, output, &config);
    let cache = ArtifactCache::new(&wiki_dir);

    match topic {
        Some(topic) => {
            let topic_id = TopicRequest::new(topic).topic_id();
            if cache.clear_topic(&topic_id)? {
                println!("Cleared cache for topic '{topic_id}'");
            } else {
                println!("No cache for topic '{topic_id}'");
            }
        }
        None => {
            let topics = cache.list_topics();
            if cache.clear_all()? {
                println!(
                    "Cleared {} topic cache(s) in {}",
                    topics.len(),
                    cache.topics_root().display()
                );
            } else {
                println!("Nothing to clear");
            }
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn topic_args(argv: &[&str]) -> TopicArgs {
        let mut full = vec!["topicwiki", "topic"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Topic(args) => args,
            _ => panic!("expected the topic subcommand"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_topic_flags() {
        let args = topic_args(&[
            "./repo",
            "wal-recovery",
            "--hint",
            "wal",
            "--hint",
            "replay",
            "--depth",
            "deep",
            "--timeout",
            "30",
            "--no-website",
            "--offline",
        ]);
        assert_eq!(args.topic.as_deref(), Some("wal-recovery"));
        assert_eq!(args.hints, vec!["wal", "replay"]);
        assert_eq!(args.depth, Some(Depth::Deep));
        assert!(args.no_website && args.offline);
        assert!(!args.force);
    }

    #[test]
    fn rejects_unknown_depth_and_check_with_list() {
        let bad_depth = Cli::try_parse_from(["topicwiki", "topic", ".", "x", "--depth", "extreme"]);
        assert!(bad_depth.is_err());
        let both = Cli::try_parse_from(["topicwiki", "topic", ".", "x", "--check", "--list"]);
        assert!(both.is_err());
    }

    #[test]
    fn run_config_merges_flags_over_config() {
        let mut config = AppConfig::default();
        config.defaults.concurrency = 8;
        config.website.command = Some("site-gen".into());

        let args = topic_args(&["./repo", "Auth", "--timeout", "15", "--concurrency", "2"]);
        let run = build_run_config(&args, "Auth", PathBuf::from("wiki"), &config);
        assert_eq!(run.timeouts, PhaseTimeouts::uniform(Duration::from_secs(15)));
        assert_eq!(run.concurrency, 2);
        assert_eq!(run.depth, config.defaults.depth);
        assert!(run.require_ai);
        assert!(run.cross_link);
        assert_eq!(run.request.hints, None);
        assert_eq!(
            run.website.and_then(|w| w.command).as_deref(),
            Some("site-gen")
        );

        let args = topic_args(&["./repo", "Auth", "--no-website", "--offline", "--no-cross-link"]);
        let run = build_run_config(&args, "Auth", PathBuf::from("wiki"), &config);
        assert_eq!(run.concurrency, 8);
        assert_eq!(run.timeouts, PhaseTimeouts::from(&config.timeouts));
        assert!(run.website.is_none());
        assert!(!run.require_ai);
        assert!(!run.cross_link);
    }

    #[test]
    fn wiki_dir_defaults_under_repository() {
        let config = AppConfig::default();
        assert_eq!(
            resolve_wiki_dir(Path::new("/src/app"), None, &config),
            PathBuf::from("/src/app/wiki")
        );
        assert_eq!(
            resolve_wiki_dir(Path::new("/src/app"), Some(Path::new("/tmp/docs")), &config),
            PathBuf::from("/tmp/docs")
        );
    }

    #[test]
    fn log_filter_covers_every_crate() {
        assert_eq!(
            log_filter(1),
            "topicwiki=debug,topicwiki_core=debug,topicwiki_cache=debug,topicwiki_ai=debug"
        );
        assert!(log_filter(5).contains("topicwiki_ai=trace"));
    }
}
