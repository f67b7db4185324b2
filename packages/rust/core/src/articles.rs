//! Article generation with a bounded worker pool.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use topicwiki_ai::AiService;
use topicwiki_shared::{
    ArticleType, Depth, TopicAnalysis, TopicArticle, TopicArticlePlan, TopicLayout, TopicOutline,
    TopicSeed,
};

use crate::generation::{GenerationOptions, Source, ai_ready, ask};
use crate::prompts::article_prompt;

/// Everything an article writer needs, shared across workers.
#[derive(Debug, Clone)]
pub struct ArticleContext {
    pub seed: TopicSeed,
    pub outline: TopicOutline,
    pub analysis: TopicAnalysis,
    pub depth: Depth,
    pub options: GenerationOptions,
}

/// Result of one generation batch.
#[derive(Debug, Clone, Default)]
pub struct ArticleBatch {
    /// Produced articles, in outline order.
    pub articles: Vec<TopicArticle>,
    /// Slugs whose generation failed, in outline order.
    pub failed_slugs: Vec<String>,
    /// `Ai`, or `Heuristic` when the offline template was used.
    pub source: Option<Source>,
}

/// Generate `plans` with at most `concurrency` AI calls in flight.
///
/// `on_article_complete` runs on the calling task as each article finishes,
/// in completion order. A failed article is recorded in
/// [`ArticleBatch::failed_slugs`] and never affects its siblings. When the
/// AI is unavailable every article is rendered from the offline template.
#[instrument(skip_all, fields(topic = %context.seed.topic, articles = plans.len(), concurrency))]
pub async fn generate_articles<F>(
    ai: Arc<dyn AiService>,
    context: Arc<ArticleContext>,
    plans: Vec<TopicArticlePlan>,
    concurrency: usize,
    mut on_article_complete: F,
) -> ArticleBatch
where
    F: FnMut(&TopicArticle),
{
    if plans.is_empty() {
        return ArticleBatch::default();
    }
    let order: Vec<String> = plans.iter().map(|p| p.slug.clone()).collect();

    if let Err(reason) = ai_ready(ai.as_ref()).await {
        warn!(%reason, "AI unavailable, rendering articles from template");
        let mut articles = Vec::with_capacity(plans.len());
        for plan in &plans {
            let article = build_article(&context, plan, render_offline_article(&context, plan));
            on_article_complete(&article);
            articles.push(article);
        }
        return ArticleBatch {
            articles,
            failed_slugs: Vec::new(),
            source: Some(Source::Heuristic),
        };
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for plan in plans {
        let ai = Arc::clone(&ai);
        let context = Arc::clone(&context);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (plan.slug, Err(format!("worker pool closed: {e}"))),
            };
            let result = write_article(ai.as_ref(), &context, &plan).await;
            (plan.slug, result)
        });
    }

    let mut produced: HashMap<String, TopicArticle> = HashMap::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slug, Ok(article))) => {
                debug!(%slug, "article complete");
                on_article_complete(&article);
                produced.insert(slug, article);
            }
            Ok((slug, Err(error))) => {
                warn!(%slug, %error, "article generation failed");
            }
            Err(e) => {
                warn!(error = %e, "article task aborted");
            }
        }
    }

    // Anything planned but not produced counts as failed, including panicked tasks.
    let mut batch = ArticleBatch {
        source: Some(Source::Ai),
        ..Default::default()
    };
    for slug in order {
        match produced.remove(&slug) {
            Some(article) => batch.articles.push(article),
            None => batch.failed_slugs.push(slug),
        }
    }

    info!(
        produced = batch.articles.len(),
        failed = batch.failed_slugs.len(),
        "article batch finished"
    );
    batch
}

async fn write_article(ai: &dyn AiService, context: &ArticleContext, plan: &TopicArticlePlan) -> Result<TopicArticle, String> {
    let prompt = article_prompt(
        &context.seed,
        &context.outline,
        plan,
        &context.analysis,
        context.analysis.for_article(&plan.slug),
        context.depth,
    );
    let text = ask(ai, prompt, &context.options).await?;
    let body = strip_code_fence(&text);
    if body.trim().is_empty() {
        return Err("empty article".to_string());
    }
    Ok(build_article(context, plan, ensure_heading(body, &plan.title)))
}

fn build_article(context: &ArticleContext, plan: &TopicArticlePlan, content: String) -> TopicArticle {
    TopicArticle {
        article_type: ArticleType::for_slug(&plan.slug),
        slug: plan.slug.clone(),
        title: plan.title.clone(),
        content,
        topic_id: context.outline.topic_id.clone(),
        covered_module_ids: plan.covered_module_ids.clone(),
    }
}

/// Remove a fence wrapping the whole answer (```` ```markdown ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match inner.find('\n') {
        Some(newline) if !inner[..newline].trim().contains(' ') => inner[newline + 1..].trim(),
        _ => inner.trim(),
    }
}

fn ensure_heading(body: &str, title: &str) -> String {
    if body.trim_start().starts_with('#') {
        format!("{}\n", body.trim_end())
    } else {
        format!("# {title}\n\n{}\n", body.trim_end())
    }
}

/// Deterministic markdown article from the plan and analysis.
pub fn render_offline_article(context: &ArticleContext, plan: &TopicArticlePlan) -> String {
    let outline = &context.outline;
    let analysis = &context.analysis;
    let notes = analysis.for_article(&plan.slug);

    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", plan.title);
    if !plan.description.is_empty() {
        let _ = writeln!(out, "{}\n", plan.description);
    }

    if plan.is_index && !analysis.overview.is_empty() {
        let _ = writeln!(out, "## Overview\n\n{}\n", analysis.overview);
    }

    if let Some(notes) = notes.filter(|n| !n.key_points.is_empty()) {
        out.push_str("## Key Points\n\n");
        for point in &notes.key_points {
            let _ = writeln!(out, "- {point}");
        }
        out.push('\n');
    }

    if plan.is_index && outline.layout == TopicLayout::Area {
        out.push_str("## Articles\n\n| Article | Description |\n|---|---|\n");
        for article in outline.articles.iter().filter(|a| !a.is_index) {
            let _ = writeln!(
                out,
                "| [{}]({}.md) | {} |",
                article.title,
                article.slug,
                article.description.replace('|', "\\|")
            );
        }
        out.push('\n');
    }

    if !plan.covered_module_ids.is_empty() {
        out.push_str("## Modules\n\n");
        for id in &plan.covered_module_ids {
            match outline.involved_modules.iter().find(|m| &m.module_id == id) {
                Some(module) if !module.role.is_empty() => {
                    let _ = writeln!(out, "- `{id}`: {}", module.role);
                }
                _ => {
                    let _ = writeln!(out, "- `{id}`");
                }
            }
        }
        out.push('\n');
    }

    let key_files = notes
        .map(|n| n.key_files.as_slice())
        .filter(|files| !files.is_empty())
        .unwrap_or(plan.covered_files.as_slice());
    if !key_files.is_empty() {
        out.push_str("## Key Files\n\n");
        for file in key_files {
            let _ = writeln!(out, "- `{file}`");
        }
        out.push('\n');
    }

    if plan.is_index && !analysis.data_flow.is_empty() {
        let _ = writeln!(out, "## Data Flow\n\n{}\n", analysis.data_flow);
    }

    if let Some(notes) = notes.filter(|n| !n.notes.is_empty()) {
        let _ = writeln!(out, "## Notes\n\n{}\n", notes.notes);
    }

    format!("{}\n", out.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use topicwiki_ai::{ScriptedService, SendMessageResponse};
    use topicwiki_shared::{ProbeFoundModule, ProbeResult};

    fn context() -> ArticleContext {
        let seed = TopicSeed {
            topic: "compaction".into(),
            description: "How segments merge".into(),
            hints: vec![],
        };
        let probe = crate::probe::enrich_probe(
            ProbeResult {
                topic: "compaction".into(),
                found_modules: ["storage", "scheduler", "manifest"]
                    .iter()
                    .map(|id| ProbeFoundModule {
                        id: id.to_string(),
                        name: topicwiki_shared::title_case(id),
                        purpose: format!("Purpose of {id}"),
                        key_files: vec![format!("src/{id}.rs")],
                        ..Default::default()
                    })
                    .collect(),
                summary: String::new(),
            },
            &Default::default(),
        );
        let outline = crate::outline::fallback_outline(&seed, &probe);
        let analysis = crate::analysis::heuristic_analysis(&seed, &outline, &probe);
        ArticleContext {
            seed,
            outline,
            analysis,
            depth: Depth::Normal,
            options: GenerationOptions::new(Duration::from_secs(5)),
        }
    }

    #[test]
    fn strips_wrapping_fences_only() {
        assert_eq!(strip_code_fence("```markdown\n# Title\n\nBody\n```"), "# Title\n\nBody");
        assert_eq!(strip_code_fence("```\n# Title\n```"), "# Title");
        assert_eq!(
            strip_code_fence("# Title\n\n```rust\nfn main() {}\n```"),
            "# Title\n\n```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn offline_index_lists_sub_articles() {
        let ctx = context();
        let index = render_offline_article(&ctx, &ctx.outline.articles[0]);
        assert!(index.starts_with("# Compaction\n"));
        assert!(index.contains("| [Storage](storage.md) | Purpose of storage |"));
        assert!(index.contains("## Data Flow"));

        let storage = render_offline_article(&ctx, &ctx.outline.articles[1]);
        assert!(storage.contains("- `storage`: Purpose of storage"));
        assert!(storage.contains("- `src/storage.rs`"));
        assert!(!storage.contains("## Articles"));
    }

    #[tokio::test]
    async fn offline_batch_renders_everything_without_calls() {
        let ctx = Arc::new(context());
        let ai = ScriptedService::unavailable("offline");
        let plans = ctx.outline.articles.clone();

        let mut completed = Vec::new();
        let batch = generate_articles(Arc::new(ai.clone()), ctx, plans, 2, |a| {
            completed.push(a.slug.clone())
        })
        .await;

        assert_eq!(batch.source, Some(Source::Heuristic));
        assert_eq!(batch.articles.len(), 4);
        assert_eq!(batch.articles[0].article_type, ArticleType::TopicIndex);
        assert_eq!(batch.articles[1].article_type, ArticleType::TopicArticle);
        assert!(batch.failed_slugs.is_empty());
        assert_eq!(completed.len(), 4);
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_recorded_per_slug() {
        let ctx = Arc::new(context());
        let ai = ScriptedService::new(|req| {
            if req.prompt.contains("\"Scheduler\"") {
                SendMessageResponse::failed("rate limited")
            } else {
                SendMessageResponse::ok("```markdown\nBody text\n```")
            }
        });
        let plans = ctx.outline.articles.clone();

        let completed = Mutex::new(Vec::new());
        let batch = generate_articles(Arc::new(ai.clone()), ctx, plans, 2, |a| {
            completed.lock().unwrap().push(a.slug.clone())
        })
        .await;

        let slugs: Vec<&str> = batch.articles.iter().map(|a| a.slug.as_str()).collect();
        assert_eq!(slugs, vec!["index", "storage", "manifest"]);
        assert_eq!(batch.failed_slugs, vec!["scheduler"]);
        assert_eq!(completed.lock().unwrap().len(), 3);
        assert_eq!(batch.articles[1].content, "# Storage\n\nBody text\n");
        assert_eq!(ai.call_count(), 4);
    }

    #[tokio::test]
    async fn empty_plan_list_is_empty_batch() {
        let ctx = Arc::new(context());
        let ai: Arc<dyn AiService> = Arc::new(ScriptedService::always("x"));
        let batch = generate_articles(ai, ctx, vec![], 4, |_| {}).await;
        assert!(batch.articles.is_empty());
        assert!(batch.source.is_none());
    }
}
