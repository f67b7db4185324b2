//! Outline generation: decompose a topic into planned articles.
//!
//! The AI path asks for a JSON plan and validates every field of the
//! answer. When the AI is unavailable or its answer is unusable, a
//! deterministic heuristic derives the plan from the probe result. Both
//! paths end in [`normalize_outline`], which enforces the outline
//! invariants:
//!
//! - at least one article;
//! - unique, URL-safe slugs;
//! - an `area` outline has exactly one index article, first, slug `index`;
//! - a `single` outline has exactly one article, the index.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use topicwiki_ai::AiService;
use topicwiki_shared::{
    Depth, EnrichedProbeResult, TopicArticlePlan, TopicInvolvedModule, TopicLayout,
    TopicOutline, TopicSeed, slugify, title_case,
};

use crate::generation::{GenerationOptions, Source, ai_ready, ask};
use crate::json_repair::{
    bool_field, object_array_field, parse_ai_json, str_field, str_field_or,
    string_array_field, string_array_field_any,
};
use crate::prompts::outline_prompt;

/// Slug of the index article.
pub const INDEX_SLUG: &str = "index";

/// Probe sizes up to this produce a single-article outline in the fallback.
const SINGLE_LAYOUT_MAX_MODULES: usize = 2;

/// Accepted spellings of the covered-modules field.
const COVERED_MODULE_KEYS: &[&str] = &["coveredModuleIds", "coveredComponentIds"];

/// An outline and the path that produced it.
#[derive(Debug, Clone)]
pub struct OutlineOutcome {
    pub outline: TopicOutline,
    pub source: Source,
    pub fallback_reason: Option<String>,
}

/// Generate the outline for a topic. Never fails: every AI problem falls
/// back to [`fallback_outline`].
#[instrument(skip_all, fields(topic = %seed.topic, depth = %depth))]
pub async fn generate_outline(
    ai: &dyn AiService,
    seed: &TopicSeed,
    probe: &EnrichedProbeResult,
    depth: Depth,
    options: &GenerationOptions,
) -> OutlineOutcome {
    let fallback_reason = match ai_ready(ai).await {
        Ok(()) => match ask(ai, outline_prompt(seed, probe, depth), options).await {
            Ok(text) => match parse_ai_json(&text) {
                Ok(map) => {
                    let outline = validate_outline(&map, seed, probe);
                    info!(
                        layout = %outline.layout,
                        articles = outline.articles.len(),
                        "outline answered by AI"
                    );
                    return OutlineOutcome {
                        outline,
                        source: Source::Ai,
                        fallback_reason: None,
                    };
                }
                Err(e) => e.to_string(),
            },
            Err(e) => e,
        },
        Err(reason) => reason,
    };

    warn!(reason = %fallback_reason, "outline falling back to heuristic");
    let outline = fallback_outline(seed, probe);
    info!(
        layout = %outline.layout,
        articles = outline.articles.len(),
        "outline built by heuristic"
    );
    OutlineOutcome {
        outline,
        source: Source::Heuristic,
        fallback_reason: Some(fallback_reason),
    }
}

/// Build an outline from an untrusted AI answer.
///
/// Unknown layouts read as `single`; articles lacking a string `slug` or
/// `title` are dropped; when none survive, one index article covering
/// every probed module is synthesized. `involvedModules` always comes from
/// the probe.
pub fn validate_outline(map: &Map<String, Value>, seed: &TopicSeed, probe: &EnrichedProbeResult) -> TopicOutline {
    let layout = match map.get("layout").and_then(Value::as_str) {
        Some("area") => TopicLayout::Area,
        _ => TopicLayout::Single,
    };

    let mut articles: Vec<TopicArticlePlan> = object_array_field(map, "articles")
        .into_iter()
        .filter_map(article_plan_from)
        .collect();

    let title = str_field(map, "title").unwrap_or_else(|| title_case(&seed.topic));

    if articles.is_empty() {
        articles.push(TopicArticlePlan {
            slug: INDEX_SLUG.to_string(),
            title: title.clone(),
            description: seed.description.clone(),
            is_index: true,
            covered_module_ids: probed_module_ids(probe),
            covered_files: probe.all_key_files.clone(),
        });
    }

    normalize_outline(TopicOutline {
        topic_id: seed.topic.clone(),
        title,
        layout,
        articles,
        involved_modules: involved_modules(probe),
    })
}

fn article_plan_from(entry: &Map<String, Value>) -> Option<TopicArticlePlan> {
    let slug = str_field(entry, "slug")?;
    let title = str_field(entry, "title")?;
    Some(TopicArticlePlan {
        slug,
        title,
        description: str_field_or(entry, "description", ""),
        is_index: bool_field(entry, "isIndex"),
        covered_module_ids: string_array_field_any(entry, COVERED_MODULE_KEYS),
        covered_files: string_array_field(entry, "coveredFiles"),
    })
}

/// Deterministic outline derived from the probe result alone.
///
/// Up to two modules: a `single` outline whose index covers everything.
/// More: an `area` outline with an index covering every module plus one
/// article per module.
pub fn fallback_outline(seed: &TopicSeed, probe: &EnrichedProbeResult) -> TopicOutline {
    let title = title_case(&seed.topic);
    let modules = &probe.probe_result.found_modules;

    let (layout, articles) = if modules.len() <= SINGLE_LAYOUT_MAX_MODULES {
        let index = TopicArticlePlan {
            slug: INDEX_SLUG.to_string(),
            title: title.clone(),
            description: seed.description.clone(),
            is_index: true,
            covered_module_ids: probed_module_ids(probe),
            covered_files: probe.all_key_files.clone(),
        };
        (TopicLayout::Single, vec![index])
    } else {
        let mut articles = Vec::with_capacity(modules.len() + 1);
        articles.push(TopicArticlePlan {
            slug: INDEX_SLUG.to_string(),
            title: title.clone(),
            description: format!("Overview of {} across {} modules", title, modules.len()),
            is_index: true,
            covered_module_ids: probed_module_ids(probe),
            covered_files: Vec::new(),
        });
        for module in modules {
            let name = if module.name.is_empty() {
                title_case(&module.id)
            } else {
                module.name.clone()
            };
            let description = if module.purpose.is_empty() {
                format!("How {name} takes part in {title}")
            } else {
                module.purpose.clone()
            };
            articles.push(TopicArticlePlan {
                slug: module.id.clone(),
                title: name,
                description,
                is_index: false,
                covered_module_ids: vec![module.id.clone()],
                covered_files: module.key_files.clone(),
            });
        }
        (TopicLayout::Area, articles)
    };

    normalize_outline(TopicOutline {
        topic_id: seed.topic.clone(),
        title,
        layout,
        articles,
        involved_modules: involved_modules(probe),
    })
}

/// Enforce the outline invariants.
pub fn normalize_outline(mut outline: TopicOutline) -> TopicOutline {
    if outline.layout == TopicLayout::Single && outline.articles.len() > 1 {
        outline.layout = TopicLayout::Area;
    }

    let articles = std::mem::take(&mut outline.articles);
    let index_pos = articles
        .iter()
        .position(|a| a.is_index)
        .or_else(|| articles.iter().position(|a| slugify(&a.slug) == INDEX_SLUG));

    let mut rest = articles;
    let mut index = match index_pos {
        Some(pos) => rest.remove(pos),
        None if outline.layout == TopicLayout::Single && !rest.is_empty() => rest.remove(0),
        None => TopicArticlePlan {
            slug: INDEX_SLUG.to_string(),
            title: outline.title.clone(),
            description: format!("Overview of {}", outline.title),
            is_index: true,
            covered_module_ids: union_of_modules(&rest),
            covered_files: Vec::new(),
        },
    };
    index.slug = INDEX_SLUG.to_string();
    index.is_index = true;

    let mut used: HashSet<String> = HashSet::from([INDEX_SLUG.to_string()]);
    let mut normalized = vec![index];
    for mut article in rest {
        article.is_index = false;
        article.slug = unique_slug(&slugify(&article.slug), &mut used);
        normalized.push(article);
    }

    outline.articles = normalized;
    outline
}

fn unique_slug(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn union_of_modules(articles: &[TopicArticlePlan]) -> Vec<String> {
    let mut seen = HashSet::new();
    articles
        .iter()
        .flat_map(|a| a.covered_module_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn probed_module_ids(probe: &EnrichedProbeResult) -> Vec<String> {
    probe
        .probe_result
        .found_modules
        .iter()
        .map(|m| m.id.clone())
        .collect()
}

/// Involved modules, straight from the probe.
pub fn involved_modules(probe: &EnrichedProbeResult) -> Vec<TopicInvolvedModule> {
    probe
        .probe_result
        .found_modules
        .iter()
        .map(|m| TopicInvolvedModule {
            module_id: m.id.clone(),
            role: if m.purpose.is_empty() {
                m.evidence.clone()
            } else {
                m.purpose.clone()
            },
            key_files: m.key_files.clone(),
        })
        .collect()
}
