//! Analysis phase: topic-wide notes that feed article generation.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use topicwiki_ai::AiService;
use topicwiki_shared::{ArticleAnalysis, EnrichedProbeResult, TopicAnalysis, TopicOutline, TopicSeed, slugify};

use crate::generation::{GenerationOptions, Source, ai_ready, ask};
use crate::json_repair::{
    object_array_field, parse_ai_json, str_field, str_field_or, string_array_field,
};
use crate::prompts::analysis_prompt;

/// An analysis and the path that produced it.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: TopicAnalysis,
    pub source: Source,
    pub fallback_reason: Option<String>,
}

/// Analyse the topic. Never fails: AI problems fall back to
/// [`heuristic_analysis`].
#[instrument(skip_all, fields(topic = %seed.topic))]
pub async fn run_analysis(
    ai: &dyn AiService,
    seed: &TopicSeed,
    outline: &TopicOutline,
    probe: &EnrichedProbeResult,
    options: &GenerationOptions,
) -> AnalysisOutcome {
    let fallback_reason = match ai_ready(ai).await {
        Ok(()) => match ask(ai, analysis_prompt(seed, outline, probe), options).await {
            Ok(text) => match parse_ai_json(&text) {
                Ok(map) => {
                    let analysis = validate_analysis(&map, seed, outline, probe);
                    info!(articles = analysis.articles.len(), "analysis answered by AI");
                    return AnalysisOutcome {
                        analysis,
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

    warn!(reason = %fallback_reason, "analysis falling back to heuristic");
    AnalysisOutcome {
        analysis: heuristic_analysis(seed, outline, probe),
        source: Source::Heuristic,
        fallback_reason: Some(fallback_reason),
    }
}

/// Build an analysis from an untrusted AI answer.
///
/// Entries for slugs not in the outline are dropped; planned articles the
/// answer skipped get a heuristic entry. Entries follow outline order.
pub fn validate_analysis(
    map: &Map<String, Value>,
    seed: &TopicSeed,
    outline: &TopicOutline,
    probe: &EnrichedProbeResult,
) -> TopicAnalysis {
    let fallback = heuristic_analysis(seed, outline, probe);

    let mut answered: HashMap<String, ArticleAnalysis> = HashMap::new();
    for entry in object_array_field(map, "articles") {
        let Some(slug) = str_field(entry, "slug").map(|s| slugify(&s)) else {
            continue;
        };
        if outline.article(&slug).is_none() {
            continue;
        }
        answered.entry(slug.clone()).or_insert_with(|| ArticleAnalysis {
            slug,
            key_points: string_array_field(entry, "keyPoints"),
            key_files: string_array_field(entry, "keyFiles"),
            notes: str_field_or(entry, "notes", ""),
        });
    }

    let articles = fallback
        .articles
        .into_iter()
        .map(|heuristic| answered.remove(&heuristic.slug).unwrap_or(heuristic))
        .collect();

    TopicAnalysis {
        topic_id: outline.topic_id.clone(),
        overview: str_field(map, "overview").unwrap_or(fallback.overview),
        data_flow: str_field(map, "dataFlow").unwrap_or(fallback.data_flow),
        cross_cutting_concerns: string_array_field(map, "crossCuttingConcerns"),
        articles,
    }
}

/// Deterministic analysis from the seed, outline and probe.
pub fn heuristic_analysis(seed: &TopicSeed, outline: &TopicOutline, probe: &EnrichedProbeResult) -> TopicAnalysis {
    let summary = probe.probe_result.summary.trim();
    let overview = if summary.is_empty() {
        seed.description.clone()
    } else {
        format!("{}. {}", seed.description.trim_end_matches('.'), summary)
    };

    let module_names: Vec<&str> = probe
        .probe_result
        .found_modules
        .iter()
        .map(|m| if m.name.is_empty() { m.id.as_str() } else { m.name.as_str() })
        .collect();
    let data_flow = if module_names.is_empty() {
        String::new()
    } else {
        format!("Modules involved: {}", module_names.join(" → "))
    };

    let articles = outline
        .articles
        .iter()
        .map(|plan| {
            let mut key_points = Vec::new();
            if !plan.description.is_empty() {
                key_points.push(plan.description.clone());
            }
            for id in &plan.covered_module_ids {
                if let Some(module) = probe.probe_result.found_modules.iter().find(|m| &m.id == id) {
                    if !module.purpose.is_empty() {
                        key_points.push(format!("{}: {}", module.name, module.purpose));
                    }
                }
            }
            ArticleAnalysis {
                slug: plan.slug.clone(),
                key_points,
                key_files: plan.covered_files.clone(),
                notes: String::new(),
            }
        })
        .collect();

    TopicAnalysis {
        topic_id: outline.topic_id.clone(),
        overview,
        data_flow,
        cross_cutting_concerns: Vec::new(),
        articles,
    }
}
