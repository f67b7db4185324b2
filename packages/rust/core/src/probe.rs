//! Probe phase: find the modules that implement a topic.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use topicwiki_ai::AiService;
use topicwiki_shared::{
    EnrichedProbeResult, ModuleGraph, ProbeFoundModule, ProbeResult, Result, TopicSeed,
    TopicWikiError, normalize_topic_id,
};

use crate::generation::{GenerationOptions, Source, ai_ready, ask};
use crate::json_repair::{object_array_field, parse_ai_json, str_field, str_field_or, string_array_field};
use crate::prompts::probe_prompt;
use crate::tokenize::{score_modules, tokenize};

/// Evidence recorded for modules taken without any keyword match.
const CANDIDATE_EVIDENCE: &str = "no keyword match; included as candidate";

/// A probe result and the path that produced it.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub result: EnrichedProbeResult,
    pub source: Source,
    /// Why the AI path was not used, when it was not.
    pub fallback_reason: Option<String>,
}

/// Run the probe: AI first, keyword scoring as fallback.
///
/// Fails only when neither path finds a single module.
#[instrument(skip_all, fields(topic = %seed.topic))]
pub async fn run_probe(
    ai: &dyn AiService,
    seed: &TopicSeed,
    graph: &ModuleGraph,
    wiki_dir: &Path,
    repo_files: &[String],
    options: &GenerationOptions,
) -> Result<ProbeOutcome> {
    let fallback_reason = match ai_ready(ai).await {
        Ok(()) => match ask(ai, probe_prompt(seed, graph, repo_files), options).await {
            Ok(text) => match parse_probe_response(&text, &seed.topic) {
                Ok(probe) if !probe.found_modules.is_empty() => {
                    info!(modules = probe.found_modules.len(), "probe answered by AI");
                    return Ok(ProbeOutcome {
                        result: enrich_probe(probe, graph),
                        source: Source::Ai,
                        fallback_reason: None,
                    });
                }
                Ok(_) => "AI found no modules".to_string(),
                Err(e) => e.to_string(),
            },
            Err(e) => e,
        },
        Err(reason) => reason,
    };

    warn!(reason = %fallback_reason, "probe falling back to keyword scoring");
    let probe = heuristic_probe(seed, graph, wiki_dir);
    if probe.found_modules.is_empty() {
        return Err(TopicWikiError::Generation(format!(
            "probe found no modules for topic '{}' ({fallback_reason})",
            seed.topic
        )));
    }

    info!(modules = probe.found_modules.len(), "probe answered by heuristic");
    Ok(ProbeOutcome {
        result: enrich_probe(probe, graph),
        source: Source::Heuristic,
        fallback_reason: Some(fallback_reason),
    })
}

/// Parse and validate a probe answer.
///
/// Entries without a string `id` are dropped; ids are normalized and
/// deduplicated.
pub fn parse_probe_response(response: &str, topic: &str) -> Result<ProbeResult> {
    let map = parse_ai_json(response)?;

    let mut seen = HashSet::new();
    let found_modules = object_array_field(&map, "foundModules")
        .into_iter()
        .filter_map(found_module_from)
        .filter(|m| seen.insert(m.id.clone()))
        .collect();

    Ok(ProbeResult {
        topic: topic.to_string(),
        found_modules,
        summary: str_field_or(&map, "summary", ""),
    })
}

fn found_module_from(entry: &Map<String, Value>) -> Option<ProbeFoundModule> {
    let raw_id = str_field(entry, "id")?;
    let id = normalize_topic_id(&raw_id);
    if id.is_empty() {
        return None;
    }
    Some(ProbeFoundModule {
        name: str_field(entry, "name").unwrap_or_else(|| raw_id.clone()),
        path: str_field_or(entry, "path", ""),
        purpose: str_field_or(entry, "purpose", ""),
        key_files: string_array_field(entry, "keyFiles"),
        evidence: str_field_or(entry, "evidence", ""),
        id,
    })
}

/// Keyword-score the graph with the seed's tokens.
///
/// Every scored module is found; when nothing scores, every graph module
/// is taken as a candidate.
pub fn heuristic_probe(seed: &TopicSeed, graph: &ModuleGraph, wiki_dir: &Path) -> ProbeResult {
    let keywords = tokenize(&seed.topic, Some(seed.description.as_str()), Some(seed.hints.as_slice()));
    let related = score_modules(&keywords, graph, wiki_dir);

    let found_modules: Vec<ProbeFoundModule> = if related.is_empty() {
        graph
            .modules
            .iter()
            .map(|m| ProbeFoundModule {
                id: m.id.clone(),
                name: m.name.clone(),
                path: m.path.clone(),
                purpose: m.purpose.clone(),
                key_files: m.key_files.clone(),
                evidence: CANDIDATE_EVIDENCE.to_string(),
            })
            .collect()
    } else {
        related
            .iter()
            .map(|r| {
                let module = graph.module(&r.module_id);
                ProbeFoundModule {
                    id: r.module_id.clone(),
                    name: r.module_name.clone(),
                    path: r.path.clone(),
                    purpose: module.map(|m| m.purpose.clone()).unwrap_or_default(),
                    key_files: module.map(|m| m.key_files.clone()).unwrap_or_default(),
                    evidence: format!("{} (score {})", r.match_reason, r.score),
                }
            })
            .collect()
    };

    let summary = if related.is_empty() {
        format!(
            "No module matched the keywords of '{}'; all {} modules are candidates.",
            seed.topic,
            found_modules.len()
        )
    } else {
        format!(
            "{} module(s) matched the keywords of '{}'.",
            found_modules.len(),
            seed.topic
        )
    };

    ProbeResult {
        topic: seed.topic.clone(),
        found_modules,
        summary,
    }
}

/// Partition probe findings against the module graph.
pub fn enrich_probe(probe_result: ProbeResult, graph: &ModuleGraph) -> EnrichedProbeResult {
    let mut existing_module_ids = Vec::new();
    let mut new_module_ids = Vec::new();
    let mut all_key_files = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut seen_files = HashSet::new();

    for module in &probe_result.found_modules {
        if seen_ids.insert(module.id.clone()) {
            if graph.module(&module.id).is_some() {
                existing_module_ids.push(module.id.clone());
            } else {
                new_module_ids.push(module.id.clone());
            }
        }
        for file in &module.key_files {
            if seen_files.insert(file.clone()) {
                all_key_files.push(file.clone());
            }
        }
    }

    EnrichedProbeResult {
        existing_module_ids,
        new_module_ids,
        all_key_files,
        probe_result,
    }
}
