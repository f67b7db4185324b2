//! Prompt builders for every AI-backed phase.
//!
//! Each prompt asks for one strict output format; the matching parser
//! lives with the phase that sends it.

use std::fmt::Write as _;

use topicwiki_shared::{
    ArticleAnalysis, Depth, EnrichedProbeResult, ModuleGraph, TopicAnalysis, TopicArticlePlan,
    TopicOutline, TopicSeed,
};

/// Cap on graph modules listed in the probe prompt.
const MAX_PROMPT_MODULES: usize = 200;

/// Layout suggestion derived from how many modules the probe found.
pub fn layout_hint(module_count: usize) -> &'static str {
    match module_count {
        0..=2 => "Few modules are involved: prefer layout \"single\" with one comprehensive article.",
        3..=6 => {
            "Several modules are involved: suggest layout \"area\" with an index article plus one article per major aspect."
        }
        _ => {
            "Many modules are involved: suggest layout \"area\" with an index article and multiple focused sub-articles."
        }
    }
}

/// How finely to split a topic at each depth.
pub fn depth_instruction(depth: Depth) -> &'static str {
    match depth {
        Depth::Shallow => "Depth: shallow. Aim for 1-2 articles; merge aspects aggressively.",
        Depth::Normal => "Depth: normal. Balance breadth and detail; one article per distinct aspect.",
        Depth::Deep => {
            "Depth: deep. Be fine-grained; include articles on internals and edge cases."
        }
    }
}

fn write_seed(out: &mut String, seed: &TopicSeed) {
    let _ = writeln!(out, "Topic: {}", seed.topic);
    let _ = writeln!(out, "Description: {}", seed.description);
    if !seed.hints.is_empty() {
        let _ = writeln!(out, "Search hints: {}", seed.hints.join(", "));
    }
}

fn write_probe_modules(out: &mut String, probe: &EnrichedProbeResult) {
    for module in &probe.probe_result.found_modules {
        let _ = writeln!(out, "- {} (id: {}, path: {})", module.name, module.id, module.path);
        if !module.purpose.is_empty() {
            let _ = writeln!(out, "  purpose: {}", module.purpose);
        }
        if !module.key_files.is_empty() {
            let _ = writeln!(out, "  key files: {}", module.key_files.join(", "));
        }
        if !module.evidence.is_empty() {
            let _ = writeln!(out, "  evidence: {}", module.evidence);
        }
    }
}

/// Ask the AI which modules of the repository implement the topic.
pub fn probe_prompt(seed: &TopicSeed, graph: &ModuleGraph, repo_files: &[String]) -> String {
    let mut out = String::new();
    out.push_str("You are mapping a codebase to find every module involved in one topic.\n\n");
    write_seed(&mut out, seed);

    if !graph.modules.is_empty() {
        out.push_str("\nKnown modules:\n");
        for module in graph.modules.iter().take(MAX_PROMPT_MODULES) {
            let _ = writeln!(
                out,
                "- {} (id: {}, path: {}): {}",
                module.name, module.id, module.path, module.purpose
            );
        }
    }

    if !repo_files.is_empty() {
        out.push_str("\nRepository files:\n");
        for file in repo_files {
            let _ = writeln!(out, "- {file}");
        }
    }

    out.push_str(
        "\nRespond with strict JSON only, no prose:\n\
         {\"foundModules\": [{\"id\": \"...\", \"name\": \"...\", \"path\": \"...\", \
         \"purpose\": \"...\", \"keyFiles\": [\"...\"], \"evidence\": \"...\"}], \
         \"summary\": \"...\"}\n\
         Reuse the id of a known module when the code belongs to it.\n",
    );
    out
}

/// Ask the AI to decompose the topic into an article plan.
pub fn outline_prompt(seed: &TopicSeed, probe: &EnrichedProbeResult, depth: Depth) -> String {
    let module_count = probe.probe_result.found_modules.len();

    let mut out = String::new();
    out.push_str("You are planning wiki articles that document one topic of a codebase.\n\n");
    write_seed(&mut out, seed);

    out.push_str("\nModules involved:\n");
    write_probe_modules(&mut out, probe);

    let _ = writeln!(out, "\n{}", layout_hint(module_count));
    let _ = writeln!(out, "{}", depth_instruction(depth));

    out.push_str(
        "\nRespond with strict JSON only, no prose:\n\
         {\"title\": \"...\", \"layout\": \"single\" | \"area\", \"articles\": [{\"slug\": \"...\", \
         \"title\": \"...\", \"description\": \"...\", \"isIndex\": false, \
         \"coveredModuleIds\": [\"...\"], \"coveredFiles\": [\"...\"]}]}\n\
         For layout \"area\" include exactly one article with slug \"index\" and isIndex true.\n",
    );
    out
}

/// Ask the AI for topic-wide and per-article analysis notes.
pub fn analysis_prompt(seed: &TopicSeed, outline: &TopicOutline, probe: &EnrichedProbeResult) -> String {
    let mut out = String::new();
    out.push_str("You are analysing how one topic is implemented across a codebase.\n\n");
    write_seed(&mut out, seed);

    out.push_str("\nModules involved:\n");
    write_probe_modules(&mut out, probe);

    out.push_str("\nPlanned articles:\n");
    for plan in &outline.articles {
        let _ = writeln!(out, "- {} (slug: {}): {}", plan.title, plan.slug, plan.description);
        if !plan.covered_files.is_empty() {
            let _ = writeln!(out, "  files: {}", plan.covered_files.join(", "));
        }
    }

    out.push_str(
        "\nRespond with strict JSON only, no prose:\n\
         {\"overview\": \"...\", \"dataFlow\": \"...\", \"crossCuttingConcerns\": [\"...\"], \
         \"articles\": [{\"slug\": \"...\", \"keyPoints\": [\"...\"], \"keyFiles\": [\"...\"], \
         \"notes\": \"...\"}]}\n\
         Include one entry per planned article slug.\n",
    );
    out
}

/// Ask the AI to write one article as markdown.
pub fn article_prompt(
    seed: &TopicSeed,
    outline: &TopicOutline,
    plan: &TopicArticlePlan,
    analysis: &TopicAnalysis,
    article_analysis: Option<&ArticleAnalysis>,
    depth: Depth,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are writing the article \"{}\" of the wiki topic \"{}\".\n",
        plan.title, outline.title
    );
    write_seed(&mut out, seed);

    let _ = writeln!(out, "\nArticle purpose: {}", plan.description);
    if !plan.covered_module_ids.is_empty() {
        let _ = writeln!(out, "Modules covered: {}", plan.covered_module_ids.join(", "));
    }
    if !plan.covered_files.is_empty() {
        let _ = writeln!(out, "Files to read: {}", plan.covered_files.join(", "));
    }

    if !analysis.overview.is_empty() {
        let _ = writeln!(out, "\nTopic overview: {}", analysis.overview);
    }
    if !analysis.data_flow.is_empty() {
        let _ = writeln!(out, "Data flow: {}", analysis.data_flow);
    }
    if let Some(notes) = article_analysis {
        if !notes.key_points.is_empty() {
            out.push_str("Key points:\n");
            for point in &notes.key_points {
                let _ = writeln!(out, "- {point}");
            }
        }
        if !notes.notes.is_empty() {
            let _ = writeln!(out, "Notes: {}", notes.notes);
        }
    }

    let siblings: Vec<&TopicArticlePlan> = outline
        .articles
        .iter()
        .filter(|a| a.slug != plan.slug)
        .collect();
    if !siblings.is_empty() {
        out.push_str("\nOther articles in this topic (link with relative markdown links):\n");
        for sibling in siblings {
            let _ = writeln!(out, "- [{}]({}.md)", sibling.title, sibling.slug);
        }
    }

    let _ = writeln!(out, "\n{}", depth_instruction(depth));
    out.push_str(
        "\nRespond with the article as GitHub-flavoured markdown only, starting with a level-1 heading. \
         Do not wrap it in a code fence.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicwiki_shared::{ProbeFoundModule, ProbeResult, TopicLayout};

    fn seed() -> TopicSeed {
        TopicSeed {
            topic: "compaction".into(),
            description: "How segments merge".into(),
            hints: vec!["compaction".into(), "compacting".into()],
        }
    }

    fn probe(count: usize) -> EnrichedProbeResult {
        EnrichedProbeResult {
            probe_result: ProbeResult {
                topic: "compaction".into(),
                found_modules: (0..count)
                    .map(|i| ProbeFoundModule {
                        id: format!("m{i}"),
                        name: format!("Module {i}"),
                        ..Default::default()
                    })
                    .collect(),
                summary: String::new(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn layout_hint_follows_module_count() {
        assert!(layout_hint(2).contains("single"));
        assert!(layout_hint(3).contains("per major aspect"));
        assert!(layout_hint(6).contains("per major aspect"));
        assert!(layout_hint(7).contains("multiple focused"));
    }

    #[test]
    fn outline_prompt_embeds_seed_modules_and_depth() {
        let prompt = outline_prompt(&seed(), &probe(4), Depth::Shallow);
        assert!(prompt.contains("Topic: compaction"));
        assert!(prompt.contains("Search hints: compaction, compacting"));
        assert!(prompt.contains("Module 3 (id: m3"));
        assert!(prompt.contains("1-2 articles"));
        assert!(prompt.contains("strict JSON"));
    }

    #[test]
    fn article_prompt_lists_siblings_but_not_itself() {
        let outline = TopicOutline {
            topic_id: "compaction".into(),
            title: "Compaction".into(),
            layout: TopicLayout::Area,
            articles: vec![
                TopicArticlePlan {
                    slug: "index".into(),
                    title: "Compaction".into(),
                    is_index: true,
                    ..Default::default()
                },
                TopicArticlePlan {
                    slug: "merge-policy".into(),
                    title: "Merge Policy".into(),
                    ..Default::default()
                },
            ],
            involved_modules: vec![],
        };
        let prompt = article_prompt(
            &seed(),
            &outline,
            &outline.articles[1],
            &TopicAnalysis::default(),
            None,
            Depth::Normal,
        );
        assert!(prompt.contains("[Compaction](index.md)"));
        assert!(!prompt.contains("(merge-policy.md)"));
    }
}
