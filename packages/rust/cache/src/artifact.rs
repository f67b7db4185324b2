//! Artifact kinds stored in the cache.

use serde::Serialize;
use serde::de::DeserializeOwned;

use topicwiki_shared::{EnrichedProbeResult, TopicAnalysis, TopicArticle, TopicOutline};

/// A payload that can be wrapped in a cache envelope.
pub trait Artifact: Serialize + DeserializeOwned {
    /// Envelope key under which the payload is stored.
    const PAYLOAD_KEY: &'static str;

    /// Reject payloads that parsed but lack the data callers rely on.
    fn is_complete(&self) -> bool {
        true
    }
}

/// An artifact stored once per topic, in a fixed file.
pub trait TopicArtifact: Artifact {
    const FILE_NAME: &'static str;
}

impl Artifact for EnrichedProbeResult {
    const PAYLOAD_KEY: &'static str = "probeResult";

    /// An empty probe is never persisted, so one on disk is a stale or foreign file.
    fn is_complete(&self) -> bool {
        !self.probe_result.topic.trim().is_empty() && !self.probe_result.found_modules.is_empty()
    }
}

impl TopicArtifact for EnrichedProbeResult {
    const FILE_NAME: &'static str = "probe-result.json";
}

impl Artifact for TopicOutline {
    const PAYLOAD_KEY: &'static str = "outline";

    fn is_complete(&self) -> bool {
        !self.topic_id.is_empty() && !self.articles.is_empty()
    }
}

impl TopicArtifact for TopicOutline {
    const FILE_NAME: &'static str = "outline.json";
}

impl Artifact for TopicAnalysis {
    const PAYLOAD_KEY: &'static str = "analysis";

    fn is_complete(&self) -> bool {
        !self.topic_id.is_empty()
    }
}

impl TopicArtifact for TopicAnalysis {
    const FILE_NAME: &'static str = "analysis.json";
}

impl Artifact for TopicArticle {
    const PAYLOAD_KEY: &'static str = "article";

    fn is_complete(&self) -> bool {
        !self.slug.is_empty()
    }
}
