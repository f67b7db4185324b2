//! Shared plumbing for AI-backed generation steps.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use topicwiki_ai::{AiService, SendMessageRequest};

/// Per-call options for an AI-backed step.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Model override; `None` uses the service default.
    pub model: Option<String>,
    /// Deadline for one AI call.
    pub timeout: Duration,
    /// Repository the AI may inspect.
    pub working_directory: Option<PathBuf>,
}

impl GenerationOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            model: None,
            timeout,
            working_directory: None,
        }
    }

    /// Same options with a different deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }
}

/// Which path produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Ai,
    Heuristic,
    Cache,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ai => "ai",
            Self::Heuristic => "heuristic",
            Self::Cache => "cache",
        })
    }
}

/// Whether the service can take calls right now, with the reason when it cannot.
pub async fn ai_ready(ai: &dyn AiService) -> Result<(), String> {
    let availability = ai.is_available().await;
    if availability.available {
        Ok(())
    } else {
        Err(availability
            .reason
            .unwrap_or_else(|| "AI service unavailable".to_string()))
    }
}

/// Send one prompt and return the non-blank answer.
///
/// The call is bounded by `options.timeout` on top of whatever deadline the
/// adapter applies itself. Every failure comes back as an error string.
pub async fn ask(ai: &dyn AiService, prompt: String, options: &GenerationOptions) -> Result<String, String> {
    let request = SendMessageRequest {
        prompt,
        working_directory: options.working_directory.clone(),
        model: options.model.clone(),
        timeout_ms: Some(options.timeout.as_millis() as u64),
    };

    // Small margin so the adapter's own timeout usually reports first.
    let guard = options.timeout + Duration::from_secs(1);
    let response = match tokio::time::timeout(guard, ai.send_message(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(timeout_ms = options.timeout.as_millis(), "AI call timed out");
            return Err(format!("timed out after {}s", options.timeout.as_secs()));
        }
    };

    if let Some(text) = response.text() {
        debug!(chars = text.len(), "AI answered");
        return Ok(text.to_string());
    }

    if response.success {
        Err("empty response".to_string())
    } else {
        Err(response
            .error
            .unwrap_or_else(|| "unknown AI error".to_string()))
    }
}
