//! AI service port used by the topic pipeline.
//!
//! The pipeline treats the AI as a text-in/text-out collaborator with an
//! availability signal. [`AiService`] is that boundary; adapters live in
//! the submodules:
//! - [`OpenRouterService`]: OpenAI-compatible chat completions over HTTP
//! - [`UnavailableService`]: offline mode, never available
//! - [`ScriptedService`]: deterministic in-process double for tests

mod offline;
mod openrouter;
mod scripted;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use offline::UnavailableService;
pub use openrouter::OpenRouterService;
pub use scripted::ScriptedService;

/// Boxed future returned by [`AiService`] methods, keeping the trait dyn-compatible.
pub type AiFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whether the AI service can be used, and why not if it cannot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// A single prompt sent to the AI service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub prompt: String,
    /// Directory the service may inspect while answering (agentic backends).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl SendMessageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Outcome of a prompt. Failures are values, not errors: callers decide
/// whether to fall back, record, or abort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendMessageResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(text.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }

    /// The response text, if the call succeeded with non-blank content.
    pub fn text(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.response.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Text-in/text-out AI collaborator.
pub trait AiService: Send + Sync {
    /// Report whether the service can currently be used.
    fn is_available(&self) -> AiFuture<'_, Availability>;

    /// Send one prompt. Implementations must not panic; every failure is
    /// reported through [`SendMessageResponse::failed`].
    fn send_message(&self, request: SendMessageRequest) -> AiFuture<'_, SendMessageResponse>;
}
