//! OpenRouter adapter (OpenAI-compatible chat completions).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use topicwiki_shared::{OpenRouterConfig, Result, TopicWikiError};

use crate::{AiFuture, AiService, Availability, SendMessageRequest, SendMessageResponse};

/// User-Agent string for AI requests.
const USER_AGENT: &str = concat!("topicwiki/", env!("CARGO_PKG_VERSION"));

/// Timeout applied when the request does not carry one.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// [`AiService`] backed by an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenRouterService {
    client: Client,
    endpoint: Url,
    api_key_env: String,
    api_key: Option<String>,
    default_model: String,
}

impl OpenRouterService {
    /// Build a service from config, reading the API key from the configured env var.
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::with_api_key(config, api_key)
    }

    /// Build a service with an explicit API key (`None` makes it unavailable).
    pub fn with_api_key(config: &OpenRouterConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TopicWikiError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = config.base_url.join("chat/completions").map_err(|e| {
            TopicWikiError::config(format!("invalid OpenRouter base_url {}: {e}", config.base_url))
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key_env: config.api_key_env.clone(),
            api_key,
            default_model: config.default_model.clone(),
        })
    }

    #[instrument(skip_all, fields(model = %model, endpoint = %self.endpoint))]
    async fn complete(&self, api_key: &str, model: &str, request: &SendMessageRequest) -> SendMessageResponse {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let response = match self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .header("X-Title", "topicwiki")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(timeout_ms = timeout.as_millis(), "AI request timed out");
                return SendMessageResponse::failed(format!(
                    "request timed out after {}ms",
                    timeout.as_millis()
                ));
            }
            Err(e) => return SendMessageResponse::failed(format!("request failed: {e}")),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return SendMessageResponse::failed(format!("failed to read response: {e}")),
        };

        if !status.is_success() {
            let message = serde_json::from_str::<ChatResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(text);
            return SendMessageResponse::failed(format!("HTTP {}: {message}", status.as_u16()));
        }

        let parsed: ChatResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => return SendMessageResponse::failed(format!("invalid response body: {e}")),
        };

        if let Some(error) = parsed.error {
            return SendMessageResponse::failed(error.message);
        }

        match parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        {
            Some(content) if !content.trim().is_empty() => {
                debug!(chars = content.len(), "AI response received");
                SendMessageResponse::ok(content)
            }
            _ => SendMessageResponse::failed("empty response"),
        }
    }
}

impl AiService for OpenRouterService {
    fn is_available(&self) -> AiFuture<'_, Availability> {
        let availability = if self.api_key.is_some() {
            Availability::available()
        } else {
            Availability::unavailable(format!(
                "API key not found. Set the {} environment variable.",
                self.api_key_env
            ))
        };
        Box::pin(async move { availability })
    }

    fn send_message(&self, request: SendMessageRequest) -> AiFuture<'_, SendMessageResponse> {
        Box::pin(async move {
            let Some(api_key) = self.api_key.as_deref() else {
                return SendMessageResponse::failed(format!(
                    "{} is not set",
                    self.api_key_env
                ));
            };
            let model = request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone());
            self.complete(api_key, &model, &request).await
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ChatError>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenRouterConfig {
        OpenRouterConfig {
            api_key_env: "TOPICWIKI_TEST_NONEXISTENT_KEY_12345".into(),
            default_model: "test/model".into(),
            base_url: Url::parse(&format!("{}/api/v1/", server.uri())).unwrap(),
        }
    }

    #[tokio::test]
    async fn unavailable_without_key() {
        let server = MockServer::start().await;
        let service = OpenRouterService::new(&config_for(&server)).unwrap();
        let availability = service.is_available().await;
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("TOPICWIKI_TEST_NONEXISTENT_KEY_12345"));

        let response = service.send_message(SendMessageRequest::new("hi")).await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"layout\":\"single\"}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service =
            OpenRouterService::with_api_key(&config_for(&server), Some("secret".into())).unwrap();
        assert!(service.is_available().await.available);

        let response = service.send_message(SendMessageRequest::new("outline")).await;
        assert!(response.success);
        assert_eq!(response.text(), Some("{\"layout\":\"single\"}"));
    }

    #[tokio::test]
    async fn http_error_becomes_failed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "rate limited" }
            })))
            .mount(&server)
            .await;

        let service =
            OpenRouterService::with_api_key(&config_for(&server), Some("secret".into())).unwrap();
        let response = service.send_message(SendMessageRequest::new("outline")).await;
        assert!(!response.success);
        let error = response.error.unwrap();
        assert!(error.contains("429"));
        assert!(error.contains("rate limited"));
    }

    #[tokio::test]
    async fn empty_choices_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let service =
            OpenRouterService::with_api_key(&config_for(&server), Some("secret".into())).unwrap();
        let response = service.send_message(SendMessageRequest::new("outline")).await;
        assert_eq!(response.error.as_deref(), Some("empty response"));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let service =
            OpenRouterService::with_api_key(&config_for(&server), Some("secret".into())).unwrap();
        let mut request = SendMessageRequest::new("outline");
        request.timeout_ms = Some(50);
        let response = service.send_message(request).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("timed out"));
    }
}
