//! Deterministic in-process AI double.

use std::sync::{Arc, Mutex};

use crate::{AiFuture, AiService, Availability, SendMessageRequest, SendMessageResponse};

type Handler = dyn Fn(&SendMessageRequest) -> SendMessageResponse + Send + Sync;

/// An [`AiService`] whose answers come from a closure.
///
/// Every request is recorded so callers can assert on prompts and call counts.
#[derive(Clone)]
pub struct ScriptedService {
    availability: Availability,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<SendMessageRequest>>>,
}

impl ScriptedService {
    /// An available service answering every prompt with `handler`.
    pub fn new(
        handler: impl Fn(&SendMessageRequest) -> SendMessageResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            availability: Availability::available(),
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An available service that returns the same text for every prompt.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| SendMessageResponse::ok(text.clone()))
    }

    /// An available service whose every call fails with `error`.
    pub fn failing(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(move |_| SendMessageResponse::failed(error.clone()))
    }

    /// An unavailable service. Calls are still recorded if made.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut service = Self::failing("AI unavailable");
        service.availability = Availability::unavailable(reason);
        service
    }

    /// Number of `send_message` calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.iter().map(|req| req.prompt.clone()).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ScriptedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedService")
            .field("availability", &self.availability)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl AiService for ScriptedService {
    fn is_available(&self) -> AiFuture<'_, Availability> {
        let availability = self.availability.clone();
        Box::pin(async move { availability })
    }

    fn send_message(&self, request: SendMessageRequest) -> AiFuture<'_, SendMessageResponse> {
        let response = (self.handler)(&request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Box::pin(async move { response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_by_prompt_and_records_calls() {
        let service = ScriptedService::new(|req| {
            if req.prompt.contains("outline") {
                SendMessageResponse::ok("{}")
            } else {
                SendMessageResponse::failed("unexpected prompt")
            }
        });

        assert!(service.is_available().await.available);
        assert!(service.send_message(SendMessageRequest::new("outline please")).await.success);
        assert!(!service.send_message(SendMessageRequest::new("other")).await.success);
        assert_eq!(service.call_count(), 2);
        assert_eq!(service.prompts()[0], "outline please");
    }

    #[tokio::test]
    async fn unavailable_reports_reason() {
        let service = ScriptedService::unavailable("no key");
        let availability = service.is_available().await;
        assert!(!availability.available);
        assert_eq!(availability.reason.as_deref(), Some("no key"));
    }
}
