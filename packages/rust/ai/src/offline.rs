//! Offline adapter: the AI is never available.

use crate::{AiFuture, AiService, Availability, SendMessageRequest, SendMessageResponse};

/// An [`AiService`] that is always unavailable. Used by `--offline` runs,
/// which take the heuristic path in every phase.
#[derive(Debug, Clone)]
pub struct UnavailableService {
    reason: String,
}

impl UnavailableService {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableService {
    fn default() -> Self {
        Self::new("offline mode")
    }
}

impl AiService for UnavailableService {
    fn is_available(&self) -> AiFuture<'_, Availability> {
        let availability = Availability::unavailable(self.reason.clone());
        Box::pin(async move { availability })
    }

    fn send_message(&self, _request: SendMessageRequest) -> AiFuture<'_, SendMessageResponse> {
        let response = SendMessageResponse::failed(format!("AI unavailable: {}", self.reason));
        Box::pin(async move { response })
    }
}
