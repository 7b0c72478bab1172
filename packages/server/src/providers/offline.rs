use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DecisionProvider, DecisionRequest, ProviderError};

/// Provider used when no API key is configured. It never names a player,
/// so every targeted decision takes the random fallback.
#[derive(Debug, Clone, Default)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub const LABEL: &'static str = "Offline";
    const REPLY: &'static str = "I have nothing certain to share yet. Let us keep watching.";
}

#[async_trait]
impl DecisionProvider for OfflineProvider {
    async fn decide(&self, _request: DecisionRequest) -> Result<String, ProviderError> {
        Ok(Self::REPLY.to_string())
    }
}

/// Replays queued replies in order and records every request it receives.
/// Once the queue is empty it answers with `fallback`.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<DecisionRequest>>,
    fallback: String,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedProvider {
            replies: Mutex::new(replies.into_iter().map(|s| Ok(s.into())).collect()),
            requests: Mutex::new(Vec::new()),
            fallback: String::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Queues a failure for the next unanswered request.
    pub fn push_error(&self, error: ProviderError) {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    async fn decide(&self, request: DecisionRequest) -> Result<String, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
