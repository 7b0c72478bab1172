//! Decision providers: anything that turns a prompt into response text.
//!
//! The engine only knows [`DecisionProvider`]. Concrete clients for the
//! OpenAI and Anthropic chat APIs, plus offline and scripted providers,
//! live in the submodules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::roles::{DECISION_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::utils::config::ProviderSettings;

pub mod anthropic;
pub mod offline;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use offline::{OfflineProvider, ScriptedProvider};
pub use openai::OpenAiClient;

pub const OPENAI_MODELS: [&str; 2] = ["gpt-4", "gpt-3.5-turbo"];
pub const ANTHROPIC_MODELS: [&str; 3] = [
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

pub const HUMAN_LABEL: &str = "Human Player";

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl DecisionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        DecisionRequest {
            prompt: prompt.into(),
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DECISION_MAX_TOKENS,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("no decision within {0:?}")]
    Timeout(Duration),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Classifies a non-success HTTP status from a chat API.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => ProviderError::Authentication(body),
            429 => ProviderError::Quota(body),
            code => ProviderError::Network(format!("status {}: {}", code, body)),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ProviderError::InvalidResponse(error.to_string())
        } else {
            ProviderError::Network(error.to_string())
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, request: DecisionRequest) -> Result<String, ProviderError>;
}

/// A provider bound to the per-call deadline of its session.
pub struct Decider<'a> {
    provider: &'a dyn DecisionProvider,
    timeout: Duration,
}

impl<'a> Decider<'a> {
    pub fn new(provider: &'a dyn DecisionProvider, timeout: Duration) -> Self {
        Decider { provider, timeout }
    }

    /// One provider call. Never retried; failures go back to the caller's
    /// fallback.
    pub async fn ask(&self, request: DecisionRequest) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.timeout, self.provider.decide(request)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(error)) => {
                warn!(%error, "decision provider failed");
                Err(error)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "decision provider timed out");
                Err(ProviderError::Timeout(self.timeout))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Offline,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "OpenAI"),
            ProviderKind::Anthropic => write!(f, "Anthropic"),
            ProviderKind::Offline => write!(f, "Offline"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "offline" => Ok(ProviderKind::Offline),
            other => Err(format!("unknown provider kind: {}", other)),
        }
    }
}

/// How AI seats are assigned providers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SeatingPlan {
    /// One provider kind and model for every AI seat.
    Single { kind: ProviderKind, model: String },
    /// Rotate through every configured model by roster position.
    #[default]
    Mixed,
}

/// Who answers for one player.
#[derive(Clone)]
pub enum Seat {
    Human,
    Agent {
        provider: Arc<dyn DecisionProvider>,
        label: String,
    },
}

impl Seat {
    pub fn agent(provider: Arc<dyn DecisionProvider>, label: impl Into<String>) -> Self {
        Seat::Agent {
            provider,
            label: label.into(),
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Seat::Human)
    }

    pub fn label(&self) -> &str {
        match self {
            Seat::Human => HUMAN_LABEL,
            Seat::Agent { label, .. } => label,
        }
    }
}

impl fmt::Debug for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::Human => write!(f, "Seat::Human"),
            Seat::Agent { label, .. } => write!(f, "Seat::Agent({})", label),
        }
    }
}

fn build_agent(kind: ProviderKind, model: &str, settings: &ProviderSettings) -> Seat {
    match kind {
        ProviderKind::OpenAi => match &settings.openai_api_key {
            Some(key) => Seat::agent(
                Arc::new(OpenAiClient::new(&settings.openai_base_url, key, model)),
                format!("OpenAI - {}", model),
            ),
            None => {
                warn!(model, "OPENAI_API_KEY is not set, seating offline provider");
                offline_seat()
            }
        },
        ProviderKind::Anthropic => match &settings.anthropic_api_key {
            Some(key) => Seat::agent(
                Arc::new(AnthropicClient::new(&settings.anthropic_base_url, key, model)),
                format!("Anthropic - {}", model),
            ),
            None => {
                warn!(model, "ANTHROPIC_API_KEY is not set, seating offline provider");
                offline_seat()
            }
        },
        ProviderKind::Offline => offline_seat(),
    }
}

fn offline_seat() -> Seat {
    Seat::agent(Arc::new(OfflineProvider::default()), OfflineProvider::LABEL)
}

/// Models available for a mixed table, given which keys are configured.
pub fn mixed_rotation(settings: &ProviderSettings) -> Vec<(ProviderKind, &'static str)> {
    let mut models = Vec::new();
    if settings.openai_api_key.is_some() {
        models.extend(OPENAI_MODELS.iter().map(|m| (ProviderKind::OpenAi, *m)));
    }
    if settings.anthropic_api_key.is_some() {
        models.extend(ANTHROPIC_MODELS.iter().map(|m| (ProviderKind::Anthropic, *m)));
    }
    models
}

/// Assigns a seat to every player id. Human ids never get a provider.
pub fn seat_players(
    player_ids: &[u32],
    humans: &BTreeSet<u32>,
    plan: &SeatingPlan,
    settings: &ProviderSettings,
) -> BTreeMap<u32, Seat> {
    let rotation = mixed_rotation(settings);
    let seats: BTreeMap<u32, Seat> = player_ids
        .iter()
        .enumerate()
        .map(|(position, id)| {
            let seat = if humans.contains(id) {
                Seat::Human
            } else {
                match plan {
                    SeatingPlan::Single { kind, model } => build_agent(*kind, model, settings),
                    SeatingPlan::Mixed if rotation.is_empty() => offline_seat(),
                    SeatingPlan::Mixed => {
                        let (kind, model) = rotation[position % rotation.len()];
                        build_agent(kind, model, settings)
                    }
                }
            };
            (*id, seat)
        })
        .collect();

    for (id, seat) in &seats {
        info!(player_id = id, seat = seat.label(), "seat assigned");
    }
    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(openai: bool, anthropic: bool) -> ProviderSettings {
        ProviderSettings {
            openai_api_key: openai.then(|| "sk-test".to_string()),
            openai_base_url: "http://localhost:1".to_string(),
            anthropic_api_key: anthropic.then(|| "ak-test".to_string()),
            anthropic_base_url: "http://localhost:2".to_string(),
        }
    }

    #[test]
    fn test_humans_are_never_seated_with_a_provider() {
        let humans = BTreeSet::from([2, 5]);
        let seats = seat_players(&[1, 2, 3, 4, 5, 6], &humans, &SeatingPlan::Mixed, &settings(true, true));
        assert!(seats[&2].is_human());
        assert!(seats[&5].is_human());
        assert_eq!(seats.values().filter(|s| s.is_human()).count(), 2);
        assert_eq!(seats[&5].label(), HUMAN_LABEL);
    }

    #[test]
    fn test_mixed_rotation_follows_roster_position() {
        let seats = seat_players(&[1, 2, 3, 4, 5, 6], &BTreeSet::new(), &SeatingPlan::Mixed, &settings(true, true));
        assert_eq!(seats[&1].label(), "OpenAI - gpt-4");
        assert_eq!(seats[&2].label(), "OpenAI - gpt-3.5-turbo");
        assert_eq!(seats[&3].label(), "Anthropic - claude-3-opus-20240229");
        assert_eq!(seats[&6].label(), "OpenAI - gpt-4");
    }

    #[test]
    fn test_missing_keys_fall_back_to_offline() {
        let seats = seat_players(&[1, 2], &BTreeSet::new(), &SeatingPlan::Mixed, &settings(false, false));
        assert_eq!(seats[&1].label(), OfflineProvider::LABEL);

        let single = SeatingPlan::Single {
            kind: ProviderKind::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
        };
        let seats = seat_players(&[1], &BTreeSet::new(), &single, &settings(true, false));
        assert_eq!(seats[&1].label(), OfflineProvider::LABEL);
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::Quota(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            ProviderError::Network(_)
        ));
    }

    #[tokio::test]
    async fn test_decider_times_out() {
        struct Slow;

        #[async_trait]
        impl DecisionProvider for Slow {
            async fn decide(&self, _request: DecisionRequest) -> Result<String, ProviderError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("Player 1".to_string())
            }
        }

        let provider = Slow;
        let decider = Decider::new(&provider, Duration::from_millis(20));
        let result = decider.ask(DecisionRequest::new("vote")).await;
        assert_eq!(result, Err(ProviderError::Timeout(Duration::from_millis(20))));
    }
}
