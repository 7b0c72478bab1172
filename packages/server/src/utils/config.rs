use once_cell::sync::Lazy;
use std::env;

use crate::providers::anthropic::DEFAULT_ANTHROPIC_BASE_URL;
use crate::providers::openai::DEFAULT_OPENAI_BASE_URL;

pub static CONFIG: Lazy<ProviderSettings> = Lazy::new(ProviderSettings::from_env);

/// Chat API credentials. A missing key seats the offline provider instead.
#[derive(Clone)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            anthropic_base_url: non_empty("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
        }
    }

    /// Settings with no keys at all; every AI seat plays offline.
    pub fn offline() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_api_key: None,
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
        }
    }
}
