use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::models::config::GameConfig;
use crate::services::session_manager::SessionManager;
use crate::utils::config::{ProviderSettings, CONFIG};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub config: Arc<GameConfig>,
    pub providers: Arc<ProviderSettings>,
    rng_stream: Arc<AtomicU64>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(GameConfig::from_env(), CONFIG.clone())
    }

    pub fn with_config(config: GameConfig, providers: ProviderSettings) -> Self {
        AppState {
            sessions: SessionManager::new(),
            config: Arc::new(config),
            providers: Arc::new(providers),
            rng_stream: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Rng for the next session; a configured seed gives each session its own stream.
    pub fn next_rng(&self) -> StdRng {
        let stream = self.rng_stream.fetch_add(1, Ordering::Relaxed);
        self.config.make_rng(stream)
    }
}

