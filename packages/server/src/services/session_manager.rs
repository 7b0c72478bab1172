use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::session::GameSession;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
}

pub type SharedSession = Arc<Mutex<GameSession>>;

/// Owns every live session. Each session sits behind its own mutex so one
/// game never waits on another.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: GameSession) -> SharedSession {
        let id = session.id().to_string();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id.clone(), shared.clone());
        info!(session_id = %id, "session registered");
        shared
    }

    pub async fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn remove(&self, id: &str) -> Result<SharedSession, SessionError> {
        let removed = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        info!(session_id = %id, "session ended");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for longer than `ttl`. Sessions busy running a
    /// phase are skipped this round.
    pub async fn expire_idle(&self, ttl: Duration) -> Vec<String> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter_map(|(id, session)| {
                let session = session.try_lock().ok()?;
                (now - session.last_active() > ttl).then(|| id.clone())
            })
            .collect();
        for id in &expired {
            sessions.remove(id);
            info!(session_id = %id, "idle session expired");
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::OfflineProvider;
    use crate::roles::test_support::board;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn session(id: &str) -> GameSession {
        GameSession::with_provider(
            id,
            board(),
            Arc::new(OfflineProvider),
            &BTreeSet::new(),
            StdRng::seed_from_u64(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let manager = SessionManager::new();
        manager.insert(session("b")).await;
        manager.insert(session("a")).await;
        assert_eq!(manager.list().await, vec!["a", "b"]);

        let shared = manager.get("a").await.unwrap();
        assert_eq!(shared.lock().await.id(), "a");

        manager.remove("a").await.unwrap();
        assert_eq!(manager.get("a").await.unwrap_err(), SessionError::NotFound("a".to_string()));
        assert!(manager.remove("a").await.is_err());
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_expire_idle() {
        let manager = SessionManager::new();
        manager.insert(session("old")).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.insert(session("fresh")).await;

        let expired = manager.expire_idle(Duration::from_millis(20)).await;
        assert_eq!(expired, vec!["old".to_string()]);
        assert_eq!(manager.list().await, vec!["fresh"]);
    }
}
