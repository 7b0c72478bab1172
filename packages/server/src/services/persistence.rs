//! JSON snapshots of a game on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::chat::{DiscussionEntry, HistoryFeed};
use crate::models::game::{DeathRecord, GamePhase, GameState, NightActions};
use crate::models::player::Player;
use crate::models::role::{Alignment, Faction};
use crate::models::rule::SetupError;
use crate::roles::RoleInstance;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("save file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to access save file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed save file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid saved game: {0}")]
    Invalid(String),
    #[error(transparent)]
    Seat(#[from] SetupError),
}

/// What one player privately knew when the game was saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMemory {
    #[serde(default)]
    pub history: HistoryFeed,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inspections: BTreeMap<u32, Alignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    pub day: u32,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub current_discussions: Vec<DiscussionEntry>,
    pub votes: BTreeMap<u32, u32>,
    pub night_actions: NightActions,
    pub last_night_deaths: Vec<DeathRecord>,
    pub game_over: bool,
    pub winner: Option<Faction>,
    pub log: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub memories: BTreeMap<u32, PlayerMemory>,
}

impl SavedGame {
    pub fn capture(state: &GameState) -> Self {
        let memories = state
            .roles
            .iter()
            .map(|(id, role)| {
                let inspections = match role {
                    RoleInstance::Seer(seer) => seer.inspections().clone(),
                    _ => BTreeMap::new(),
                };
                let memory = PlayerMemory {
                    history: role.persona().history.clone(),
                    inspections,
                };
                (*id, memory)
            })
            .filter(|(_, memory)| *memory != PlayerMemory::default())
            .collect();

        SavedGame {
            day: state.day,
            phase: state.phase,
            players: state.players.clone(),
            current_discussions: state.current_discussions.clone(),
            votes: state.votes.clone(),
            night_actions: state.night_actions.clone(),
            last_night_deaths: state.last_night_deaths.clone(),
            game_over: state.game_over,
            winner: state.winner,
            log: state.log.clone(),
            memories,
        }
    }

    fn validate(&self) -> Result<(), PersistenceError> {
        if self.players.is_empty() {
            return Err(PersistenceError::Invalid("no players".to_string()));
        }
        for (index, player) in self.players.iter().enumerate() {
            if player.player_id != index as u32 + 1 {
                return Err(PersistenceError::Invalid(format!(
                    "player ids must be contiguous from 1, found {} at position {}",
                    player.player_id,
                    index + 1
                )));
            }
        }
        if self.game_over != self.winner.is_some() {
            return Err(PersistenceError::Invalid(
                "game_over and winner disagree".to_string(),
            ));
        }
        if self.game_over != (self.phase == GamePhase::GameOver) {
            return Err(PersistenceError::Invalid(
                "game_over and phase disagree".to_string(),
            ));
        }
        let known = |id: u32| id >= 1 && id as usize <= self.players.len();
        let stray = self
            .votes
            .iter()
            .flat_map(|(voter, target)| [*voter, *target])
            .chain(
                self.night_actions
                    .iter()
                    .flat_map(|(actor, action)| std::iter::once(actor).chain(action.target())),
            )
            .find(|id| !known(*id));
        if let Some(id) = stray {
            return Err(PersistenceError::Invalid(format!(
                "buffer refers to unknown player {}",
                id
            )));
        }
        Ok(())
    }

    /// Rebuilds a live state. Role instances come from `players[].role`;
    /// each werewolf's teammates are the other werewolves still alive.
    pub fn into_state(self) -> Result<GameState, PersistenceError> {
        self.validate()?;
        let SavedGame {
            day,
            phase,
            players,
            current_discussions,
            votes,
            night_actions,
            last_night_deaths,
            game_over,
            winner,
            log,
            memories,
        } = self;

        let living_wolves: BTreeSet<u32> = players
            .iter()
            .filter(|p| p.is_alive && p.role.is_werewolf())
            .map(|p| p.player_id)
            .collect();

        let mut state = GameState::new(players);
        for player in &state.players {
            if player.role.is_werewolf() {
                let mut mates = living_wolves.clone();
                mates.remove(&player.player_id);
                state
                    .roles
                    .insert(player.player_id, RoleInstance::new(player, mates));
            }
        }
        for (id, memory) in memories {
            let Some(role) = state.roles.get_mut(&id) else {
                continue;
            };
            role.persona_mut().history = memory.history;
            if let RoleInstance::Seer(seer) = role {
                for (target, result) in memory.inspections {
                    seer.remember(target, result);
                }
            }
        }

        state.day = day;
        state.phase = phase;
        state.current_discussions = current_discussions;
        state.votes = votes;
        state.night_actions = night_actions;
        state.last_night_deaths = last_night_deaths;
        state.game_over = game_over;
        state.winner = winner;
        state.log = log;
        Ok(state)
    }
}

pub fn to_json(state: &GameState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(&SavedGame::capture(state))?)
}

pub fn from_json(json: &str) -> Result<GameState, PersistenceError> {
    let saved: SavedGame = serde_json::from_str(json)?;
    saved.into_state()
}

pub async fn save_game(state: &GameState, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, to_json(state)?).await?;
    info!(path = %path.display(), day = state.day, phase = %state.phase, "game saved");
    Ok(())
}

pub async fn load_game(path: impl AsRef<Path>) -> Result<GameState, PersistenceError> {
    let path = path.as_ref();
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PersistenceError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let state = from_json(&json)?;
    info!(path = %path.display(), day = state.day, phase = %state.phase, "game loaded");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::NightAction;
    use crate::roles::test_support::board;
    use crate::services::phase::advance_phase;

    fn mid_game() -> GameState {
        let mut state = board();
        state
            .record_night_action(
                3,
                NightAction::Check {
                    target: 4,
                    result: Alignment::Werewolf,
                },
            )
            .unwrap();
        if let Some(RoleInstance::Seer(seer)) = state.roles.get_mut(&3) {
            seer.remember(4, Alignment::Werewolf);
        }
        state.record_night_action(1, NightAction::Attack { target: 2 }).unwrap();
        advance_phase(&mut state).unwrap();
        state
            .record_discussion(3, "Player 4 is a werewolf.".to_string())
            .unwrap();
        state
    }

    #[test]
    fn test_round_trip_keeps_roster_and_log() {
        let state = mid_game();
        let restored = from_json(&to_json(&state).unwrap()).unwrap();

        assert_eq!(restored.players, state.players);
        assert_eq!(restored.phase, state.phase);
        assert_eq!(restored.day, state.day);
        assert_eq!(restored.log, state.log);
        assert_eq!(restored.current_discussions, state.current_discussions);
        assert_eq!(restored.last_night_deaths, state.last_night_deaths);
        assert_eq!(restored.roles[&3], state.roles[&3]);
        assert_eq!(
            restored.roles[&1].teammates().unwrap(),
            &BTreeSet::from([4])
        );
    }

    #[test]
    fn test_restore_drops_dead_wolves_from_teammates() {
        let mut state = board();
        state.player_mut(4).unwrap().is_alive = false;
        let restored = from_json(&to_json(&state).unwrap()).unwrap();
        assert!(restored.roles[&1].teammates().unwrap().is_empty());
    }

    #[test]
    fn test_schema_field_names() {
        let json: serde_json::Value =
            serde_json::from_str(&to_json(&mid_game()).unwrap()).unwrap();
        for field in [
            "day",
            "phase",
            "players",
            "current_discussions",
            "votes",
            "night_actions",
            "last_night_deaths",
            "game_over",
            "winner",
            "log",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["phase"], "day");
        assert_eq!(json["players"][0]["role"], "werewolf");
    }

    #[test]
    fn test_memories_are_optional() {
        let mut json: serde_json::Value =
            serde_json::from_str(&to_json(&mid_game()).unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("memories");
        let restored = from_json(&json.to_string()).unwrap();
        assert!(restored.roles[&3].persona().history.is_empty());
    }

    #[test]
    fn test_rejects_gapped_ids() {
        let mut json: serde_json::Value =
            serde_json::from_str(&to_json(&board()).unwrap()).unwrap();
        json["players"][2]["player_id"] = serde_json::json!(9);
        let err = from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, PersistenceError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = from_json("{\"day\": 1,").unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("game.json");
        let state = mid_game();
        save_game(&state, &path).await.unwrap();
        let restored = load_game(&path).await.unwrap();
        assert_eq!(restored.players, state.players);

        let missing = load_game(dir.path().join("missing.json")).await.unwrap_err();
        assert!(matches!(missing, PersistenceError::NotFound(_)));
    }
}
