use serde::Serialize;

use super::game::{GamePhase, GameState};
use super::role::{Faction, Role};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatSummary {
    pub id: u32,
    pub name: String,
    pub role: Role,
    pub alive: bool,
    /// Model seated at this player, or "human".
    pub model: String,
}

/// Spectator view of a game: every role is shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    pub day: u32,
    pub phase: GamePhase,
    pub alive_werewolves: usize,
    pub alive_villagers: usize,
    pub game_over: bool,
    pub winner: Option<Faction>,
    pub players: Vec<SeatSummary>,
}

impl GameSummary {
    pub fn from_state(state: &GameState, model_of: impl Fn(u32) -> String) -> Self {
        let living = state.players.iter().filter(|p| p.is_alive);
        let alive_werewolves = living.clone().filter(|p| p.role.is_werewolf()).count();
        let alive_villagers = living.count() - alive_werewolves;

        GameSummary {
            day: state.day,
            phase: state.phase,
            alive_werewolves,
            alive_villagers,
            game_over: state.game_over,
            winner: state.winner,
            players: state
                .players
                .iter()
                .map(|p| SeatSummary {
                    id: p.player_id,
                    name: p.name.clone(),
                    role: p.role,
                    alive: p.is_alive,
                    model: model_of(p.player_id),
                })
                .collect(),
        }
    }
}
