use serde::{Deserialize, Serialize};

use super::chat::DiscussionEntry;
use super::game::{DeathRecord, GamePhase, GameState};
use super::role::{Faction, Role};

/// A player as one particular viewer sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: u32,
    pub name: String,
    pub alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Per-player snapshot handed to agents and human clients. Votes and
/// pending night actions never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub day: u32,
    pub phase: GamePhase,
    pub players: Vec<PublicPlayer>,
    pub current_discussions: Vec<DiscussionEntry>,
    pub last_night_deaths: Vec<DeathRecord>,
    pub game_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Faction>,
}

impl PlayerView {
    /// Snapshot for `viewer`, or `None` if no such player exists.
    ///
    /// A viewer always sees its own role. A living werewolf also sees the
    /// role of every other werewolf, dead or alive.
    pub fn for_player(state: &GameState, viewer: u32) -> Option<Self> {
        let me = state.player(viewer)?;
        let sees_pack = me.role.is_werewolf() && me.is_alive;
        Some(Self::build(state, |player| {
            player.player_id == viewer || (sees_pack && player.role.is_werewolf())
        }))
    }

    /// Snapshot without any hidden role, as an outside observer sees it.
    pub fn public(state: &GameState) -> Self {
        Self::build(state, |_| false)
    }

    fn build(state: &GameState, reveal: impl Fn(&super::player::Player) -> bool) -> Self {
        PlayerView {
            day: state.day,
            phase: state.phase,
            players: state
                .players
                .iter()
                .map(|p| PublicPlayer {
                    id: p.player_id,
                    name: p.name.clone(),
                    alive: p.is_alive,
                    role: reveal(p).then_some(p.role),
                })
                .collect(),
            current_discussions: state.current_discussions.clone(),
            last_night_deaths: state.last_night_deaths.clone(),
            game_over: state.game_over,
            winner: state.winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::test_support::board;

    fn revealed(view: &PlayerView) -> Vec<(u32, Role)> {
        view.players
            .iter()
            .filter_map(|p| p.role.map(|role| (p.id, role)))
            .collect()
    }

    #[test]
    fn test_werewolf_sees_teammate_role() {
        let state = board();
        let view = PlayerView::for_player(&state, 1).unwrap();
        assert_eq!(
            revealed(&view),
            vec![(1, Role::Werewolf), (4, Role::Werewolf)]
        );
    }

    #[test]
    fn test_villager_sees_only_own_role() {
        let state = board();
        let view = PlayerView::for_player(&state, 2).unwrap();
        assert_eq!(revealed(&view), vec![(2, Role::Villager)]);

        let json = serde_json::to_value(&view).unwrap();
        let players = json["players"].as_array().unwrap();
        assert!(players[0].get("role").is_none());
        assert_eq!(players[1]["role"], "villager");
        assert!(json.get("winner").is_none());
    }

    #[test]
    fn test_dead_werewolf_loses_pack_vision() {
        let mut state = board();
        state.player_mut(4).unwrap().is_alive = false;
        let view = PlayerView::for_player(&state, 4).unwrap();
        assert_eq!(revealed(&view), vec![(4, Role::Werewolf)]);
    }

    #[test]
    fn test_unknown_viewer_and_public_view() {
        let state = board();
        assert!(PlayerView::for_player(&state, 42).is_none());
        let public = PlayerView::public(&state);
        assert!(revealed(&public).is_empty());
        assert_eq!(public.phase, GamePhase::Night);
        assert_eq!(public.day, 1);
    }
}
