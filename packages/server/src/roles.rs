//! Role capability set.
//!
//! Each role turns a player-scoped view of the game plus a decision
//! provider into a night action, a discussion statement, or a ballot.
//! Roles never touch the canonical `GameState`; the session records
//! whatever they return through the same validated entry points that
//! human players use.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use rand::rngs::StdRng;
use tracing::debug;

use crate::models::chat::HistoryFeed;
use crate::models::game::NightAction;
use crate::models::player::Player;
use crate::models::role::Role;
use crate::models::view::PlayerView;
use crate::providers::{Decider, DecisionRequest};
use crate::services::resolver;

pub mod seer;
pub mod villager;
pub mod werewolf;

pub use seer::Seer;
pub use villager::Villager;
pub use werewolf::Werewolf;

/// History entries included in night and vote prompts.
pub const DECISION_HISTORY_WINDOW: usize = 10;
/// History entries included in discussion prompts.
pub const DISCUSSION_HISTORY_WINDOW: usize = 15;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DECISION_MAX_TOKENS: u32 = 500;
pub const DISCUSSION_MAX_TOKENS: u32 = 300;

/// Identity and private memory shared by every role.
#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    pub player_id: u32,
    pub name: String,
    pub history: HistoryFeed,
}

impl Persona {
    pub fn new(player_id: u32, name: impl Into<String>) -> Self {
        Persona {
            player_id,
            name: name.into(),
            history: HistoryFeed::new(),
        }
    }
}

/// Everything a role may look at while deciding.
///
/// `view` is the filtered snapshot for this player. `legal_targets` is the
/// target set computed by the session for the decision at hand. `roster`
/// is the canonical roster; only the seer's inspection reads a hidden role
/// from it.
pub struct Table<'a> {
    pub view: &'a PlayerView,
    pub legal_targets: &'a [u32],
    pub roster: &'a [Player],
}

impl Table<'_> {
    pub fn name_of(&self, player_id: u32) -> String {
        self.view
            .players
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {}", player_id))
    }

    pub fn living_count(&self) -> usize {
        self.view.players.iter().filter(|p| p.alive).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoleInstance {
    Villager(Villager),
    Seer(Seer),
    Werewolf(Werewolf),
}

impl RoleInstance {
    pub fn new(player: &Player, teammates: BTreeSet<u32>) -> Self {
        let persona = Persona::new(player.player_id, player.name.clone());
        match player.role {
            Role::Villager => RoleInstance::Villager(Villager::new(persona)),
            Role::Seer => RoleInstance::Seer(Seer::new(persona)),
            Role::Werewolf => RoleInstance::Werewolf(Werewolf::new(persona, teammates)),
        }
    }

    /// Role instances for a freshly dealt roster. Each werewolf's teammate
    /// set is every other werewolf, fixed from here on.
    pub fn for_roster(players: &[Player]) -> BTreeMap<u32, RoleInstance> {
        let werewolves: BTreeSet<u32> = players
            .iter()
            .filter(|p| p.role.is_werewolf())
            .map(|p| p.player_id)
            .collect();
        players
            .iter()
            .map(|player| {
                let mut mates = werewolves.clone();
                mates.remove(&player.player_id);
                (player.player_id, RoleInstance::new(player, mates))
            })
            .collect()
    }

    pub fn role(&self) -> Role {
        match self {
            RoleInstance::Villager(_) => Role::Villager,
            RoleInstance::Seer(_) => Role::Seer,
            RoleInstance::Werewolf(_) => Role::Werewolf,
        }
    }

    pub fn persona(&self) -> &Persona {
        match self {
            RoleInstance::Villager(v) => &v.persona,
            RoleInstance::Seer(s) => &s.persona,
            RoleInstance::Werewolf(w) => &w.persona,
        }
    }

    pub fn persona_mut(&mut self) -> &mut Persona {
        match self {
            RoleInstance::Villager(v) => &mut v.persona,
            RoleInstance::Seer(s) => &mut s.persona,
            RoleInstance::Werewolf(w) => &mut w.persona,
        }
    }

    pub fn teammates(&self) -> Option<&BTreeSet<u32>> {
        match self {
            RoleInstance::Werewolf(w) => Some(w.teammates()),
            _ => None,
        }
    }

    pub async fn night_action(
        &mut self,
        table: &Table<'_>,
        decider: &Decider<'_>,
        rng: &mut StdRng,
    ) -> NightAction {
        match self {
            RoleInstance::Villager(_) => NightAction::wait(),
            RoleInstance::Seer(seer) => seer.night_action(table, decider, rng).await,
            RoleInstance::Werewolf(wolf) => wolf.night_action(table, decider, rng).await,
        }
    }

    pub async fn discussion(&self, table: &Table<'_>, decider: &Decider<'_>) -> String {
        let request = match self {
            RoleInstance::Villager(v) => v.discussion_request(table),
            RoleInstance::Seer(s) => s.discussion_request(table),
            RoleInstance::Werewolf(w) => w.discussion_request(table),
        };
        let persona = self.persona();
        match decider.ask(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => silent_statement(persona),
            Err(error) => {
                debug!(player_id = persona.player_id, %error, "discussion fell back to silence");
                silent_statement(persona)
            }
        }
    }

    pub async fn vote(
        &self,
        table: &Table<'_>,
        decider: &Decider<'_>,
        rng: &mut StdRng,
    ) -> Option<u32> {
        match self {
            RoleInstance::Werewolf(wolf) => wolf.vote(table, decider, rng).await,
            other => {
                let system = format!(
                    "You are {} playing Werewolf as a {}. Decide who to vote out.",
                    other.persona().name,
                    other.role()
                );
                default_vote(other.persona(), system, table, decider, rng).await
            }
        }
    }
}

fn silent_statement(persona: &Persona) -> String {
    format!("{} stays silent for now.", persona.name)
}

/// Shared ballot: ask for a target among the legal set, fall back to a
/// random legal target, abstain only when nobody can be voted for.
pub async fn default_vote(
    persona: &Persona,
    system: String,
    table: &Table<'_>,
    decider: &Decider<'_>,
    rng: &mut StdRng,
) -> Option<u32> {
    if table.legal_targets.is_empty() {
        return None;
    }
    let prompt = vote_prompt(persona, table);
    let response = decider
        .ask(DecisionRequest::new(prompt).with_system(system))
        .await;
    let resolution = resolver::resolve_target(response, table.legal_targets, rng);
    debug!(player_id = persona.player_id, ?resolution, "vote resolved");
    resolution.target()
}

fn vote_prompt(persona: &Persona, table: &Table<'_>) -> String {
    let mut prompt = format!("It is day {} of the Werewolf game and it is time to vote.\n\n", table.view.day);
    push_history(&mut prompt, &persona.history, DECISION_HISTORY_WINDOW);
    push_discussion(&mut prompt, table);
    prompt.push_str("\nVote for the player you believe is most likely a werewolf. Candidates:\n");
    push_candidates(&mut prompt, table, table.legal_targets);
    prompt.push_str("\nExplain briefly, then answer in the form 'I vote for Player X', where X is the player id.");
    prompt
}

pub(crate) fn push_history(prompt: &mut String, history: &HistoryFeed, window: usize) {
    prompt.push_str("Game history:\n");
    for event in history.recent(window) {
        let _ = writeln!(prompt, "- {}", event);
    }
}

pub(crate) fn push_discussion(prompt: &mut String, table: &Table<'_>) {
    if table.view.current_discussions.is_empty() {
        return;
    }
    prompt.push_str("\nToday's discussion:\n");
    for entry in &table.view.current_discussions {
        let _ = writeln!(
            prompt,
            "- {} (Player {}) said: \"{}\"",
            entry.player_name, entry.player_id, entry.content
        );
    }
}

pub(crate) fn push_candidates(prompt: &mut String, table: &Table<'_>, ids: &[u32]) {
    for id in ids {
        let _ = writeln!(prompt, "- Player {} ({})", id, table.name_of(*id));
    }
}

pub(crate) fn push_situation(prompt: &mut String, table: &Table<'_>) {
    prompt.push_str("Current situation:\n");
    let _ = writeln!(prompt, "- Living players: {}", table.living_count());
    if table.view.last_night_deaths.is_empty() {
        prompt.push_str("- Died last night: nobody\n");
    } else {
        for death in &table.view.last_night_deaths {
            let _ = writeln!(
                prompt,
                "- Died last night: Player {} ({}), who was a {}",
                death.player_id, death.name, death.role
            );
        }
    }
}

/// Shared skeleton of a discussion prompt; `extra` carries role-private notes.
pub(crate) fn discussion_prompt(
    persona: &Persona,
    table: &Table<'_>,
    extra: &str,
    closing: &str,
) -> String {
    let mut prompt = format!(
        "It is day {} of the Werewolf game, during the open discussion.\n\n",
        table.view.day
    );
    push_situation(&mut prompt, table);
    prompt.push_str(extra);
    prompt.push('\n');
    push_history(&mut prompt, &persona.history, DISCUSSION_HISTORY_WINDOW);
    push_discussion(&mut prompt, table);
    prompt.push('\n');
    prompt.push_str(closing);
    prompt
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::game::TargetPurpose;
    use crate::providers::{MockDecisionProvider, ProviderError};
    use rand::SeedableRng;
    use std::time::Duration;

    #[tokio::test]
    async fn test_vote_parses_first_reference() {
        let mut state = board();
        state.enter_day();
        state.enter_vote();
        let (view, legal) = view_and_targets(&state, 2, TargetPurpose::Vote);
        let table = Table {
            view: &view,
            legal_targets: &legal,
            roster: &state.players,
        };

        let mut provider = MockDecisionProvider::new();
        provider
            .expect_decide()
            .times(1)
            .returning(|_| Ok("Player 4 has been quiet. I vote for Player 4, not Player 5.".to_string()));
        let decider = Decider::new(&provider, Duration::from_secs(5));
        let mut rng = StdRng::seed_from_u64(1);

        let vote = state.roles[&2].vote(&table, &decider, &mut rng).await;
        assert_eq!(vote, Some(4));
    }

    #[tokio::test]
    async fn test_vote_falls_back_when_provider_fails() {
        let mut state = board();
        state.enter_day();
        state.enter_vote();
        let (view, legal) = view_and_targets(&state, 2, TargetPurpose::Vote);
        let table = Table {
            view: &view,
            legal_targets: &legal,
            roster: &state.players,
        };

        let mut provider = MockDecisionProvider::new();
        provider
            .expect_decide()
            .returning(|_| Err(ProviderError::Network("connection reset".to_string())));
        let decider = Decider::new(&provider, Duration::from_secs(5));
        let mut rng = StdRng::seed_from_u64(3);

        let vote = state.roles[&2].vote(&table, &decider, &mut rng).await;
        assert!(vote.map_or(false, |id| legal.contains(&id)));
    }

    #[tokio::test]
    async fn test_vote_abstains_without_candidates() {
        let state = board();
        let view = PlayerView::for_player(&state, 2).unwrap();
        let table = Table {
            view: &view,
            legal_targets: &[],
            roster: &state.players,
        };
        let mut provider = MockDecisionProvider::new();
        provider.expect_decide().never();
        let decider = Decider::new(&provider, Duration::from_secs(5));
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(state.roles[&2].vote(&table, &decider, &mut rng).await, None);
    }

    #[tokio::test]
    async fn test_discussion_falls_back_to_silence() {
        let mut state = board();
        state.enter_day();
        let (view, legal) = view_and_targets(&state, 5, TargetPurpose::Vote);
        let table = Table {
            view: &view,
            legal_targets: &legal,
            roster: &state.players,
        };
        let mut provider = MockDecisionProvider::new();
        provider
            .expect_decide()
            .returning(|_| Err(ProviderError::Quota("rate limited".to_string())));
        let decider = Decider::new(&provider, Duration::from_secs(5));

        let text = state.roles[&5].discussion(&table, &decider).await;
        assert_eq!(text, "Player 5 stays silent for now.");
    }

    #[tokio::test]
    async fn test_villager_waits_at_night() {
        let mut state = board();
        let (view, legal) = view_and_targets(&state, 2, TargetPurpose::Vote);
        let table = Table {
            view: &view,
            legal_targets: &legal,
            roster: &state.players,
        };
        let mut provider = MockDecisionProvider::new();
        provider.expect_decide().never();
        let decider = Decider::new(&provider, Duration::from_secs(5));
        let mut rng = StdRng::seed_from_u64(3);

        let role = state.roles.get_mut(&2).unwrap();
        let action = role.night_action(&table, &decider, &mut rng).await;
        assert_eq!(action, NightAction::wait());
    }

    #[test]
    fn test_teammates_fixed_at_setup() {
        let state = board();
        let mates = state.roles[&1].teammates().unwrap();
        assert_eq!(mates.iter().copied().collect::<Vec<_>>(), vec![4]);
        assert!(state.roles[&2].teammates().is_none());
    }
}
