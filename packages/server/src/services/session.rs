//! One running game: canonical state, seats and the per-phase pipelines.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::models::game::{ActionError, GamePhase, GameState, NightAction, TargetPurpose};
use crate::models::role::Role;
use crate::models::rule::{GameRules, SetupError};
use crate::models::summary::GameSummary;
use crate::models::view::PlayerView;
use crate::providers::{seat_players, Decider, DecisionProvider, Seat, SeatingPlan};
use crate::roles::{RoleInstance, Table};
use crate::utils::config::ProviderSettings;

use super::persistence::{self, PersistenceError};
use super::phase;

/// Everything needed to start a new game.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub rules: GameRules,
    pub humans: BTreeSet<u32>,
    pub seating: SeatingPlan,
    pub decision_timeout: Duration,
}

#[derive(Debug)]
pub struct GameSession {
    id: String,
    state: GameState,
    seats: BTreeMap<u32, Seat>,
    rng: StdRng,
    decision_timeout: Duration,
    last_active: DateTime<Utc>,
}

fn night_purpose(role: Role) -> Option<TargetPurpose> {
    match role {
        Role::Werewolf => Some(TargetPurpose::Attack),
        Role::Seer => Some(TargetPurpose::Inspect),
        Role::Villager => None,
    }
}

/// Human seats must name players `1..=player_count`.
fn check_human_seats(humans: &BTreeSet<u32>, player_count: usize) -> Result<(), SetupError> {
    match humans
        .iter()
        .find(|id| **id == 0 || **id as usize > player_count)
    {
        Some(seat) => Err(SetupError::UnknownSeat(*seat)),
        None => Ok(()),
    }
}

impl GameSession {
    /// Deals roles, enters the first night and seats providers.
    pub fn create(
        id: impl Into<String>,
        setup: &SessionSetup,
        settings: &ProviderSettings,
        mut rng: StdRng,
    ) -> Result<Self, SetupError> {
        setup.rules.validate()?;
        check_human_seats(&setup.humans, setup.rules.player_count)?;
        let state = GameState::setup(&setup.rules, &mut rng)?;
        let ids: Vec<u32> = state.players.iter().map(|p| p.player_id).collect();
        let seats = seat_players(&ids, &setup.humans, &setup.seating, settings);
        let session = Self::with_seats(id, state, seats, rng, setup.decision_timeout);
        info!(session_id = %session.id, players = ids.len(), humans = setup.humans.len(), "session created");
        Ok(session)
    }

    pub fn with_seats(
        id: impl Into<String>,
        state: GameState,
        seats: BTreeMap<u32, Seat>,
        rng: StdRng,
        decision_timeout: Duration,
    ) -> Self {
        GameSession {
            id: id.into(),
            state,
            seats,
            rng,
            decision_timeout,
            last_active: Utc::now(),
        }
    }

    /// Every player driven by the same provider. Handy for scripted play.
    pub fn with_provider(
        id: impl Into<String>,
        state: GameState,
        provider: Arc<dyn DecisionProvider>,
        humans: &BTreeSet<u32>,
        rng: StdRng,
        decision_timeout: Duration,
    ) -> Self {
        let seats = state
            .players
            .iter()
            .map(|p| {
                let seat = if humans.contains(&p.player_id) {
                    Seat::Human
                } else {
                    Seat::agent(provider.clone(), "Scripted")
                };
                (p.player_id, seat)
            })
            .collect();
        Self::with_seats(id, state, seats, rng, decision_timeout)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn seat(&self, player_id: u32) -> Option<&Seat> {
        self.seats.get(&player_id)
    }

    pub fn is_human(&self, player_id: u32) -> bool {
        self.seats.get(&player_id).map_or(false, Seat::is_human)
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn view_for(&self, player_id: u32) -> Option<PlayerView> {
        PlayerView::for_player(&self.state, player_id)
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary::from_state(&self.state, |id| {
            self.seats
                .get(&id)
                .map(|seat| seat.label().to_string())
                .unwrap_or_else(|| "Unassigned".to_string())
        })
    }

    /// Living players driven by a provider, ascending by id.
    fn agent_turns(&self) -> Vec<(u32, Arc<dyn DecisionProvider>)> {
        self.state
            .living_ids()
            .into_iter()
            .filter_map(|id| match self.seats.get(&id) {
                Some(Seat::Agent { provider, .. }) => Some((id, provider.clone())),
                _ => None,
            })
            .collect()
    }

    fn ensure_phase(&self, expected: GamePhase) -> Result<(), ActionError> {
        if self.state.game_over {
            return Err(ActionError::GameOver);
        }
        if self.state.phase != expected {
            return Err(ActionError::WrongPhase {
                expected,
                actual: self.state.phase,
            });
        }
        Ok(())
    }

    /// Night pipeline. Each agent acts in id order; players that already
    /// submitted keep their action.
    pub async fn run_night_actions(&mut self) -> Result<(), ActionError> {
        self.ensure_phase(GamePhase::Night)?;
        let turns = self.agent_turns();
        let GameSession {
            state,
            rng,
            decision_timeout,
            ..
        } = &mut *self;

        for (id, provider) in turns {
            if state.night_actions.contains(id) {
                continue;
            }
            let Some(view) = PlayerView::for_player(state, id) else {
                continue;
            };
            let legal = match state.player(id).and_then(|p| night_purpose(p.role)) {
                Some(purpose) => state.legal_targets(id, purpose),
                None => Vec::new(),
            };
            let decider = Decider::new(provider.as_ref(), *decision_timeout);
            let table = Table {
                view: &view,
                legal_targets: &legal,
                roster: &state.players,
            };
            let Some(role) = state.roles.get_mut(&id) else {
                continue;
            };
            let action = role.night_action(&table, &decider, rng).await;
            debug!(player_id = id, ?action, "night action chosen");
            if let Err(error) = state.record_night_action(id, action) {
                warn!(player_id = id, %error, "night action rejected, waiting instead");
                state.record_night_action(id, NightAction::wait_with(error.to_string()))?;
            }
        }
        self.touch();
        Ok(())
    }

    /// Discussion pipeline. Later speakers see every statement made before them.
    pub async fn run_discussion(&mut self) -> Result<(), ActionError> {
        self.ensure_phase(GamePhase::Day)?;
        let turns = self.agent_turns();
        let GameSession {
            state,
            decision_timeout,
            ..
        } = &mut *self;

        for (id, provider) in turns {
            if state.has_spoken(id) {
                continue;
            }
            let Some(view) = PlayerView::for_player(state, id) else {
                continue;
            };
            let legal = state.legal_targets(id, TargetPurpose::Vote);
            let decider = Decider::new(provider.as_ref(), *decision_timeout);
            let table = Table {
                view: &view,
                legal_targets: &legal,
                roster: &state.players,
            };
            let Some(role) = state.roles.get(&id) else {
                continue;
            };
            let statement = role.discussion(&table, &decider).await;
            state.record_discussion(id, statement)?;
        }
        self.touch();
        Ok(())
    }

    /// Vote pipeline. Agents that find no candidate abstain.
    pub async fn run_votes(&mut self) -> Result<(), ActionError> {
        self.ensure_phase(GamePhase::Vote)?;
        let turns = self.agent_turns();
        let GameSession {
            state,
            rng,
            decision_timeout,
            ..
        } = &mut *self;

        for (id, provider) in turns {
            if state.votes.contains_key(&id) {
                continue;
            }
            let Some(view) = PlayerView::for_player(state, id) else {
                continue;
            };
            let legal = state.legal_targets(id, TargetPurpose::Vote);
            let decider = Decider::new(provider.as_ref(), *decision_timeout);
            let table = Table {
                view: &view,
                legal_targets: &legal,
                roster: &state.players,
            };
            let Some(role) = state.roles.get(&id) else {
                continue;
            };
            match role.vote(&table, &decider, rng).await {
                Some(target) => {
                    if let Err(error) = state.record_vote(id, target) {
                        warn!(player_id = id, target, %error, "vote rejected, abstaining");
                    }
                }
                None => debug!(player_id = id, "abstained"),
            }
        }
        self.touch();
        Ok(())
    }

    /// Runs the agent pipeline of the current phase.
    pub async fn run_phase(&mut self) -> Result<(), ActionError> {
        match self.state.phase {
            GamePhase::Setup => Ok(()),
            GamePhase::Night => self.run_night_actions().await,
            GamePhase::Day => self.run_discussion().await,
            GamePhase::Vote => self.run_votes().await,
            GamePhase::GameOver => Err(ActionError::GameOver),
        }
    }

    pub fn advance_phase(&mut self) -> Result<GamePhase, ActionError> {
        let from = self.state.phase;
        let to = phase::advance_phase(&mut self.state)?;
        info!(session_id = %self.id, day = self.state.day, %from, %to, "phase advanced");
        self.touch();
        Ok(to)
    }

    /// Runs the current phase, then advances.
    pub async fn step(&mut self) -> Result<GamePhase, ActionError> {
        self.run_phase().await?;
        self.advance_phase()
    }

    /// Steps until the game ends or `max_steps` is reached.
    pub async fn play_to_end(&mut self, max_steps: usize) -> Result<GamePhase, ActionError> {
        for _ in 0..max_steps {
            if self.state.game_over {
                break;
            }
            self.step().await?;
        }
        Ok(self.state.phase)
    }

    fn require_human(&self, player_id: u32) -> Result<(), ActionError> {
        match self.seats.get(&player_id) {
            Some(Seat::Human) => Ok(()),
            Some(_) => Err(ActionError::NotHumanControlled(player_id)),
            None => Err(ActionError::UnknownPlayer(player_id)),
        }
    }

    fn reject(&self, player_id: u32, error: ActionError) -> ActionError {
        warn!(session_id = %self.id, player_id, %error, "submission rejected");
        error
    }

    pub fn submit_vote(&mut self, voter: u32, target: u32) -> Result<(), ActionError> {
        self.require_human(voter)
            .and_then(|_| self.state.record_vote(voter, target))
            .map_err(|e| self.reject(voter, e))?;
        self.touch();
        Ok(())
    }

    /// Night action from a human seat. Werewolves attack `target`, the seer
    /// inspects it, and `None` (or a villager) waits.
    pub fn submit_night_action(
        &mut self,
        player_id: u32,
        target: Option<u32>,
    ) -> Result<NightAction, ActionError> {
        self.require_human(player_id)
            .map_err(|e| self.reject(player_id, e))?;
        let role = self
            .state
            .player(player_id)
            .map(|p| p.role)
            .ok_or(ActionError::UnknownPlayer(player_id))?;

        let action = match (role, target) {
            (_, None) | (Role::Villager, _) => NightAction::wait(),
            (Role::Werewolf, Some(target)) => NightAction::Attack { target },
            (Role::Seer, Some(target)) => {
                let result = self
                    .state
                    .player(target)
                    .map(|p| p.role.alignment())
                    .ok_or_else(|| ActionError::InvalidTarget {
                        target,
                        reason: "no such player".to_string(),
                    })
                    .map_err(|e| self.reject(player_id, e))?;
                NightAction::Check { target, result }
            }
        };

        self.state
            .record_night_action(player_id, action.clone())
            .map_err(|e| self.reject(player_id, e))?;
        if let (NightAction::Check { target, result }, Some(RoleInstance::Seer(seer))) =
            (&action, self.state.roles.get_mut(&player_id))
        {
            seer.remember(*target, *result);
        }
        self.touch();
        Ok(action)
    }

    pub fn submit_discussion(&mut self, speaker: u32, content: String) -> Result<(), ActionError> {
        self.require_human(speaker)
            .and_then(|_| self.state.record_discussion(speaker, content))
            .map_err(|e| self.reject(speaker, e))?;
        self.touch();
        Ok(())
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        persistence::save_game(&self.state, path).await
    }

    /// Loads a saved game and seats it. Nothing is built if the load fails.
    pub async fn restore(
        id: impl Into<String>,
        path: impl AsRef<Path>,
        humans: &BTreeSet<u32>,
        seating: &SeatingPlan,
        settings: &ProviderSettings,
        rng: StdRng,
        decision_timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let state = persistence::load_game(path).await?;
        check_human_seats(humans, state.players.len())?;
        let ids: Vec<u32> = state.players.iter().map(|p| p.player_id).collect();
        let seats = seat_players(&ids, humans, seating, settings);
        Ok(Self::with_seats(id, state, seats, rng, decision_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Alignment;
    use crate::providers::ScriptedProvider;
    use crate::roles::test_support::board;
    use rand::SeedableRng;

    fn session(provider: Arc<ScriptedProvider>, humans: &[u32]) -> GameSession {
        GameSession::with_provider(
            "test",
            board(),
            provider,
            &humans.iter().copied().collect::<BTreeSet<u32>>(),
            StdRng::seed_from_u64(17),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_night_pipeline_queries_alpha_and_seer_only() {
        // Agents in order: 1 (alpha wolf), 2, 3 (seer), 4, 5, 6.
        let provider = Arc::new(ScriptedProvider::new(["I attack Player 6", "I inspect Player 4"]));
        let mut session = session(provider.clone(), &[]);
        session.run_night_actions().await.unwrap();

        assert_eq!(provider.request_count(), 2);
        let actions = &session.state().night_actions;
        assert_eq!(actions.get(1), Some(&NightAction::Attack { target: 6 }));
        assert_eq!(
            actions.get(3),
            Some(&NightAction::Check {
                target: 4,
                result: Alignment::Werewolf
            })
        );
        assert_eq!(actions.get(4), Some(&NightAction::wait()));
        assert_eq!(actions.len(), 6);
    }

    #[tokio::test]
    async fn test_human_seats_are_skipped() {
        let provider = Arc::new(ScriptedProvider::new(["I inspect Player 1"]));
        let mut session = session(provider.clone(), &[1]);
        session.run_night_actions().await.unwrap();
        // The human alpha has not acted, the seer has.
        assert!(!session.state().night_actions.contains(1));
        assert_eq!(provider.request_count(), 1);

        session.submit_night_action(1, Some(2)).unwrap();
        assert_eq!(
            session.state().night_actions.attacks().collect::<Vec<_>>(),
            vec![(1, 2)]
        );
    }

    #[tokio::test]
    async fn test_invalid_human_submission_leaves_state() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut session = session(provider, &[1, 3]);

        let err = session.submit_night_action(1, Some(4)).unwrap_err();
        assert!(matches!(err, ActionError::InvalidTarget { target: 4, .. }));
        assert!(session.state().night_actions.is_empty());

        let err = session.submit_night_action(2, Some(4)).unwrap_err();
        assert_eq!(err, ActionError::NotHumanControlled(2));

        let err = session.submit_vote(3, 1).unwrap_err();
        assert!(matches!(err, ActionError::WrongPhase { .. }));
        assert!(session.state().votes.is_empty());

        let action = session.submit_night_action(3, Some(4)).unwrap();
        assert_eq!(
            action,
            NightAction::Check {
                target: 4,
                result: Alignment::Werewolf
            }
        );
        match &session.state().roles[&3] {
            RoleInstance::Seer(seer) => assert_eq!(seer.inspections().len(), 1),
            _ => panic!("player 3 should be the seer"),
        }
    }

    #[tokio::test]
    async fn test_human_seer_cannot_reinspect_same_night() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut session = session(provider, &[3]);

        session.submit_night_action(3, Some(4)).unwrap();
        for target in [1, 2, 5, 6] {
            let err = session.submit_night_action(3, Some(target)).unwrap_err();
            assert_eq!(err, ActionError::AlreadyInspected(3));
        }
        let err = session.submit_night_action(3, None).unwrap_err();
        assert_eq!(err, ActionError::AlreadyInspected(3));

        assert_eq!(
            session.state().night_actions.get(3),
            Some(&NightAction::Check {
                target: 4,
                result: Alignment::Werewolf
            })
        );
        match &session.state().roles[&3] {
            RoleInstance::Seer(seer) => {
                assert_eq!(seer.inspections().keys().copied().collect::<Vec<_>>(), vec![4])
            }
            _ => panic!("player 3 should be the seer"),
        }
    }

    #[tokio::test]
    async fn test_discussion_sees_earlier_speakers() {
        let provider = Arc::new(ScriptedProvider::new([
            "Player 1 here, I suspect Player 5.",
            "I agree about Player 5.",
        ]));
        let mut session = session(provider.clone(), &[]);
        session.advance_phase().unwrap();
        session.run_discussion().await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 6);
        assert!(!requests[0].prompt.contains("I suspect Player 5"));
        assert!(requests[1].prompt.contains("I suspect Player 5"));
        assert!(requests[5].prompt.contains("I agree about Player 5"));
        let speakers: Vec<u32> = session
            .state()
            .current_discussions
            .iter()
            .map(|e| e.player_id)
            .collect();
        assert_eq!(speakers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_provider_errors_still_produce_votes() {
        let provider = Arc::new(ScriptedProvider::default());
        for _ in 0..6 {
            provider.push_error(crate::providers::ProviderError::Network("down".to_string()));
        }
        let mut session = session(provider, &[]);
        session.advance_phase().unwrap();
        session.advance_phase().unwrap();
        session.run_votes().await.unwrap();
        assert_eq!(session.state().votes.len(), 6);
        for (voter, target) in &session.state().votes {
            assert_ne!(voter, target);
        }
    }

    #[tokio::test]
    async fn test_scripted_game_reaches_game_over() {
        let provider = Arc::new(ScriptedProvider::default().with_fallback("no idea"));
        let mut session = session(provider, &[]);
        let phase = session.play_to_end(200).await.unwrap();
        assert_eq!(phase, GamePhase::GameOver);
        assert!(session.state().winner.is_some());
        assert_eq!(session.run_phase().await, Err(ActionError::GameOver));
        assert_eq!(session.summary().phase, GamePhase::GameOver);
    }
}
