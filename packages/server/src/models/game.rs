use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use super::chat::DiscussionEntry;
use super::player::Player;
use super::role::{Alignment, Faction, Role};
use super::rule::{GameRules, SetupError};
use crate::roles::RoleInstance;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Setup,
    Night,
    Day,
    Vote,
    GameOver,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Setup => "setup",
            GamePhase::Night => "night",
            GamePhase::Day => "day",
            GamePhase::Vote => "vote",
            GamePhase::GameOver => "gameover",
        };
        write!(f, "{}", name)
    }
}

/// Structured result of a night decision, one per acting player per night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "NightActionRecord", try_from = "NightActionRecord")]
pub enum NightAction {
    Attack { target: u32 },
    Check { target: u32, result: Alignment },
    Wait { note: Option<String> },
}

impl NightAction {
    pub fn wait() -> Self {
        NightAction::Wait { note: None }
    }

    pub fn wait_with(note: impl Into<String>) -> Self {
        NightAction::Wait {
            note: Some(note.into()),
        }
    }

    pub fn target(&self) -> Option<u32> {
        match self {
            NightAction::Attack { target } | NightAction::Check { target, .. } => Some(*target),
            NightAction::Wait { .. } => None,
        }
    }
}

/// Wire shape of a night action: `{action, target, result}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NightActionRecord {
    action: String,
    target: Option<u32>,
    result: Option<String>,
}

impl From<NightAction> for NightActionRecord {
    fn from(action: NightAction) -> Self {
        match action {
            NightAction::Attack { target } => NightActionRecord {
                action: "attack".to_string(),
                target: Some(target),
                result: None,
            },
            NightAction::Check { target, result } => NightActionRecord {
                action: "check".to_string(),
                target: Some(target),
                result: Some(result.to_string()),
            },
            NightAction::Wait { note } => NightActionRecord {
                action: "wait".to_string(),
                target: None,
                result: note,
            },
        }
    }
}

impl TryFrom<NightActionRecord> for NightAction {
    type Error = String;

    fn try_from(record: NightActionRecord) -> Result<Self, Self::Error> {
        match (record.action.as_str(), record.target) {
            ("attack", Some(target)) => Ok(NightAction::Attack { target }),
            ("check", Some(target)) => {
                let result = record
                    .result
                    .ok_or_else(|| "check action without a result".to_string())?
                    .parse()?;
                Ok(NightAction::Check { target, result })
            }
            ("wait", _) => Ok(NightAction::Wait {
                note: record.result,
            }),
            (action, target) => Err(format!(
                "invalid night action {:?} with target {:?}",
                action, target
            )),
        }
    }
}

/// Night actions keyed by player id, kept in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NightActions(Vec<(u32, NightAction)>);

impl NightActions {
    /// Records `action` for `player_id`; a resubmission replaces the earlier one in place.
    pub fn insert(&mut self, player_id: u32, action: NightAction) {
        match self.0.iter_mut().find(|(id, _)| *id == player_id) {
            Some(entry) => entry.1 = action,
            None => self.0.push((player_id, action)),
        }
    }

    pub fn get(&self, player_id: u32) -> Option<&NightAction> {
        self.0
            .iter()
            .find(|(id, _)| *id == player_id)
            .map(|(_, action)| action)
    }

    pub fn contains(&self, player_id: u32) -> bool {
        self.get(player_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &NightAction)> {
        self.0.iter().map(|(id, action)| (*id, action))
    }

    /// `(attacker, target)` pairs in submission order.
    pub fn attacks(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().filter_map(|(id, action)| match action {
            NightAction::Attack { target } => Some((*id, *target)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl Serialize for NightActions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, action) in &self.0 {
            map.serialize_entry(id, action)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NightActions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = NightActions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of player id to night action")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut actions = NightActions::default();
                while let Some((id, action)) = access.next_entry::<u32, NightAction>()? {
                    actions.insert(id, action);
                }
                Ok(actions)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    pub player_id: u32,
    pub name: String,
    pub role: Role,
}

impl DeathRecord {
    pub fn of(player: &Player) -> Self {
        DeathRecord {
            player_id: player.player_id,
            name: player.name.clone(),
            role: player.role,
        }
    }
}

/// What a target is being chosen for; decides the legal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPurpose {
    Vote,
    Attack,
    Inspect,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("action not allowed during the {actual} phase (expected {expected})")]
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("player {0} does not exist")]
    UnknownPlayer(u32),
    #[error("player {0} is dead")]
    PlayerDead(u32),
    #[error("player {target} is not a valid target: {reason}")]
    InvalidTarget { target: u32, reason: String },
    #[error("player {0} has no night action")]
    NoNightAbility(u32),
    #[error("player {0} has already inspected someone tonight")]
    AlreadyInspected(u32),
    #[error("player {0} is not controlled by a human")]
    NotHumanControlled(u32),
    #[error("the game is already over")]
    GameOver,
}

/// Canonical state of one game. Mutated only by the phase machine, the
/// adjudicator and the validated `record_*` entry points.
#[derive(Debug, Clone)]
pub struct GameState {
    pub day: u32,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub roles: BTreeMap<u32, RoleInstance>,
    pub current_discussions: Vec<DiscussionEntry>,
    pub votes: BTreeMap<u32, u32>,
    pub night_actions: NightActions,
    pub last_night_deaths: Vec<DeathRecord>,
    pub game_over: bool,
    pub winner: Option<Faction>,
    pub log: Vec<String>,
}

impl GameState {
    /// Builds a state in the `Setup` phase with role instances for `players`.
    pub fn new(players: Vec<Player>) -> Self {
        let roles = RoleInstance::for_roster(&players);
        GameState {
            day: 0,
            phase: GamePhase::Setup,
            players,
            roles,
            current_discussions: Vec::new(),
            votes: BTreeMap::new(),
            night_actions: NightActions::default(),
            last_night_deaths: Vec::new(),
            game_over: false,
            winner: None,
            log: Vec::new(),
        }
    }

    /// Deals roles and moves straight into the first night.
    pub fn setup<R: Rng + ?Sized>(rules: &GameRules, rng: &mut R) -> Result<Self, SetupError> {
        let players = rules.deal(rng)?;
        let mut state = GameState::new(players);
        state.add_log(format!(
            "Game set up with {} players and {} werewolves",
            rules.player_count, rules.werewolf_count
        ));
        state.enter_night();
        Ok(state)
    }

    pub fn add_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(day = self.day, phase = %self.phase, "{}", message);
        self.log.push(message);
    }

    pub fn player(&self, player_id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn player_mut(&mut self, player_id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.player_id == player_id)
    }

    pub fn is_alive(&self, player_id: u32) -> bool {
        self.player(player_id).map_or(false, |p| p.is_alive)
    }

    pub fn living_ids(&self) -> Vec<u32> {
        self.players
            .iter()
            .filter(|p| p.is_alive)
            .map(|p| p.player_id)
            .collect()
    }

    /// Appends `entry` to the private history of every surviving player.
    pub fn broadcast_history(&mut self, entry: &str) {
        let living = self.living_ids();
        for id in living {
            if let Some(role) = self.roles.get_mut(&id) {
                role.persona_mut().history.push(entry);
            }
        }
    }

    pub fn enter_night(&mut self) {
        self.day += 1;
        self.phase = GamePhase::Night;
        self.night_actions.clear();
        self.last_night_deaths.clear();
        self.add_log(format!("Night {} begins", self.day));
    }

    pub fn enter_day(&mut self) {
        self.phase = GamePhase::Day;
        self.current_discussions.clear();
        self.add_log(format!("Day {} begins", self.day));
    }

    pub fn enter_vote(&mut self) {
        self.phase = GamePhase::Vote;
        self.votes.clear();
        self.add_log(format!("Day {} vote begins", self.day));
    }

    pub fn finish(&mut self, winner: Faction) {
        self.phase = GamePhase::GameOver;
        self.game_over = true;
        self.winner = Some(winner);
        self.add_log(format!("Game over: the {} faction wins", winner));
    }

    /// Every living player `actor` may legally target for `purpose`.
    pub fn legal_targets(&self, actor: u32, purpose: TargetPurpose) -> Vec<u32> {
        self.players
            .iter()
            .filter(|p| p.is_alive && p.player_id != actor)
            .filter(|p| purpose != TargetPurpose::Attack || !self.is_teammate(actor, p.player_id))
            .map(|p| p.player_id)
            .collect()
    }

    fn is_teammate(&self, actor: u32, other: u32) -> bool {
        self.roles
            .get(&actor)
            .and_then(RoleInstance::teammates)
            .map_or(false, |mates| mates.contains(&other))
    }

    /// Shared target validation for human and agent submissions.
    pub fn check_target(
        &self,
        actor: u32,
        target: u32,
        purpose: TargetPurpose,
    ) -> Result<(), ActionError> {
        let invalid = |reason: &str| ActionError::InvalidTarget {
            target,
            reason: reason.to_string(),
        };
        let player = self.player(target).ok_or_else(|| invalid("no such player"))?;
        if !player.is_alive {
            return Err(invalid("target is dead"));
        }
        if target == actor {
            return Err(invalid("cannot target yourself"));
        }
        if purpose == TargetPurpose::Attack && self.is_teammate(actor, target) {
            return Err(invalid("cannot attack a teammate"));
        }
        Ok(())
    }

    fn check_actor(&self, actor: u32, expected: GamePhase) -> Result<&Player, ActionError> {
        if self.game_over {
            return Err(ActionError::GameOver);
        }
        if self.phase != expected {
            return Err(ActionError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        let player = self.player(actor).ok_or(ActionError::UnknownPlayer(actor))?;
        if !player.is_alive {
            return Err(ActionError::PlayerDead(actor));
        }
        Ok(player)
    }

    pub fn record_vote(&mut self, voter: u32, target: u32) -> Result<(), ActionError> {
        self.check_actor(voter, GamePhase::Vote)?;
        self.check_target(voter, target, TargetPurpose::Vote)?;
        self.votes.insert(voter, target);
        Ok(())
    }

    pub fn record_night_action(
        &mut self,
        actor: u32,
        action: NightAction,
    ) -> Result<(), ActionError> {
        let role = self.check_actor(actor, GamePhase::Night)?.role;
        // One inspection per seer per night.
        if let Some(NightAction::Check { .. }) = self.night_actions.get(actor) {
            return Err(ActionError::AlreadyInspected(actor));
        }
        match (&action, role) {
            (NightAction::Attack { target }, Role::Werewolf) => {
                self.check_target(actor, *target, TargetPurpose::Attack)?
            }
            (NightAction::Check { target, .. }, Role::Seer) => {
                self.check_target(actor, *target, TargetPurpose::Inspect)?
            }
            (NightAction::Wait { .. }, _) => {}
            _ => return Err(ActionError::NoNightAbility(actor)),
        }
        self.night_actions.insert(actor, action);
        Ok(())
    }

    pub fn record_discussion(&mut self, speaker: u32, content: String) -> Result<(), ActionError> {
        let name = self.check_actor(speaker, GamePhase::Day)?.name.clone();
        self.current_discussions
            .push(DiscussionEntry::new(speaker, name, content));
        Ok(())
    }

    pub fn has_spoken(&self, player_id: u32) -> bool {
        self.current_discussions
            .iter()
            .any(|entry| entry.player_id == player_id)
    }
}
