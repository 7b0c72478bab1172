use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::player::Player;
use super::role::{Faction, Role};

pub const MIN_PLAYERS: usize = 4;
pub const MAX_PLAYERS: usize = 20;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error("at least 4 players are required, got {0}")]
    TooFewPlayers(usize),
    #[error("at most 20 players are supported, got {0}")]
    TooManyPlayers(usize),
    #[error("werewolf count must be between 1 and {max}, got {count}")]
    WerewolfCountOutOfRange { count: usize, max: usize },
    #[error("too many special roles: {count} requested, at most {max} allowed")]
    TooManySpecialRoles { count: usize, max: usize },
    #[error("unsupported special role: {0}")]
    UnknownRole(String),
    #[error("cannot seat a human at player {0}: no such player")]
    UnknownSeat(u32),
}

/// Table composition requested at setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub player_count: usize,
    pub werewolf_count: usize,
    #[serde(default)]
    pub special_roles: Vec<Role>,
}

impl GameRules {
    pub fn new(player_count: usize, werewolf_count: usize, special_roles: Vec<Role>) -> Self {
        Self {
            player_count,
            werewolf_count,
            special_roles,
        }
    }

    /// Parses role names such as `["seer"]`. Only non-werewolf specials are accepted.
    pub fn with_role_names(
        player_count: usize,
        werewolf_count: usize,
        names: &[String],
    ) -> Result<Self, SetupError> {
        let special_roles = names
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| match name.parse::<Role>() {
                Ok(Role::Seer) => Ok(Role::Seer),
                _ => Err(SetupError::UnknownRole(name.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(player_count, werewolf_count, special_roles))
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.player_count < MIN_PLAYERS {
            return Err(SetupError::TooFewPlayers(self.player_count));
        }
        if self.player_count > MAX_PLAYERS {
            return Err(SetupError::TooManyPlayers(self.player_count));
        }
        let max_werewolves = self.player_count / 2 - 1;
        if self.werewolf_count < 1 || self.werewolf_count > max_werewolves {
            return Err(SetupError::WerewolfCountOutOfRange {
                count: self.werewolf_count,
                max: max_werewolves,
            });
        }
        let max_specials = self.player_count - self.werewolf_count - 1;
        if self.special_roles.len() > max_specials {
            return Err(SetupError::TooManySpecialRoles {
                count: self.special_roles.len(),
                max: max_specials,
            });
        }
        if let Some(role) = self.special_roles.iter().find(|r| r.is_werewolf()) {
            return Err(SetupError::UnknownRole(role.to_string()));
        }
        Ok(())
    }

    /// Werewolves, then the specials, padded with villagers.
    pub fn role_pool(&self) -> Vec<Role> {
        let mut pool = vec![Role::Werewolf; self.werewolf_count];
        pool.extend(self.special_roles.iter().copied());
        pool.resize(self.player_count, Role::Villager);
        pool
    }

    /// Validates the rules and deals a shuffled role to players `1..=N`.
    pub fn deal<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Player>, SetupError> {
        self.validate()?;
        let mut pool = self.role_pool();
        pool.shuffle(rng);
        Ok(pool
            .into_iter()
            .enumerate()
            .map(|(index, role)| Player::new(index as u32 + 1, role))
            .collect())
    }
}

/// Terminal check run after every elimination.
///
/// The zero-werewolf test comes first so a board with nobody left standing
/// still resolves to a village win instead of a draw.
pub fn evaluate_winner(players: &[Player]) -> Option<Faction> {
    let living = players.iter().filter(|p| p.is_alive);
    let (werewolves, others) = living.fold((0usize, 0usize), |(w, v), p| {
        if p.role.is_werewolf() {
            (w + 1, v)
        } else {
            (w, v + 1)
        }
    });

    if werewolves == 0 {
        Some(Faction::Village)
    } else if werewolves >= others {
        Some(Faction::Werewolf)
    } else {
        None
    }
}
