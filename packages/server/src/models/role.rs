use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Villager,
    Seer,
    Werewolf,
}

impl Role {
    pub fn faction(self) -> Faction {
        match self {
            Role::Werewolf => Faction::Werewolf,
            Role::Villager | Role::Seer => Faction::Village,
        }
    }

    pub fn is_werewolf(self) -> bool {
        self == Role::Werewolf
    }

    /// What a seer learns when inspecting a player holding this role.
    pub fn alignment(self) -> Alignment {
        match self {
            Role::Werewolf => Alignment::Werewolf,
            Role::Villager | Role::Seer => Alignment::Good,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Villager => write!(f, "Villager"),
            Role::Seer => write!(f, "Seer"),
            Role::Werewolf => write!(f, "Werewolf"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "villager" => Ok(Role::Villager),
            "seer" => Ok(Role::Seer),
            "werewolf" => Ok(Role::Werewolf),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Village,
    Werewolf,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Village => write!(f, "Village"),
            Faction::Werewolf => write!(f, "Werewolf"),
        }
    }
}

/// Hidden faction as reported by an inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Werewolf,
    Good,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Werewolf => write!(f, "Werewolf"),
            Alignment::Good => write!(f, "Good"),
        }
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Werewolf" => Ok(Alignment::Werewolf),
            "Good" => Ok(Alignment::Good),
            other => Err(format!("unknown inspection result: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Werewolf).unwrap(), "\"werewolf\"");
        let role: Role = serde_json::from_str("\"seer\"").unwrap();
        assert_eq!(role, Role::Seer);
    }

    #[test]
    fn test_seer_counts_as_good() {
        assert_eq!(Role::Seer.alignment(), Alignment::Good);
        assert_eq!(Role::Seer.faction(), Faction::Village);
        assert_eq!(Role::Werewolf.alignment(), Alignment::Werewolf);
    }

    #[test]
    fn test_parse_special_role_names() {
        assert_eq!(" Seer ".parse::<Role>().unwrap(), Role::Seer);
        assert!("guard".parse::<Role>().is_err());
    }
}
