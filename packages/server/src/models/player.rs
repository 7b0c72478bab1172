use serde::{Deserialize, Serialize};

use super::role::Role;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: u32,
    pub name: String,
    pub role: Role,
    pub is_alive: bool,
}

impl Player {
    pub fn new(player_id: u32, role: Role) -> Self {
        Self {
            player_id,
            name: format!("Player {}", player_id),
            role,
            is_alive: true,
        }
    }
}
