use std::collections::BTreeMap;
use std::fmt::Write as _;

use rand::rngs::StdRng;
use tracing::debug;

use super::{
    discussion_prompt, push_candidates, push_history, Persona, Table, DECISION_HISTORY_WINDOW,
    DEFAULT_TEMPERATURE, DISCUSSION_MAX_TOKENS,
};
use crate::models::game::NightAction;
use crate::models::role::Alignment;
use crate::providers::{Decider, DecisionRequest};
use crate::services::resolver::{self, Resolution};

#[derive(Debug, Clone, PartialEq)]
pub struct Seer {
    pub persona: Persona,
    inspections: BTreeMap<u32, Alignment>,
}

impl Seer {
    pub fn new(persona: Persona) -> Self {
        Seer {
            persona,
            inspections: BTreeMap::new(),
        }
    }

    pub fn inspections(&self) -> &BTreeMap<u32, Alignment> {
        &self.inspections
    }

    pub fn remember(&mut self, target: u32, result: Alignment) {
        self.inspections.insert(target, result);
    }

    pub(crate) async fn night_action(
        &mut self,
        table: &Table<'_>,
        decider: &Decider<'_>,
        rng: &mut StdRng,
    ) -> NightAction {
        if table.legal_targets.is_empty() {
            return NightAction::wait_with("no valid target");
        }
        let request = DecisionRequest::new(self.night_prompt(table)).with_system(format!(
            "You are {}, the seer in a game of Werewolf. It is night and you may inspect one \
             player to learn whether they are a werewolf. Pick the most valuable target.",
            self.persona.name
        ));
        let response = decider.ask(request).await;
        let resolution = resolver::resolve_target(response, table.legal_targets, rng);
        debug!(player_id = self.persona.player_id, ?resolution, "inspection resolved");

        let target = match resolution {
            Resolution::NoLegalTarget { .. } => return NightAction::wait_with("no valid target"),
            other => match other.target() {
                Some(target) => target,
                None => return NightAction::wait_with("no valid target"),
            },
        };
        match table.roster.iter().find(|p| p.player_id == target) {
            Some(player) => {
                let result = player.role.alignment();
                self.remember(target, result);
                NightAction::Check { target, result }
            }
            None => NightAction::wait_with(format!("error: player {} vanished from roster", target)),
        }
    }

    fn night_prompt(&self, table: &Table<'_>) -> String {
        let mut prompt = format!(
            "It is night {} of the Werewolf game and the seer acts now.\n\n",
            table.view.day
        );
        prompt.push_str("Current situation:\n- You are the seer and may inspect one player.\n");
        self.push_inspections(&mut prompt, table, false);

        let unchecked: Vec<u32> = table
            .legal_targets
            .iter()
            .copied()
            .filter(|id| !self.inspections.contains_key(id))
            .collect();
        prompt.push_str("\nPlayers you have not inspected yet:\n");
        push_candidates(&mut prompt, table, &unchecked);

        prompt.push('\n');
        push_history(&mut prompt, &self.persona.history, DECISION_HISTORY_WINDOW);
        prompt.push_str(
            "\nChoose one player to inspect. Think about whose behaviour is most suspicious. \
             Answer in the form 'I inspect Player X', where X is the player id.",
        );
        prompt
    }

    fn push_inspections(&self, prompt: &mut String, table: &Table<'_>, with_status: bool) {
        if self.inspections.is_empty() {
            return;
        }
        prompt.push_str("- Players you have inspected:\n");
        for (id, result) in &self.inspections {
            let status = match table.view.players.iter().find(|p| p.id == *id) {
                Some(p) if with_status && p.alive => ", still alive",
                Some(_) if with_status => ", now dead",
                _ => "",
            };
            let _ = writeln!(
                prompt,
                "  - Player {} ({}): {}{}",
                id,
                table.name_of(*id),
                result,
                status
            );
        }
    }

    pub(crate) fn discussion_request(&self, table: &Table<'_>) -> DecisionRequest {
        let mut notes = String::from("- You are the seer and hold important information.\n");
        self.push_inspections(&mut notes, table, true);
        let prompt = discussion_prompt(
            &self.persona,
            table,
            &notes,
            "Speak in the first person. Decide whether to reveal that you are the seer and \
             share your results now, or to keep watching for a while. Help the village find \
             the werewolves without becoming their next target too early.",
        );
        let system = format!(
            "You are {}, the seer in a game of Werewolf. Your goal is to help the village \
             find the werewolves. Revealing your role and results can help the village, but \
             it may also make you the werewolves' target. You may choose to reveal.",
            self.persona.name
        );
        DecisionRequest::new(prompt)
            .with_system(system)
            .with_temperature(DEFAULT_TEMPERATURE)
            .with_max_tokens(DISCUSSION_MAX_TOKENS)
    }
}
