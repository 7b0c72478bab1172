use std::collections::BTreeSet;
use std::fmt::Write as _;

use rand::rngs::StdRng;
use tracing::debug;

use super::{
    default_vote, discussion_prompt, push_candidates, push_history, Persona, Table,
    DECISION_HISTORY_WINDOW, DISCUSSION_MAX_TOKENS,
};
use crate::models::game::NightAction;
use crate::providers::{Decider, DecisionRequest};
use crate::services::resolver::{self, Resolution};

const WEREWOLF_DISCUSSION_TEMPERATURE: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct Werewolf {
    pub persona: Persona,
    teammates: BTreeSet<u32>,
}

impl Werewolf {
    pub fn new(persona: Persona, teammates: BTreeSet<u32>) -> Self {
        Werewolf { persona, teammates }
    }

    pub fn teammates(&self) -> &BTreeSet<u32> {
        &self.teammates
    }

    fn living_teammates(&self, table: &Table<'_>) -> Vec<u32> {
        table
            .view
            .players
            .iter()
            .filter(|p| p.alive && self.teammates.contains(&p.id))
            .map(|p| p.id)
            .collect()
    }

    /// The alpha is the smallest id among this wolf and its living teammates.
    pub fn is_alpha(&self, table: &Table<'_>) -> bool {
        self.living_teammates(table)
            .into_iter()
            .all(|mate| mate > self.persona.player_id)
    }

    pub(crate) async fn night_action(
        &self,
        table: &Table<'_>,
        decider: &Decider<'_>,
        rng: &mut StdRng,
    ) -> NightAction {
        if !self.is_alpha(table) {
            return NightAction::wait();
        }
        if table.legal_targets.is_empty() {
            return NightAction::wait_with("no valid target");
        }
        let request = DecisionRequest::new(self.night_prompt(table)).with_system(format!(
            "You are {}, a werewolf in a game of Werewolf. It is night and, as the pack \
             leader, you choose which player the werewolves attack. Decide in the pack's \
             best interest.",
            self.persona.name
        ));
        let response = decider.ask(request).await;
        let resolution = resolver::resolve_target(response, table.legal_targets, rng);
        debug!(player_id = self.persona.player_id, ?resolution, "attack resolved");

        match resolution {
            Resolution::NoLegalTarget { .. } => NightAction::wait_with("no valid target"),
            other => match other.target() {
                Some(target) => NightAction::Attack { target },
                None => NightAction::wait_with("no valid target"),
            },
        }
    }

    fn push_pack(&self, prompt: &mut String, table: &Table<'_>) {
        let mates = self.living_teammates(table);
        if mates.is_empty() {
            return;
        }
        prompt.push_str("- Your fellow werewolves:\n");
        for id in mates {
            let _ = writeln!(prompt, "  - Player {} ({})", id, table.name_of(id));
        }
    }

    fn night_prompt(&self, table: &Table<'_>) -> String {
        let mut prompt = format!(
            "It is night {} of the Werewolf game and the werewolves act now.\n\n",
            table.view.day
        );
        prompt.push_str("Current situation:\n- You lead the pack and pick tonight's target.\n");
        self.push_pack(&mut prompt, table);
        prompt.push_str("\nPlayers you can attack:\n");
        push_candidates(&mut prompt, table, table.legal_targets);
        prompt.push('\n');
        push_history(&mut prompt, &self.persona.history, DECISION_HISTORY_WINDOW);
        prompt.push_str(
            "\nChoose one player to attack tonight. Consider who might hold a key role such \
             as the seer. Answer in the form 'I attack Player X', where X is the player id.",
        );
        prompt
    }

    pub(crate) fn discussion_request(&self, table: &Table<'_>) -> DecisionRequest {
        let mut notes = String::new();
        self.push_pack(&mut notes, table);
        let prompt = discussion_prompt(
            &self.persona,
            table,
            &notes,
            "Speak in the first person as if you were an ordinary villager hunting the \
             werewolves (never yourself). Sound like an eager villager analysing the game, \
             while actually steering suspicion away from you and your fellow werewolves.",
        );
        let system = format!(
            "You are {}, a werewolf in a game of Werewolf, disguised as a villager. Your goal \
             is to survive and eliminate the villagers. Never reveal that you are a werewolf. \
             Deflect suspicion onto innocent villagers and protect yourself and your pack.",
            self.persona.name
        );
        DecisionRequest::new(prompt)
            .with_system(system)
            .with_temperature(WEREWOLF_DISCUSSION_TEMPERATURE)
            .with_max_tokens(DISCUSSION_MAX_TOKENS)
    }

    pub(crate) async fn vote(
        &self,
        table: &Table<'_>,
        decider: &Decider<'_>,
        rng: &mut StdRng,
    ) -> Option<u32> {
        let mates = self.living_teammates(table);
        let mut system = format!(
            "You are {} playing Werewolf as a werewolf disguised as a villager. Decide who \
             to vote out without exposing yourself.",
            self.persona.name
        );
        if !mates.is_empty() {
            let ids: Vec<String> = mates.iter().map(|id| format!("Player {}", id)).collect();
            let _ = write!(system, " Your fellow werewolves are {}.", ids.join(", "));
        }
        default_vote(&self.persona, system, table, decider, rng).await
    }
}
