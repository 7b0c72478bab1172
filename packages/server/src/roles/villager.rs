use super::{discussion_prompt, Persona, Table, DEFAULT_TEMPERATURE, DISCUSSION_MAX_TOKENS};
use crate::providers::DecisionRequest;

/// Plain villager: no night ability.
#[derive(Debug, Clone, PartialEq)]
pub struct Villager {
    pub persona: Persona,
}

impl Villager {
    pub fn new(persona: Persona) -> Self {
        Villager { persona }
    }

    pub(crate) fn discussion_request(&self, table: &Table<'_>) -> DecisionRequest {
        let prompt = discussion_prompt(
            &self.persona,
            table,
            "",
            "Speak in the first person. Share what you noticed about the other players \
             and who you suspect is a werewolf.",
        );
        let system = format!(
            "You are {}, a villager in a game of Werewolf. Your goal is to find the hidden \
             werewolves and help the village win. Watch how the other players behave and speak.",
            self.persona.name
        );
        DecisionRequest::new(prompt)
            .with_system(system)
            .with_temperature(DEFAULT_TEMPERATURE)
            .with_max_tokens(DISCUSSION_MAX_TOKENS)
    }
}
