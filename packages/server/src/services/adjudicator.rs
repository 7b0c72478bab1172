use std::collections::BTreeMap;

use tracing::info;

use crate::models::game::{DeathRecord, GameState, NightAction};

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    NoVotes,
    /// Two or more targets share the top count; nobody leaves.
    Hung { tied: Vec<u32>, votes: usize },
    Eliminated(DeathRecord),
    /// The top target was already dead or unknown.
    Invalid(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttackOutcome {
    NoTarget,
    Invalid(u32),
    Killed(DeathRecord),
}

/// Ballots per target. Abstentions never reach the buffer.
pub fn tally(votes: &BTreeMap<u32, u32>) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for target in votes.values() {
        *counts.entry(*target).or_insert(0) += 1;
    }
    counts
}

/// Marks `target` dead if it is a living player.
fn kill(state: &mut GameState, target: u32) -> Option<DeathRecord> {
    let player = state.player_mut(target).filter(|p| p.is_alive)?;
    player.is_alive = false;
    Some(DeathRecord::of(player))
}

fn record(state: &mut GameState, entry: String) {
    state.add_log(entry.clone());
    state.broadcast_history(&entry);
}

/// Resolves the day vote and empties the vote buffer whatever the outcome.
pub fn resolve_votes(state: &mut GameState) -> VoteOutcome {
    let counts = tally(&state.votes);
    state.votes.clear();
    let day = state.day;

    let Some(top) = counts.values().copied().max() else {
        record(state, format!("Day {}: no valid votes, nobody is exiled", day));
        return VoteOutcome::NoVotes;
    };
    let leaders: Vec<u32> = counts
        .iter()
        .filter(|(_, count)| **count == top)
        .map(|(id, _)| *id)
        .collect();

    if leaders.len() > 1 {
        let names: Vec<String> = leaders.iter().map(|id| format!("Player {}", id)).collect();
        record(
            state,
            format!(
                "Day {}: tie between {} with {} votes each, nobody is exiled",
                day,
                names.join(", "),
                top
            ),
        );
        return VoteOutcome::Hung {
            tied: leaders,
            votes: top,
        };
    }

    let target = leaders[0];
    let Some(death) = kill(state, target) else {
        state.add_log(format!("Day {}: vote target Player {} is not a living player", day, target));
        return VoteOutcome::Invalid(target);
    };
    info!(day, player_id = death.player_id, role = %death.role, votes = top, "player exiled");
    record(
        state,
        format!(
            "Day {} vote: Player {} ({}) was exiled, their role was {}",
            day, death.player_id, death.name, death.role
        ),
    );
    VoteOutcome::Eliminated(death)
}

/// Gives every night actor a private note of what it did.
fn note_night_actions(state: &mut GameState) {
    let day = state.day;
    let notes: Vec<(u32, String)> = state
        .night_actions
        .iter()
        .filter_map(|(actor, action)| {
            let name = |id: u32| {
                state
                    .player(id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("Player {}", id))
            };
            match action {
                NightAction::Attack { target } => Some((
                    actor,
                    format!("Night {}: you chose to attack Player {} ({})", day, target, name(*target)),
                )),
                NightAction::Check { target, result } => Some((
                    actor,
                    format!(
                        "Night {}: you inspected Player {} ({}), the result was {}",
                        day,
                        target,
                        name(*target),
                        result
                    ),
                )),
                NightAction::Wait { .. } => None,
            }
        })
        .collect();
    for (actor, note) in notes {
        if let Some(role) = state.roles.get_mut(&actor) {
            role.persona_mut().history.push(note);
        }
    }
}

/// Applies the first submitted attack of the night.
pub fn resolve_attacks(state: &mut GameState) -> AttackOutcome {
    note_night_actions(state);
    let day = state.day;

    let Some((_, target)) = state.night_actions.attacks().next() else {
        record(state, format!("Night {}: the werewolves chose no target", day));
        return AttackOutcome::NoTarget;
    };

    let Some(death) = kill(state, target) else {
        state.add_log(format!(
            "Night {}: the werewolves' target Player {} is invalid or already dead",
            day, target
        ));
        return AttackOutcome::Invalid(target);
    };
    info!(day, player_id = death.player_id, role = %death.role, "player killed at night");
    state.last_night_deaths.push(death.clone());
    record(
        state,
        format!(
            "Night {}: Player {} ({}) was killed by the werewolves, their role was {}",
            day, death.player_id, death.name, death.role
        ),
    );
    AttackOutcome::Killed(death)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::GamePhase;
    use crate::models::role::{Alignment, Role};
    use crate::roles::test_support::board;

    fn voting_board() -> GameState {
        let mut state = board();
        state.enter_day();
        state.enter_vote();
        state
    }

    #[test]
    fn test_equal_top_counts_exile_nobody_and_clear_buffer() {
        let mut state = voting_board();
        for voter in [1, 2, 4] {
            state.votes.insert(voter, 3);
        }
        for voter in [3, 5, 6] {
            state.votes.insert(voter, 2);
        }
        let outcome = resolve_votes(&mut state);

        assert_eq!(
            outcome,
            VoteOutcome::Hung {
                tied: vec![2, 3],
                votes: 3
            }
        );
        assert!(state.log.last().unwrap().contains("nobody is exiled"));
        assert!(state.votes.is_empty());
        assert_eq!(state.living_ids().len(), 6);
    }

    #[test]
    fn test_unanimous_ballots_exile() {
        let mut state = voting_board();
        state.votes.insert(1, 3);
        state.votes.insert(2, 3);
        assert!(matches!(resolve_votes(&mut state), VoteOutcome::Eliminated(_)));
    }

    #[test]
    fn test_majority_eliminates_and_reveals_role() {
        let mut state = voting_board();
        state.votes.insert(1, 2);
        state.votes.insert(3, 2);
        state.votes.insert(4, 2);
        state.votes.insert(5, 2);
        state.votes.insert(6, 4);

        match resolve_votes(&mut state) {
            VoteOutcome::Eliminated(death) => {
                assert_eq!(death.player_id, 2);
                assert_eq!(death.role, Role::Villager);
            }
            other => panic!("expected elimination, got {:?}", other),
        }
        assert!(!state.is_alive(2));
        assert!(state.votes.is_empty());
        let last = state.log.last().unwrap();
        assert!(last.contains("Player 2 (Player 2) was exiled"));
        assert!(last.contains("Villager"));
        // Survivors hear about it; the exiled player does not.
        let heard = |id: u32| state.roles[&id].persona().history.entries().iter().any(|e| e.contains("exiled"));
        assert!(heard(5));
        assert!(!heard(2));
        // Vote eliminations are not night deaths.
        assert!(state.last_night_deaths.is_empty());
    }

    #[test]
    fn test_no_votes() {
        let mut state = voting_board();
        assert_eq!(resolve_votes(&mut state), VoteOutcome::NoVotes);
        assert_eq!(state.living_ids().len(), 6);
    }

    #[test]
    fn test_no_attack_logs_no_target() {
        let mut state = board();
        state
            .record_night_action(2, NightAction::wait())
            .unwrap();
        assert_eq!(resolve_attacks(&mut state), AttackOutcome::NoTarget);
        assert_eq!(state.living_ids().len(), 6);
        assert!(state.log.last().unwrap().contains("chose no target"));
        assert!(state.last_night_deaths.is_empty());
    }

    #[test]
    fn test_first_submitted_attack_wins() {
        let mut state = board();
        state.record_night_action(4, NightAction::Attack { target: 5 }).unwrap();
        state.record_night_action(1, NightAction::Attack { target: 2 }).unwrap();
        state
            .record_night_action(
                3,
                NightAction::Check {
                    target: 1,
                    result: Alignment::Werewolf,
                },
            )
            .unwrap();

        match resolve_attacks(&mut state) {
            AttackOutcome::Killed(death) => assert_eq!(death.player_id, 5),
            other => panic!("expected a kill, got {:?}", other),
        }
        assert!(!state.is_alive(5));
        assert!(state.is_alive(2));
        assert_eq!(state.last_night_deaths.len(), 1);
        assert_eq!(state.phase, GamePhase::Night);

        let seer_notes = state.roles[&3].persona().history.entries();
        assert!(seer_notes.iter().any(|e| e.contains("you inspected Player 1")));
        let wolf_notes = state.roles[&4].persona().history.entries();
        assert!(wolf_notes.iter().any(|e| e.contains("you chose to attack Player 5")));
    }

    #[test]
    fn test_attack_on_dead_target_is_a_no_op() {
        let mut state = board();
        state.record_night_action(1, NightAction::Attack { target: 6 }).unwrap();
        state.player_mut(6).unwrap().is_alive = false;
        assert_eq!(resolve_attacks(&mut state), AttackOutcome::Invalid(6));
        assert!(state.last_night_deaths.is_empty());
    }
}
