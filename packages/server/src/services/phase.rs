use crate::models::game::{ActionError, GamePhase, GameState};
use crate::models::rule::evaluate_winner;

use super::adjudicator::{resolve_attacks, resolve_votes};

/// Moves the game to its next phase, running whatever adjudication the
/// phase being left requires. Returns the new phase.
pub fn advance_phase(state: &mut GameState) -> Result<GamePhase, ActionError> {
    match state.phase {
        GamePhase::Setup => state.enter_night(),
        GamePhase::Night => {
            resolve_attacks(state);
            match evaluate_winner(&state.players) {
                Some(winner) => state.finish(winner),
                None => state.enter_day(),
            }
        }
        GamePhase::Day => state.enter_vote(),
        GamePhase::Vote => {
            resolve_votes(state);
            match evaluate_winner(&state.players) {
                Some(winner) => state.finish(winner),
                None => state.enter_night(),
            }
        }
        GamePhase::GameOver => return Err(ActionError::GameOver),
    }
    Ok(state.phase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::NightAction;
    use crate::models::role::Faction;
    use crate::roles::test_support::board;

    #[test]
    fn test_full_cycle_without_deaths() {
        let mut state = board();
        assert_eq!(state.day, 1);
        assert_eq!(advance_phase(&mut state), Ok(GamePhase::Day));
        state.record_discussion(2, "hello".to_string()).unwrap();
        assert_eq!(advance_phase(&mut state), Ok(GamePhase::Vote));
        assert!(state.votes.is_empty());
        assert_eq!(advance_phase(&mut state), Ok(GamePhase::Night));
        assert_eq!(state.day, 2);
        assert!(state.night_actions.is_empty());
        assert_eq!(advance_phase(&mut state), Ok(GamePhase::Day));
        assert!(state.current_discussions.is_empty());
    }

    #[test]
    fn test_night_kill_can_end_the_game() {
        let mut state = board();
        state.player_mut(2).unwrap().is_alive = false;
        state.player_mut(5).unwrap().is_alive = false;
        // Wolves 1 and 4 against seer 3 and villager 6; one more kill is parity.
        state.record_night_action(1, NightAction::Attack { target: 6 }).unwrap();
        assert_eq!(advance_phase(&mut state), Ok(GamePhase::GameOver));
        assert!(state.game_over);
        assert_eq!(state.winner, Some(Faction::Werewolf));
        assert_eq!(advance_phase(&mut state), Err(ActionError::GameOver));
    }

    #[test]
    fn test_exiling_last_wolf_wins_for_village() {
        let mut state = board();
        state.player_mut(4).unwrap().is_alive = false;
        advance_phase(&mut state).unwrap();
        advance_phase(&mut state).unwrap();
        for voter in [2, 3, 5] {
            state.record_vote(voter, 1).unwrap();
        }
        assert_eq!(advance_phase(&mut state), Ok(GamePhase::GameOver));
        assert_eq!(state.winner, Some(Faction::Village));
        assert!(state.votes.is_empty());
    }

    #[test]
    fn test_last_night_deaths_cleared_on_next_night() {
        let mut state = board();
        state.record_night_action(1, NightAction::Attack { target: 2 }).unwrap();
        advance_phase(&mut state).unwrap();
        assert_eq!(state.last_night_deaths.len(), 1);
        advance_phase(&mut state).unwrap();
        advance_phase(&mut state).unwrap();
        assert_eq!(state.phase, GamePhase::Night);
        assert!(state.last_night_deaths.is_empty());
    }
}
