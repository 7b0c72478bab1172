use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    models::{
        game::{ActionError, GamePhase, NightAction},
        role::Faction,
        rule::{GameRules, SetupError},
        summary::GameSummary,
        view::PlayerView,
    },
    providers::SeatingPlan,
    services::{
        persistence::PersistenceError,
        session::{GameSession, SessionSetup},
        session_manager::SessionError,
    },
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum GameServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Overrides for a new game; anything left out comes from the config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub player_count: Option<usize>,
    pub werewolf_count: Option<usize>,
    pub special_roles: Option<Vec<String>>,
    #[serde(default)]
    pub human_players: Vec<u32>,
    #[serde(default)]
    pub seating: SeatingPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadGameRequest {
    /// File name inside the save directory.
    pub file: String,
    #[serde(default)]
    pub human_players: Vec<u32>,
    #[serde(default)]
    pub seating: SeatingPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedGame {
    pub game_id: String,
    pub phase: GamePhase,
    pub day: u32,
    pub human_players: Vec<u32>,
}

pub async fn create_game(
    state: AppState,
    request: CreateGameRequest,
) -> Result<CreatedGame, GameServiceError> {
    let config = &state.config;
    let rules = GameRules::with_role_names(
        request.player_count.unwrap_or(config.player_count),
        request.werewolf_count.unwrap_or(config.werewolf_count),
        request
            .special_roles
            .as_deref()
            .unwrap_or(&config.special_roles[..]),
    )?;
    let setup = SessionSetup {
        rules,
        humans: request.human_players.iter().copied().collect(),
        seating: request.seating,
        decision_timeout: config.decision_timeout(),
    };
    let game_id = uuid::Uuid::new_v4().to_string();
    let session = GameSession::create(&game_id, &setup, &state.providers, state.next_rng())?;
    let created = CreatedGame {
        game_id: game_id.clone(),
        phase: session.state().phase,
        day: session.state().day,
        human_players: setup.humans.into_iter().collect(),
    };
    state.sessions.insert(session).await;
    Ok(created)
}

pub async fn list_games(state: AppState) -> Vec<String> {
    state.sessions.list().await
}

pub async fn get_player_view(
    state: AppState,
    game_id: &str,
    player_id: u32,
) -> Result<PlayerView, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let session = session.lock().await;
    session
        .view_for(player_id)
        .ok_or(GameServiceError::Action(ActionError::UnknownPlayer(player_id)))
}

/// Spectator view: public facts only, no hidden roles.
pub async fn get_public_view(state: AppState, game_id: &str) -> Result<PlayerView, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let view = PlayerView::public(session.lock().await.state());
    Ok(view)
}

pub async fn get_game_summary(
    state: AppState,
    game_id: &str,
) -> Result<GameSummary, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let summary = session.lock().await.summary();
    Ok(summary)
}

/// Lets every agent act in the current phase without advancing it.
pub async fn run_phase(state: AppState, game_id: &str) -> Result<GameSummary, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let mut session = session.lock().await;
    session.run_phase().await?;
    Ok(session.summary())
}

pub async fn advance_game_phase(
    state: AppState,
    game_id: &str,
) -> Result<GamePhase, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let phase = session.lock().await.advance_phase()?;
    Ok(phase)
}

/// Runs the current phase and then advances.
pub async fn step_game(state: AppState, game_id: &str) -> Result<GamePhase, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let phase = session.lock().await.step().await?;
    Ok(phase)
}

pub async fn handle_vote(
    state: AppState,
    game_id: &str,
    voter_id: u32,
    target_id: u32,
) -> Result<(), GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    session.lock().await.submit_vote(voter_id, target_id)?;
    Ok(())
}

pub async fn process_night_action(
    state: AppState,
    game_id: &str,
    player_id: u32,
    target_id: Option<u32>,
) -> Result<NightAction, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let action = session
        .lock()
        .await
        .submit_night_action(player_id, target_id)?;
    Ok(action)
}

pub async fn post_discussion(
    state: AppState,
    game_id: &str,
    player_id: u32,
    content: String,
) -> Result<(), GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    session.lock().await.submit_discussion(player_id, content)?;
    Ok(())
}

pub async fn check_winner(
    state: AppState,
    game_id: &str,
) -> Result<Option<Faction>, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let winner = session.lock().await.state().winner;
    Ok(winner)
}

fn save_path(state: &AppState, file: &str) -> PathBuf {
    let name = std::path::Path::new(file)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| file.into());
    PathBuf::from(&state.config.save_dir).join(name)
}

pub async fn save_game(state: AppState, game_id: &str) -> Result<PathBuf, GameServiceError> {
    let session = state.sessions.get(game_id).await?;
    let path = save_path(&state, &format!("{}.json", game_id));
    session.lock().await.save(&path).await?;
    Ok(path)
}

/// Loads a saved game into a fresh session. A failed load registers nothing.
pub async fn load_game(
    state: AppState,
    request: LoadGameRequest,
) -> Result<CreatedGame, GameServiceError> {
    let path = save_path(&state, &request.file);
    let humans: BTreeSet<u32> = request.human_players.iter().copied().collect();
    let game_id = uuid::Uuid::new_v4().to_string();
    let session = GameSession::restore(
        &game_id,
        &path,
        &humans,
        &request.seating,
        &state.providers,
        state.next_rng(),
        state.config.decision_timeout(),
    )
    .await?;
    let created = CreatedGame {
        game_id: game_id.clone(),
        phase: session.state().phase,
        day: session.state().day,
        human_players: humans.into_iter().collect(),
    };
    state.sessions.insert(session).await;
    info!(game_id = %game_id, path = %path.display(), "game restored");
    Ok(created)
}

pub async fn end_game(state: AppState, game_id: &str) -> Result<(), GameServiceError> {
    state.sessions.remove(game_id).await?;
    Ok(())
}
