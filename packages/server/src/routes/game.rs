use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::game_service::{
    self, CreateGameRequest, GameServiceError, LoadGameRequest,
};
use crate::services::persistence::PersistenceError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteAction {
    pub voter_id: u32,
    pub target_id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NightActionRequest {
    pub player_id: u32,
    #[serde(default)]
    pub target_id: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscussionRequest {
    pub player_id: u32,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_games_handler))
        .route("/create", post(create_game_handler))
        .route("/load", post(load_game_handler))
        .nest(
            "/:game_id",
            Router::new()
                // ゲームの基本操作
                .route("/summary", get(summary_handler))
                .route("/view", get(public_view_handler))
                .route("/players/:player_id/view", get(player_view_handler))
                .route("/save", post(save_game_handler))
                .route("/end", post(end_game_handler))
                // 人間プレイヤーのアクション
                .nest(
                    "/actions",
                    Router::new()
                        .route("/vote", post(cast_vote_handler))
                        .route("/night-action", post(night_action_handler))
                        .route("/discussion", post(discussion_handler)),
                )
                // ゲーム進行の管理
                .route("/phase/run", post(run_phase_handler))
                .route("/phase/next", post(advance_phase_handler))
                .route("/phase/step", post(step_phase_handler))
                .route("/check-winner", get(check_winner_handler)),
        )
        .with_state(state)
}

fn status_for(error: &GameServiceError) -> StatusCode {
    match error {
        GameServiceError::Session(_) => StatusCode::NOT_FOUND,
        GameServiceError::Setup(_) | GameServiceError::Action(_) => StatusCode::BAD_REQUEST,
        GameServiceError::Persistence(PersistenceError::NotFound(_)) => StatusCode::NOT_FOUND,
        GameServiceError::Persistence(PersistenceError::Malformed(_))
        | GameServiceError::Persistence(PersistenceError::Invalid(_))
        | GameServiceError::Persistence(PersistenceError::Seat(_)) => StatusCode::BAD_REQUEST,
        GameServiceError::Persistence(PersistenceError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: Result<T, GameServiceError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => {
            let status = status_for(&error);
            warn!(%status, %error, "request failed");
            (
                status,
                Json(ErrorBody {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn list_games_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(game_service::list_games(state).await)
}

async fn create_game_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Response {
    respond(game_service::create_game(state, request).await)
}

async fn load_game_handler(
    State(state): State<AppState>,
    Json(request): Json<LoadGameRequest>,
) -> Response {
    respond(game_service::load_game(state, request).await)
}

async fn summary_handler(State(state): State<AppState>, Path(game_id): Path<String>) -> Response {
    respond(game_service::get_game_summary(state, &game_id).await)
}

async fn public_view_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(game_service::get_public_view(state, &game_id).await)
}

async fn player_view_handler(
    State(state): State<AppState>,
    Path((game_id, player_id)): Path<(String, u32)>,
) -> Response {
    respond(game_service::get_player_view(state, &game_id, player_id).await)
}

async fn save_game_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(
        game_service::save_game(state, &game_id)
            .await
            .map(|path| path.display().to_string()),
    )
}

async fn end_game_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(
        game_service::end_game(state, &game_id)
            .await
            .map(|_| "Game ended".to_string()),
    )
}

async fn cast_vote_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(vote): Json<VoteAction>,
) -> Response {
    respond(
        game_service::handle_vote(state, &game_id, vote.voter_id, vote.target_id)
            .await
            .map(|_| "Vote recorded".to_string()),
    )
}

async fn night_action_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(action): Json<NightActionRequest>,
) -> Response {
    respond(
        game_service::process_night_action(state, &game_id, action.player_id, action.target_id)
            .await,
    )
}

async fn discussion_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(statement): Json<DiscussionRequest>,
) -> Response {
    respond(
        game_service::post_discussion(state, &game_id, statement.player_id, statement.content)
            .await
            .map(|_| "Statement recorded".to_string()),
    )
}

async fn run_phase_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(game_service::run_phase(state, &game_id).await)
}

async fn advance_phase_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(game_service::advance_game_phase(state, &game_id).await)
}

async fn step_phase_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(game_service::step_game(state, &game_id).await)
}

async fn check_winner_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Response {
    respond(game_service::check_winner(state, &game_id).await)
}
