use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use werewolf_server::{
    app, models::config::GameConfig, state::AppState, utils::config::ProviderSettings,
    utils::test_setup::setup_test_env,
};

fn test_app() -> axum::Router {
    setup_test_env();
    let config = GameConfig {
        rng_seed: Some(8),
        ..GameConfig::default()
    };
    app::create_app(AppState::with_config(config, ProviderSettings::offline()))
}

async fn call(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(if body.is_null() {
            Body::empty()
        } else {
            Body::from(body.to_string())
        })
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_create_game() {
    let app = test_app();
    let (status, body) = call(&app, "POST", "/api/game/create", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["day"], 1);

    let (status, list) = call(&app, "GET", "/api/game", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([body["game_id"]]));
}

#[tokio::test]
async fn test_human_plays_through_a_day() {
    let app = test_app();
    let (_, created) = call(
        &app,
        "POST",
        "/api/game/create",
        json!({"human_players": [1, 2, 3, 4, 5, 6]}),
    )
    .await;
    let game = format!("/api/game/{}", created["game_id"].as_str().unwrap());

    // Every seat is human, so the night needs one submission per player.
    for player in 1..=6 {
        let (status, _) = call(
            &app,
            "POST",
            &format!("{}/actions/night-action", game),
            json!({"player_id": player}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, phase) = call(&app, "POST", &format!("{}/phase/next", game), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(phase, "day");

    let (_, view) = call(&app, "GET", &format!("{}/players/1/view", game), Value::Null).await;
    assert_eq!(view["phase"], "day");
    assert!(view["last_night_deaths"].as_array().unwrap().is_empty());

    let (status, _) = call(
        &app,
        "POST",
        &format!("{}/actions/discussion", game),
        json!({"player_id": 1, "content": "Let's be careful today."}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, view) = call(&app, "GET", &format!("{}/players/2/view", game), Value::Null).await;
    assert_eq!(
        view["current_discussions"][0]["content"],
        "Let's be careful today."
    );

    let (status, winner) = call(&app, "GET", &format!("{}/check-winner", game), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert!(winner.is_null());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_app();
    let (status, _) = call(&app, "GET", "/api/game/nope/players/1/view", Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
