use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::http::{self, HeaderValue, Method};
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

use werewolf_server::{app, state::AppState, utils::config::CONFIG};

// ログ設定
fn init_logger(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 環境変数をロード
    if let Err(e) = dotenv() {
        eprintln!("Warning: failed to load .env file: {}", e);
    }

    let state = AppState::new();
    let config = state.config.clone();
    init_logger(config.verbose_logging);

    for (var, present) in [
        ("OPENAI_API_KEY", CONFIG.openai_api_key.is_some()),
        ("ANTHROPIC_API_KEY", CONFIG.anthropic_api_key.is_some()),
    ] {
        if !present {
            warn!("{} is not set, those seats fall back to the offline provider", var);
        }
    }

    let addr: SocketAddr = config
        .server_addr
        .parse()
        .with_context(|| format!("invalid SERVER_ADDR {}", config.server_addr))?;
    let ttl = config.session_ttl();

    // 放置されたセッションの掃除
    let reaper = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval((ttl / 4).max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let expired = reaper.expire_idle(ttl).await;
            if !expired.is_empty() {
                info!(count = expired.len(), "expired idle sessions");
            }
        }
    });

    // CORSレイヤーの設定
    let cors = CorsLayer::new()
        .allow_origin([HeaderValue::from_static("http://localhost:3000")])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    let app = app::create_app(state).layer(cors).layer(
        TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
            tracing::info_span!(
                "HTTP request",
                method = %request.method(),
                uri = %request.uri(),
            )
        }),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
