use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        // テストでは外部APIを呼ばない
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
        if std::env::var("DECISION_TIMEOUT_SECS").is_err() {
            std::env::set_var("DECISION_TIMEOUT_SECS", "5");
        }
        if std::env::var("SAVE_DIR").is_err() {
            let dir = std::env::temp_dir().join("werewolf-server-test-saves");
            std::env::set_var("SAVE_DIR", dir);
        }
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}
