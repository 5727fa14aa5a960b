mod app;
mod auth;
mod config;
mod db;
mod pages;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nexgenhome=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    if std::env::args().nth(1).as_deref() == Some("seed") {
        return seed(&state).await;
    }

    let (host, port) = (state.config.host.clone(), state.config.port);
    let app = app::build_app(state);
    app::serve(app, &host, port).await
}

/// Recreate the `user` table and insert the development admin account.
async fn seed(state: &AppState) -> anyhow::Result<()> {
    db::reset_schema(&state.db).await?;
    let admin = state
        .auth
        .signup("admin", "admin@nexgenhome.local", "admin123")
        .await?;
    tracing::info!(
        user_id = admin.user_id,
        "admin created -> username: admin | password: admin123"
    );
    Ok(())
}
