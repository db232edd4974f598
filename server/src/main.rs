use server::config::ServerConfig;
use server::services::persistence::ElementPersistConfig;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }

    let config = ServerConfig::from_env();
    let port = config.port;

    let store = server::open_store(&config).await?;
    let state = AppState::new(store, config, ElementPersistConfig::from_env());

    let app = server::routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    tracing::info!(%port, "whiteboard server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
