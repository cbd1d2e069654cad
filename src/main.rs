use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use surfer_forecast::history::PostgresHistory;
use surfer_forecast::prediction::ml::HttpMlClient;
use surfer_forecast::state::AppState;
use surfer_forecast::{api, config};
use tracing::Level;

fn init_tracing(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "surfer-forecast starting"
    );

    // Both clients are blocking and must be built off the async executor.
    let setup_config = config.clone();
    let state = tokio::task::spawn_blocking(move || build_state(&setup_config)).await??;

    let app = api::router(Arc::new(state));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(
    config: &config::Config,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let url = config
        .database_url()
        .ok_or("no [database].url configured")?;
    let history = PostgresHistory::connect(
        url,
        config.database_connect_timeout(),
        config.database_statement_timeout(),
    )?;
    tracing::info!("History database connected");

    let ml = HttpMlClient::new(config.ml_base_url(), config.ml_timeout())?;
    tracing::info!(
        base_url = config.ml_base_url(),
        timeout_ms = config.ml_timeout().as_millis(),
        "ML client configured"
    );

    Ok(AppState::new(Arc::new(history), Arc::new(ml)))
}
