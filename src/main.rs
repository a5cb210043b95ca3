use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use globescope_backend::{api::routes::create_router, config::Config, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;
    info!(strategy = ?config.fetch_strategy, "Configuration loaded");

    // Create application state with the real provider-backed components
    let app_state = AppState::from_config(config);

    // Build the router with routes
    let app = create_router(app_state);

    // Create the listener
    let listener = TcpListener::bind(server_addr).await?;

    // Start the server
    info!(%server_addr, "GlobeScope backend listening");
    axum::serve(listener, app).await?;

    Ok(())
}
