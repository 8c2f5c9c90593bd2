use axum::http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use authgate_api::{build_router, AppState};
use authgate_infrastructure::ReqwestAuthClient;
use authgate_shared::config::AppConfig;
use authgate_shared::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry; the guard flushes the file writer on exit
    let _log_guard = init_telemetry(&config.telemetry)?;

    info!("{} starting ({})...", config.app.name, config.app.env);

    // Backend API client
    let client = match ReqwestAuthClient::new(&config.api) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build backend client: {}", e);
            std::process::exit(1);
        }
    };
    info!("Backend API at {}", config.api.base_url);

    // Build router
    let state = AppState::new(&config, Arc::new(client))?;
    // Outlives the backend timeout so refresh failures surface as redirects
    let app = build_router(state).layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.api.timeout_seconds + 5),
    ));

    // Bind address
    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
