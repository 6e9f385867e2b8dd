use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artifact_vault::config::Config;
use artifact_vault::server::{AppState, build_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artifact_vault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let config = match Config::from_file(Path::new(&config_path)) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %config_path, error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(host = %config.host, port = config.port, error = %err, "invalid bind address");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "failed to open artifact storage");
            return ExitCode::FAILURE;
        }
    };

    let app = build_router(state);

    tracing::info!("listening on {}", addr);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
