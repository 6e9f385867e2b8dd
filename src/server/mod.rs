//! HTTP server for the artifact archive.
//!
//! This module implements the HTTP server that:
//! - Accepts webhooks from GitHub, validates signatures, and hands completed
//!   workflow runs to a background ingestion task
//! - Serves the stored artifact tree read-only under the public URL scheme
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries
//! - `GET /health` - Returns 200 if the server is running
//! - `GET /<storage key>/<sha8>/<filename>` - Stored artifacts (static files)

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

use crate::config::Config;
use crate::status::StatusPublisher;
use crate::storage::ArtifactStore;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. The
/// configuration inside is immutable for the process lifetime; background
/// ingestion tasks clone the handle, which is a cheap `Arc` bump.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// The loaded configuration, including the repository registry.
    config: Config,

    /// Shared HTTP client for artifact downloads.
    http: reqwest::Client,

    /// On-disk artifact store.
    store: ArtifactStore,

    /// Commit status publisher.
    statuses: StatusPublisher,
}

impl AppState {
    /// Creates the application state from loaded configuration, opening the
    /// artifact store (and creating its root directory) in the process.
    pub fn new(config: Config) -> std::io::Result<Self> {
        let http = reqwest::Client::new();
        let store = ArtifactStore::open(config.storage_root.clone(), config.base_url.clone())?;
        let statuses = StatusPublisher::new(http.clone(), config.github_api_base.clone());
        Ok(AppState {
            inner: Arc::new(AppStateInner {
                config,
                http,
                store,
                statuses,
            }),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Returns the artifact store.
    pub fn store(&self) -> &ArtifactStore {
        &self.inner.store
    }

    /// Returns the status publisher.
    pub fn statuses(&self) -> &StatusPublisher {
        &self.inner.statuses
    }
}

/// Builds the axum Router with all endpoints.
///
/// Unmatched paths fall through to a static file service over the storage
/// root, which realizes the public artifact URL scheme.
pub fn build_router(app_state: AppState) -> Router {
    let artifact_files = ServeDir::new(app_state.store().root());

    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .fallback_service(artifact_files)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
