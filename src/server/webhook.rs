//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries and dispatches them:
//!
//! - `ping` events are logged and acknowledged.
//! - `workflow_run` events for recognised repositories are authenticated
//!   against the repository's webhook secret; completed runs get a 202
//!   Accepted immediately while the fetch→store→publish sequence runs on a
//!   detached background task.
//! - Everything else is acknowledged with 204 No Content. Unrecognised
//!   repositories are deliberately indistinguishable from ignored events, so
//!   unauthenticated probes cannot learn which repositories are configured.
//!
//! The background task owns its failure handling: any error is caught at its
//! boundary and, if the commit has no stored artifacts yet, reported as a
//! `failure` commit status. Errors never escape to crash the process.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info};

use super::AppState;
use crate::config::RepositoryProfile;
use crate::fetch::{FetchError, fetch_artifacts};
use crate::storage::StorageError;
use crate::types::Sha;
use crate::webhooks::events::{EventKind, PingPayload, RunAction, WorkflowRunPayload};
use crate::webhooks::signature::{SignatureError, verify_signature};

/// Header name for the GitHub event kind.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for the GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that reject a webhook request.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed for a recognised repository.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The body of a `workflow_run` event was not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Signature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidJson(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-GitHub-Event`: Event kind (e.g. "ping", "workflow_run")
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the raw payload
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 204 No Content: Event acknowledged but not actionable
/// - 202 Accepted: Completed run accepted; ingestion continues in background
/// - 400 Bad Request: Malformed JSON body
/// - 401 Unauthorized: Invalid signature for a recognised repository
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    // The event kind travels in a transport header, independent of the body.
    let kind = headers
        .get(HEADER_EVENT)
        .and_then(|value| value.to_str().ok())
        .map(EventKind::from_header)
        .unwrap_or(EventKind::Other);

    match kind {
        EventKind::Ping => {
            match serde_json::from_slice::<PingPayload>(&body) {
                Ok(ping) => info!(target: "zen", "{}", ping.zen),
                Err(err) => debug!(error = %err, "ping payload without a zen string"),
            }
            Ok(StatusCode::NO_CONTENT)
        }
        EventKind::Other => Ok(StatusCode::NO_CONTENT),
        EventKind::WorkflowRun => handle_workflow_run(app_state, &headers, &body).await,
    }
}

async fn handle_workflow_run(
    app_state: AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<StatusCode, WebhookError> {
    let payload: WorkflowRunPayload = serde_json::from_slice(body)?;

    // No signature check for unrecognised repositories: there is no secret to
    // check against, and the silent 204 keeps the configured set unguessable.
    let Some(profile) = app_state
        .config()
        .find_repository(&payload.repository.owner.login, &payload.repository.name)
    else {
        info!(
            repo = %payload.repository.full_name(),
            "ignoring webhook from unrecognised repository"
        );
        return Ok(StatusCode::NO_CONTENT);
    };

    // Verify over the raw body exactly as received; nothing in the parsed
    // payload is trusted beyond routing until this passes.
    let signature_header = headers
        .get(HEADER_SIGNATURE)
        .and_then(|value| value.to_str().ok());
    verify_signature(body, signature_header, profile.secret.as_bytes())?;

    let sha = payload.workflow_run.head_sha.clone();

    if payload.action != RunAction::Completed {
        if !app_state.store().exists(profile, &sha) {
            app_state
                .statuses()
                .publish_pending(profile, &sha, "Waiting for artifacts", None)
                .await;
        }
        debug!(
            repo = %payload.repository.full_name(),
            action = ?payload.action,
            "ignoring workflow_run that has not completed"
        );
        return Ok(StatusCode::NO_CONTENT);
    }

    if !app_state.store().exists(profile, &sha) {
        app_state
            .statuses()
            .publish_pending(profile, &sha, "Downloading artifacts", None)
            .await;
    }

    info!(
        repo = %payload.repository.full_name(),
        sha = %sha,
        "workflow completed, ingesting artifacts"
    );

    // Fire-and-observe: respond 202 now, ingest in the background. The task
    // owns everything it needs so the request can complete immediately.
    let profile = profile.clone();
    let artifacts_url = payload.workflow_run.artifacts_url.clone();
    tokio::spawn(run_ingestion(app_state, profile, sha, artifacts_url));

    Ok(StatusCode::ACCEPTED)
}

/// An error inside the background ingestion unit.
#[derive(Debug, Error)]
enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    fn category(&self) -> &'static str {
        match self {
            IngestError::Fetch(err) => err.category(),
            IngestError::Storage(_) => "storage error",
        }
    }
}

/// The background ingestion unit: fetch, store, publish.
///
/// This is the task's top-level boundary. Every error is caught here; if the
/// commit still has no stored artifacts it becomes a `failure` status, so a
/// redelivery that already succeeded is not masked by a stale failure.
async fn run_ingestion(
    app_state: AppState,
    repository: RepositoryProfile,
    sha: Sha,
    artifacts_url: String,
) {
    if let Err(err) = ingest(&app_state, &repository, &sha, &artifacts_url).await {
        error!(
            repo = %repository.full_name(),
            sha = %sha,
            error = %err,
            "artifact ingestion failed"
        );
        if !app_state.store().exists(&repository, &sha) {
            let description = format!("{}: {}", err.category(), err);
            app_state
                .statuses()
                .publish_failure(&repository, &sha, &description, None)
                .await;
        }
    }
}

async fn ingest(
    app_state: &AppState,
    repository: &RepositoryProfile,
    sha: &Sha,
    artifacts_url: &str,
) -> Result<(), IngestError> {
    let artifacts = fetch_artifacts(app_state.http(), repository, artifacts_url).await?;
    let outcome = app_state.store().submit(repository, sha, artifacts)?;
    app_state
        .statuses()
        .publish_success(repository, sha, &outcome.description, outcome.target_url.as_deref())
        .await;
    Ok(())
}
