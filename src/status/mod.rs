//! Commit status publishing.
//!
//! Reports pending/success/failure for a commit back to the status API so the
//! outcome of artifact ingestion shows up next to the commit in the provider's
//! UI. Publishing is strictly best-effort: failures are logged and swallowed,
//! and must never make the ingestion pipeline itself fail or retry.

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::RepositoryProfile;
use crate::types::Sha;

/// The context label attached to every status this service publishes.
pub const STATUS_CONTEXT: &str = "repo.arbjerg.dev";

/// The state of a published commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    /// Artifacts are expected or being downloaded.
    Pending,
    /// Artifacts were ingested (or there was nothing relevant to ingest).
    Success,
    /// Ingestion failed before any artifact was stored.
    Failure,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    state: CommitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
    description: &'a str,
    context: &'static str,
}

/// Publishes commit statuses to the status API using per-repository
/// credentials.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    http: Client,
    api_base: String,
}

impl StatusPublisher {
    /// Creates a publisher targeting the given API base URL
    /// (e.g. `https://api.github.com`).
    pub fn new(http: Client, api_base: impl Into<String>) -> Self {
        StatusPublisher {
            http,
            api_base: api_base.into(),
        }
    }

    /// Publishes a `pending` status.
    pub async fn publish_pending(
        &self,
        repository: &RepositoryProfile,
        sha: &Sha,
        description: &str,
        target_url: Option<&str>,
    ) {
        self.publish(repository, sha, CommitState::Pending, description, target_url)
            .await;
    }

    /// Publishes a `success` status.
    pub async fn publish_success(
        &self,
        repository: &RepositoryProfile,
        sha: &Sha,
        description: &str,
        target_url: Option<&str>,
    ) {
        self.publish(repository, sha, CommitState::Success, description, target_url)
            .await;
    }

    /// Publishes a `failure` status.
    pub async fn publish_failure(
        &self,
        repository: &RepositoryProfile,
        sha: &Sha,
        description: &str,
        target_url: Option<&str>,
    ) {
        self.publish(repository, sha, CommitState::Failure, description, target_url)
            .await;
    }

    async fn publish(
        &self,
        repository: &RepositoryProfile,
        sha: &Sha,
        state: CommitState,
        description: &str,
        target_url: Option<&str>,
    ) {
        let url = format!(
            "{}/repos/{}/{}/statuses/{}",
            self.api_base, repository.owner, repository.name, sha
        );
        let request = StatusRequest {
            state,
            target_url,
            description,
            context: STATUS_CONTEXT,
        };

        let result = self
            .http
            .post(&url)
            .basic_auth(&repository.login_username, Some(&repository.access_token))
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => debug!(
                repo = %repository.full_name(),
                sha = %sha,
                state = ?state,
                description,
                "published commit status"
            ),
            // Status reporting is best-effort; the pipeline never fails
            // because a status could not be delivered.
            Err(err) => error!(
                repo = %repository.full_name(),
                sha = %sha,
                error = %err,
                "failed to publish commit status"
            ),
        }
    }
}
