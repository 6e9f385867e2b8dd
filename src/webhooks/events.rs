//! Typed representations of the GitHub webhook events the service handles.
//!
//! The event kind travels in the `X-GitHub-Event` transport header,
//! independently of the body; the body is only parsed once the kind says it
//! is worth parsing. Unsupported kinds and lifecycle actions are represented
//! by catch-all variants and dispatched over explicitly — routing decisions
//! are never raised as errors.

use serde::Deserialize;

use crate::types::Sha;

/// The webhook event kind, parsed from the `X-GitHub-Event` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The handshake GitHub sends when a webhook is first configured.
    Ping,
    /// A workflow run changed state. The only artifact-producing event.
    WorkflowRun,
    /// Anything else; acknowledged and otherwise ignored.
    Other,
}

impl EventKind {
    /// Parses the header value. Unknown kinds map to [`EventKind::Other`].
    pub fn from_header(value: &str) -> Self {
        match value {
            "ping" => EventKind::Ping,
            "workflow_run" => EventKind::WorkflowRun,
            _ => EventKind::Other,
        }
    }
}

/// The body of a `ping` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PingPayload {
    /// GitHub's zen-of-the-day string.
    pub zen: String,
}

/// The lifecycle action of a `workflow_run` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    /// The run was requested.
    Requested,
    /// The run started executing.
    InProgress,
    /// The run finished; artifacts may be available.
    Completed,
    /// Any action this service does not act on.
    #[serde(other)]
    Other,
}

/// The parsed body of a `workflow_run` event.
///
/// Only the fields the pipeline needs are modelled; the rest of GitHub's
/// payload is ignored by serde.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunPayload {
    /// The lifecycle action.
    pub action: RunAction,

    /// The repository the run belongs to, as claimed by the sender.
    /// Untrusted until the signature check passes.
    pub repository: RepositoryIdent,

    /// The workflow run itself.
    pub workflow_run: WorkflowRun,
}

/// Repository identity as it appears in webhook payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryIdent {
    /// The repository name.
    pub name: String,

    /// The repository owner.
    pub owner: OwnerIdent,
}

impl RepositoryIdent {
    /// Returns the `owner/name` form for logging.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// Repository owner identity as it appears in webhook payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerIdent {
    /// The owner's login.
    pub login: String,
}

/// The workflow run fields the pipeline needs.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    /// The head commit SHA the run was executed for.
    pub head_sha: Sha,

    /// URL of the run's artifact listing endpoint.
    pub artifacts_url: String,
}
