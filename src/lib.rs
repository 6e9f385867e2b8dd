//! artifact-vault - a webhook-driven archive of GitHub Actions build artifacts.
//!
//! The service receives `workflow_run` webhooks, authenticates them against a
//! per-repository secret, downloads the run's zip-wrapped artifacts, stores
//! them under a `<storage root>/<repository>/<sha8>/` layout and reports the
//! outcome back to GitHub as a commit status.

pub mod config;
pub mod fetch;
pub mod server;
pub mod status;
pub mod storage;
pub mod types;
pub mod webhooks;
