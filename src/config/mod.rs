//! Configuration loading and the repository registry.
//!
//! The configuration is a YAML file loaded once at process start into an
//! immutable [`Config`] value. It is passed by reference into every component
//! that needs it; no component mutates it.
//!
//! Each monitored repository has a [`RepositoryProfile`] carrying the webhook
//! secret, the artifact filename filter and the credentials used for both
//! artifact downloads and commit status updates. Profiles are looked up
//! case-insensitively by (owner, name).

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid YAML or is missing required fields.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two profiles resolve to the same (owner, name) pair.
    ///
    /// Duplicates are rejected outright rather than letting lookup order
    /// decide which secret wins.
    #[error("duplicate repository in config: {owner}/{name}")]
    DuplicateRepository { owner: String, name: String },

    /// An artifact filter is not a valid regular expression.
    #[error("invalid artifact filter for {repository}: {source}")]
    InvalidFilter {
        repository: String,
        #[source]
        source: regex::Error,
    },
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory under which artifacts are stored.
    pub storage_root: PathBuf,

    /// Public base URL under which stored artifacts are reachable,
    /// e.g. `https://repo.example.dev`. No trailing slash.
    pub base_url: String,

    /// Base URL of the status API. Overridable so tests can point the
    /// publisher at a local server.
    #[serde(default = "default_api_base")]
    pub github_api_base: String,

    /// The monitored repositories.
    pub repositories: Vec<RepositoryProfile>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Configuration for one monitored repository.
///
/// Immutable after load. `Clone` so that background ingestion units can own
/// their copy without borrowing from the shared config.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryProfile {
    /// The repository owner's login.
    pub owner: String,

    /// The repository name.
    pub name: String,

    /// The directory name used under the storage root. Defaults to `name`;
    /// set it when two monitored repositories would otherwise collide.
    #[serde(default)]
    pub storage_name: Option<String>,

    /// Shared secret for webhook signature verification.
    pub secret: String,

    /// Regular expression selecting relevant artifact filenames.
    ///
    /// The filter must match the entire filename, not a substring.
    pub artifact_regex: String,

    /// Username for basic auth against the artifact and status APIs.
    pub login_username: String,

    /// Token for basic auth against the artifact and status APIs.
    pub access_token: String,
}

impl RepositoryProfile {
    /// Returns the `owner/name` form for logging.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Returns the directory name used under the storage root.
    pub fn storage_key(&self) -> &str {
        self.storage_name.as_deref().unwrap_or(&self.name)
    }

    /// Compiles the artifact filter, anchored to match entire filenames.
    pub fn artifact_filter(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!(r"\A(?:{})\z", self.artifact_regex))
    }
}

impl Config {
    /// Loads and validates configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses and validates configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid, if two profiles share an
    /// (owner, name) pair (case-insensitively), or if any artifact filter
    /// fails to compile.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, repo) in self.repositories.iter().enumerate() {
            let duplicate = self.repositories[..i].iter().any(|other| {
                other.owner.eq_ignore_ascii_case(&repo.owner)
                    && other.name.eq_ignore_ascii_case(&repo.name)
            });
            if duplicate {
                return Err(ConfigError::DuplicateRepository {
                    owner: repo.owner.clone(),
                    name: repo.name.clone(),
                });
            }

            if let Err(source) = repo.artifact_filter() {
                return Err(ConfigError::InvalidFilter {
                    repository: repo.full_name(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Resolves the profile for a repository claimed in a webhook payload.
    ///
    /// Matching is case-insensitive on both owner and name. Returns `None`
    /// for unrecognised repositories; the caller ignores those silently
    /// rather than rejecting, so unauthenticated probes cannot learn which
    /// repositories are configured.
    pub fn find_repository(&self, owner: &str, name: &str) -> Option<&RepositoryProfile> {
        self.repositories.iter().find(|repo| {
            repo.owner.eq_ignore_ascii_case(owner) && repo.name.eq_ignore_ascii_case(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
storage_root: /var/lib/artifacts
base_url: https://repo.example.dev
repositories:
  - owner: octocat
    name: hello-world
    secret: shhh
    artifact_regex: "build\\.zip"
    login_username: octocat
    access_token: ghp_token
  - owner: octocat
    name: other-repo
    storage_name: other
    secret: hush
    artifact_regex: ".*\\.jar"
    login_username: octocat
    access_token: ghp_token
"#
    }

    #[test]
    fn parses_sample_config() {
        let config = Config::from_yaml(sample_yaml()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.github_api_base, "https://api.github.com");
        assert_eq!(config.storage_root, PathBuf::from("/var/lib/artifacts"));
        assert_eq!(config.repositories.len(), 2);
    }

    #[test]
    fn storage_key_defaults_to_name() {
        let config = Config::from_yaml(sample_yaml()).unwrap();
        assert_eq!(config.repositories[0].storage_key(), "hello-world");
        assert_eq!(config.repositories[1].storage_key(), "other");
    }

    #[test]
    fn find_repository_is_case_insensitive() {
        let config = Config::from_yaml(sample_yaml()).unwrap();
        let repo = config.find_repository("OctoCat", "Hello-World").unwrap();
        assert_eq!(repo.name, "hello-world");
    }

    #[test]
    fn find_repository_returns_none_for_unknown() {
        let config = Config::from_yaml(sample_yaml()).unwrap();
        assert!(config.find_repository("octocat", "unknown").is_none());
        assert!(config.find_repository("somebody", "hello-world").is_none());
    }

    #[test]
    fn duplicate_repositories_rejected() {
        let yaml = r#"
storage_root: /tmp/artifacts
base_url: https://repo.example.dev
repositories:
  - owner: octocat
    name: hello-world
    secret: a
    artifact_regex: ".*"
    login_username: u
    access_token: t
  - owner: OCTOCAT
    name: Hello-World
    secret: b
    artifact_regex: ".*"
    login_username: u
    access_token: t
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRepository { .. }));
    }

    #[test]
    fn invalid_artifact_filter_rejected() {
        let yaml = r#"
storage_root: /tmp/artifacts
base_url: https://repo.example.dev
repositories:
  - owner: octocat
    name: hello-world
    secret: a
    artifact_regex: "("
    login_username: u
    access_token: t
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFilter { .. }));
    }

    #[test]
    fn artifact_filter_matches_whole_name_only() {
        let config = Config::from_yaml(sample_yaml()).unwrap();
        let filter = config.repositories[0].artifact_filter().unwrap();
        assert!(filter.is_match("build.zip"));
        assert!(!filter.is_match("prefix-build.zip"));
        assert!(!filter.is_match("build.zip.bak"));
    }
}
