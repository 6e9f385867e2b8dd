//! On-disk artifact storage.
//!
//! Artifacts live under `storage_root/<storage key>/<sha8>/<filename>`, where
//! `<sha8>` is the commit's truncated bucket key. Directories are created on
//! demand and never removed. Placement is atomic per file: content is staged
//! into a temporary file inside the destination bucket and renamed over the
//! final name, so no partial file is ever visible at its permanent path and a
//! redelivered artifact replaces the previous one instead of accumulating
//! next to it.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::config::RepositoryProfile;
use crate::fetch::DownloadedArtifact;
use crate::types::Sha;

/// Errors that can occur while persisting artifacts.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Directory creation, staging or rename failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A path component derived from untrusted input is unsafe to place on
    /// disk (path separators, leading dot, empty).
    #[error("unsafe path component: {0:?}")]
    UnsafePath(String),
}

/// The status intent produced by a successful submit.
///
/// Storage decides what the status should say; the caller decides whether and
/// how to publish it. Keeping the two apart keeps storage testable without a
/// network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Human-readable summary of what was stored.
    pub description: String,

    /// Public URL of the stored artifact (one artifact) or of the bucket
    /// listing (several). `None` when nothing relevant was published.
    pub target_url: Option<String>,
}

/// Stores downloaded artifacts under a stable, collision-resistant layout and
/// answers bucket existence queries.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    base_url: String,
}

impl ArtifactStore {
    /// Opens the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>, base_url: impl Into<String>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "using artifact storage root");
        Ok(ArtifactStore {
            root,
            base_url: base_url.into(),
        })
    }

    /// Returns the storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true iff the commit bucket exists and holds at least one
    /// artifact.
    ///
    /// This is an idempotency signal, not a lock: callers use it to decide
    /// whether a commit has been seen, never to serialize access. Staging
    /// temporaries (dot-prefixed) do not count.
    pub fn exists(&self, repository: &RepositoryProfile, sha: &Sha) -> bool {
        let Ok(entries) = fs::read_dir(self.bucket_dir(repository, sha)) else {
            return false;
        };
        entries
            .filter_map(Result::ok)
            .any(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
    }

    /// Persists the artifacts into the commit bucket and returns the status
    /// intent describing the result.
    ///
    /// Directory creation is idempotent. Each artifact is staged inside the
    /// bucket and atomically renamed to `<bucket>/<originalName>`, replacing
    /// any existing file of the same name. The fetcher's temporary files are
    /// consumed; on error, the remaining ones are removed on drop.
    ///
    /// An empty artifact list is a valid, successful submit.
    pub fn submit(
        &self,
        repository: &RepositoryProfile,
        sha: &Sha,
        artifacts: Vec<DownloadedArtifact>,
    ) -> Result<SubmitOutcome, StorageError> {
        validate_component(repository.storage_key())?;
        validate_component(sha.bucket())?;

        let bucket = self.bucket_dir(repository, sha);
        fs::create_dir_all(&bucket)?;

        let mut names = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            validate_component(&artifact.name)?;
            let dest = bucket.join(&artifact.name);

            let mut staged = NamedTempFile::new_in(&bucket)?;
            let mut source = File::open(&artifact.content)?;
            io::copy(&mut source, staged.as_file_mut())?;
            staged
                .persist(&dest)
                .map_err(|err| StorageError::Io(err.error))?;

            info!(path = %dest.display(), "saved artifact");
            names.push(artifact.name);
            // artifact.content drops here, removing the fetcher's temp file
        }

        Ok(self.outcome(repository, sha, &names))
    }

    fn outcome(&self, repository: &RepositoryProfile, sha: &Sha, names: &[String]) -> SubmitOutcome {
        match names {
            [] => SubmitOutcome {
                description: "No relevant artifacts published".to_string(),
                target_url: None,
            },
            [single] => SubmitOutcome {
                description: format!("Stored {}", single),
                target_url: Some(format!(
                    "{}/{}/{}/{}",
                    self.base_url,
                    repository.storage_key(),
                    sha.bucket(),
                    single
                )),
            },
            many => SubmitOutcome {
                description: format!("Stored {}", many.join(", ")),
                target_url: Some(format!(
                    "{}/{}/{}/",
                    self.base_url,
                    repository.storage_key(),
                    sha.bucket()
                )),
            },
        }
    }

    fn bucket_dir(&self, repository: &RepositoryProfile, sha: &Sha) -> PathBuf {
        self.root.join(repository.storage_key()).join(sha.bucket())
    }
}

/// Validates that a name is safe to use as a single path component.
fn validate_component(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.starts_with('.')
    {
        return Err(StorageError::UnsafePath(name.to_string()));
    }
    Ok(())
}
