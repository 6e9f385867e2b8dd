//! Artifact discovery, download and decompression.
//!
//! Given a workflow run's artifact-listing endpoint, the fetcher discovers
//! the published artifacts, keeps the ones whose names match the repository's
//! filter, downloads each zip payload to a private temporary file and
//! stream-decompresses the expected entry to a second temporary file.
//!
//! Temporary-file hygiene is the load-bearing part of this module: the
//! intermediate zip is always removed, and an artifact's content temporary is
//! removed on every failure path. Both are enforced through RAII
//! ([`tempfile::NamedTempFile`] / [`tempfile::TempPath`]) rather than manual
//! cleanup, so an early `?` cannot leak files.

use std::io::{self, Write};
use std::path::Path;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;
use tracing::{debug, info};
use zip::result::ZipError;

use crate::config::RepositoryProfile;

/// Errors that can occur while fetching artifacts.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A request could not be sent or its body could not be read.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    /// The artifact listing was not the expected JSON shape.
    #[error("invalid artifact listing: {0}")]
    Listing(#[from] serde_json::Error),

    /// The repository's artifact filter does not compile.
    ///
    /// Config validation catches this at startup; it can still surface here
    /// if a profile was constructed another way.
    #[error("invalid artifact filter {pattern:?}: {source}")]
    Filter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The downloaded zip does not contain the entry the listing promised.
    #[error("downloaded zip does not contain {name:?}")]
    MissingEntry { name: String },

    /// The downloaded payload is not a readable zip archive.
    #[error("corrupt zip archive for {name:?}: {source}")]
    Zip {
        name: String,
        #[source]
        source: ZipError,
    },

    /// Temporary file creation or copying failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl FetchError {
    /// A coarse category for failure-status descriptions.
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Http { .. } | FetchError::HttpStatus { .. } | FetchError::Listing(_) => {
                "remote fetch error"
            }
            FetchError::MissingEntry { .. } | FetchError::Zip { .. } => "corrupt artifact",
            FetchError::Io(_) => "filesystem error",
            FetchError::Filter { .. } => "configuration error",
            FetchError::Join(_) => "internal error",
        }
    }
}

/// A remote artifact as advertised by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactDescriptor {
    /// The artifact's declared name, also the name of the single entry
    /// inside its zip payload.
    pub name: String,

    /// Discovery URL; the zip payload lives at `<url>/zip`.
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    artifacts: Vec<ArtifactDescriptor>,
}

/// A fetched and decompressed artifact.
///
/// The content temporary is owned exclusively by this value: storage consumes
/// it on success, and dropping it (on any downstream failure) removes the
/// file from disk.
#[derive(Debug)]
pub struct DownloadedArtifact {
    /// The artifact's original filename.
    pub name: String,

    /// Handle to the decompressed content in a temporary location.
    pub content: TempPath,
}

/// Fetches, filters, downloads and decompresses the artifacts of a workflow
/// run.
///
/// Non-matching artifacts are skipped with a log note. The result preserves
/// listing order; an empty result is a valid, successful outcome.
pub async fn fetch_artifacts(
    http: &Client,
    repository: &RepositoryProfile,
    artifacts_url: &str,
) -> Result<Vec<DownloadedArtifact>, FetchError> {
    let filter = repository
        .artifact_filter()
        .map_err(|source| FetchError::Filter {
            pattern: repository.artifact_regex.clone(),
            source,
        })?;

    let response = http
        .get(artifacts_url)
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: artifacts_url.to_string(),
            source,
        })?;
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus {
            url: artifacts_url.to_string(),
            status: response.status(),
        });
    }
    let bytes = response.bytes().await.map_err(|source| FetchError::Http {
        url: artifacts_url.to_string(),
        source,
    })?;
    let listing: ArtifactListing = serde_json::from_slice(&bytes)?;

    let mut downloaded = Vec::new();
    for descriptor in listing.artifacts {
        if !filter.is_match(&descriptor.name) {
            info!(
                artifact = %descriptor.name,
                filter = %repository.artifact_regex,
                "ignoring artifact that does not match the filter"
            );
            continue;
        }
        downloaded.push(download_artifact(http, repository, &descriptor).await?);
    }

    Ok(downloaded)
}

/// Downloads one artifact's zip payload and extracts the expected entry.
async fn download_artifact(
    http: &Client,
    repository: &RepositoryProfile,
    descriptor: &ArtifactDescriptor,
) -> Result<DownloadedArtifact, FetchError> {
    let url = format!("{}/zip", descriptor.url);
    info!(%url, "downloading artifact");

    let mut zip_temp = NamedTempFile::new()?;
    let mut response = http
        .get(&url)
        .basic_auth(&repository.login_username, Some(&repository.access_token))
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus {
            url,
            status: response.status(),
        });
    }
    while let Some(chunk) = response.chunk().await.map_err(|source| FetchError::Http {
        url: url.clone(),
        source,
    })? {
        zip_temp.as_file_mut().write_all(&chunk)?;
    }
    debug!(artifact = %descriptor.name, "downloaded zip payload");

    // Zip reading is synchronous I/O; keep it off the async workers. The
    // intermediate zip temporary is dropped inside the closure, so it is
    // removed whether or not extraction succeeds.
    let entry_name = descriptor.name.clone();
    let content =
        tokio::task::spawn_blocking(move || extract_entry(zip_temp.path(), &entry_name)).await??;

    debug!(artifact = %descriptor.name, "decompressed artifact");
    Ok(DownloadedArtifact {
        name: descriptor.name.clone(),
        content,
    })
}

/// Extracts the entry named `entry_name` from the archive at `zip_path` into
/// a fresh temporary file.
///
/// The entry is located by name, not by position; a zip without it fails with
/// [`FetchError::MissingEntry`].
fn extract_entry(zip_path: &Path, entry_name: &str) -> Result<TempPath, FetchError> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| FetchError::Zip {
        name: entry_name.to_string(),
        source,
    })?;

    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(FetchError::MissingEntry {
                name: entry_name.to_string(),
            });
        }
        Err(source) => {
            return Err(FetchError::Zip {
                name: entry_name.to_string(),
                source,
            });
        }
    };

    let mut out = NamedTempFile::new()?;
    io::copy(&mut entry, out.as_file_mut())?;
    Ok(out.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn test_profile(artifact_regex: &str) -> RepositoryProfile {
        RepositoryProfile {
            owner: "octocat".to_string(),
            name: "hello-world".to_string(),
            storage_name: None,
            secret: "shhh".to_string(),
            artifact_regex: artifact_regex.to_string(),
            login_username: "octocat".to_string(),
            access_token: "ghp_token".to_string(),
        }
    }

    /// Builds an in-memory zip holding the given entries.
    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    async fn mount_listing(server: &MockServer, artifacts: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "artifacts": artifacts })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn downloads_and_decompresses_matching_artifact() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([{ "name": "build.zip", "url": format!("{}/artifact/1", server.uri()) }]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/artifact/1/zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(zip_bytes(&[("build.zip", b"artifact bytes")])),
            )
            .mount(&server)
            .await;

        let artifacts = fetch_artifacts(
            &Client::new(),
            &test_profile(r"build\.zip"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "build.zip");
        assert_eq!(std::fs::read(&artifacts[0].content).unwrap(), b"artifact bytes");
    }

    #[tokio::test]
    async fn download_uses_basic_auth() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([{ "name": "build.zip", "url": format!("{}/artifact/1", server.uri()) }]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/artifact/1/zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("build.zip", b"x")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        fetch_artifacts(
            &Client::new(),
            &test_profile(r"build\.zip"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap();

        let requests = server.received_requests().await.unwrap();
        let download = requests
            .iter()
            .find(|request| request.url.path() == "/artifact/1/zip")
            .unwrap();
        // "octocat:ghp_token" base64-encoded
        assert_eq!(
            download.headers.get("authorization").unwrap(),
            "Basic b2N0b2NhdDpnaHBfdG9rZW4="
        );
    }

    #[tokio::test]
    async fn non_matching_artifacts_are_skipped_without_download() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([{ "name": "notes.txt", "url": format!("{}/artifact/1", server.uri()) }]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/artifact/1/zip"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let artifacts = fetch_artifacts(
            &Client::new(),
            &test_profile(r"build\.zip"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap();

        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn filter_must_match_the_entire_name() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([{ "name": "prefix-build.zip", "url": format!("{}/artifact/1", server.uri()) }]),
        )
        .await;

        let artifacts = fetch_artifacts(
            &Client::new(),
            &test_profile(r"build\.zip"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap();

        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn preserves_listing_order() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([
                { "name": "b.zip", "url": format!("{}/artifact/1", server.uri()) },
                { "name": "a.zip", "url": format!("{}/artifact/2", server.uri()) },
            ]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/artifact/1/zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("b.zip", b"b")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifact/2/zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("a.zip", b"a")])))
            .mount(&server)
            .await;

        let artifacts = fetch_artifacts(
            &Client::new(),
            &test_profile(r".*\.zip"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap();

        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["b.zip", "a.zip"]);
    }

    #[tokio::test]
    async fn zip_without_expected_entry_is_a_corrupt_artifact() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            json!([{ "name": "build.zip", "url": format!("{}/artifact/1", server.uri()) }]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/artifact/1/zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("unexpected.txt", b"x")])),
            )
            .mount(&server)
            .await;

        let err = fetch_artifacts(
            &Client::new(),
            &test_profile(r"build\.zip"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::MissingEntry { ref name } if name == "build.zip"));
        assert_eq!(err.category(), "corrupt artifact");
    }

    #[tokio::test]
    async fn listing_failure_is_a_remote_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = fetch_artifacts(
            &Client::new(),
            &test_profile(r".*"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::HttpStatus { .. }));
        assert_eq!(err.category(), "remote fetch error");
    }

    #[tokio::test]
    async fn empty_listing_is_success() {
        let server = MockServer::start().await;
        mount_listing(&server, json!([])).await;

        let artifacts = fetch_artifacts(
            &Client::new(),
            &test_profile(r".*"),
            &format!("{}/listing", server.uri()),
        )
        .await
        .unwrap();

        assert!(artifacts.is_empty());
    }

    #[test]
    fn extract_entry_finds_by_name_not_position() {
        let bytes = zip_bytes(&[("first.txt", b"first"), ("wanted.zip", b"wanted bytes")]);
        let mut zip_file = NamedTempFile::new().unwrap();
        zip_file.write_all(&bytes).unwrap();

        let content = extract_entry(zip_file.path(), "wanted.zip").unwrap();
        assert_eq!(std::fs::read(&content).unwrap(), b"wanted bytes");
    }

    #[test]
    fn dropping_a_downloaded_artifact_removes_its_temp_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"content").unwrap();
        let artifact = DownloadedArtifact {
            name: "build.zip".to_string(),
            content: file.into_temp_path(),
        };
        let path = artifact.content.to_path_buf();
        assert!(path.exists());
        drop(artifact);
        assert!(!path.exists());
    }
}
