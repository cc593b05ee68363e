//! Local/remote locator resolver.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{StorageError, StorageResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const FALLBACK_MEDIA_NAME: &str = "source.mp4";

/// Check whether a locator names an HTTP(S) resource.
pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// A source media file available on the local filesystem.
///
/// Downloaded media is removed when this value is dropped.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    temp_dir: Option<TempDir>,
}

impl ResolvedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was downloaded into a temporary directory.
    pub fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }
}

/// Resolves transcript and media locators.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    http: reqwest::Client,
}

impl SourceResolver {
    /// Create a resolver with the default request timeout.
    pub fn new() -> StorageResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;
        Ok(Self { http })
    }

    /// Read a text document from a URL or local path.
    pub async fn read_text(&self, locator: &str) -> StorageResult<String> {
        if is_remote(locator) {
            let response = self.get(locator).await?;
            return Ok(response.text().await?);
        }

        let path = existing_file(locator).await?;
        Ok(tokio::fs::read_to_string(path).await?)
    }

    /// Make source media available as a local file.
    ///
    /// Local paths must point at an existing file. URLs are streamed into a
    /// fresh temporary directory, keeping the last path segment as filename.
    pub async fn resolve_media(&self, locator: &str) -> StorageResult<ResolvedSource> {
        if !is_remote(locator) {
            let path = existing_file(locator).await?;
            return Ok(ResolvedSource {
                path,
                temp_dir: None,
            });
        }

        let file_name = media_file_name(locator)?;
        let temp_dir = tempfile::Builder::new()
            .prefix("vatom-source-")
            .tempdir()?;
        let path = temp_dir.path().join(file_name);

        let mut response = self.get(locator).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(url = locator, bytes = written, path = %path.display(), "Downloaded source media");
        Ok(ResolvedSource {
            path,
            temp_dir: Some(temp_dir),
        })
    }

    async fn get(&self, url: &str) -> StorageResult<reqwest::Response> {
        debug!(url, "Fetching remote resource");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::download_failed(format!(
                "{}: HTTP {}",
                url, status
            )));
        }
        Ok(response)
    }
}

async fn existing_file(locator: &str) -> StorageResult<PathBuf> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(StorageError::invalid_locator("empty path"));
    }

    let path = match tokio::fs::canonicalize(trimmed).await {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::not_found(trimmed.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if tokio::fs::metadata(&path).await?.is_file() {
        Ok(path)
    } else {
        Err(StorageError::not_found(path.display().to_string()))
    }
}

fn media_file_name(locator: &str) -> StorageResult<String> {
    let url = Url::parse(locator).map_err(|e| StorageError::invalid_locator(e.to_string()))?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|s| {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
                .collect::<String>()
        })
        .filter(|s| !s.is_empty() && s.chars().any(|c| c != '.'))
        .unwrap_or_else(|| FALLBACK_MEDIA_NAME.to_string());
    Ok(name)
}
