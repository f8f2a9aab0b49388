//! Streaming downloads with presence-based caching.
//!
//! A download is skipped when the destination file already exists; content
//! is not re-verified. Re-runs are therefore cheap for candidates that
//! already succeeded, and a scheduled re-run picks up whatever failed.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download `url` to `dest` unless `dest` already exists.
///
/// Returns the destination path either way. A partially written file is
/// removed on failure so a later run does not trust it as complete. With
/// `executable` set the file is chmod 0755 after the write (AppImages are
/// run directly for self-extraction).
pub async fn fetch_to_path(
    client: &Client,
    url: &str,
    dest: &Path,
    executable: bool,
) -> Result<PathBuf, DownloadError> {
    if tokio::fs::try_exists(dest).await? {
        tracing::debug!(dest = %dest.display(), "already present, skipping download");
        return Ok(dest.to_path_buf());
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!(%url, dest = %dest.display(), "downloading");

    if let Err(err) = stream_to_file(client, url, dest).await {
        tokio::fs::remove_file(dest).await.ok();
        return Err(err);
    }

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o755)).await?;
    }

    Ok(dest.to_path_buf())
}

async fn stream_to_file(client: &Client, url: &str, dest: &Path) -> Result<(), DownloadError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;

    Ok(())
}
