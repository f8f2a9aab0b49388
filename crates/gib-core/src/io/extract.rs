//! Wrappers around the external extraction tools.
//!
//! Expansion is delegated to tools the build hosts already carry: `tar` for
//! the wine tarballs, `7z` for the RetroArch bundle, and the AppImage's own
//! `--appimage-extract` mode. Each wrapper runs the tool with an explicit
//! working directory and surfaces the tool's stderr on failure.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },
}

async fn run(mut command: Command, tool: &str) -> Result<(), ExtractError> {
    let output = command
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(ExtractError::ToolFailed {
            tool: tool.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Run an AppImage's built-in self-extraction in `cwd`, producing a
/// `squashfs-root/` directory there. The AppImage must already be
/// executable.
pub async fn appimage_extract(appimage: &Path, cwd: &Path) -> Result<(), ExtractError> {
    let mut command = Command::new(appimage);
    command.arg("--appimage-extract").current_dir(cwd);
    run(command, "appimage-extract").await
}

/// Expand a tarball into `dest`, dropping the archive's single leading path
/// component. Compression is whatever `tar` auto-detects (the wine forges
/// ship gz, xz, and zst interchangeably).
pub async fn untar_stripped(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    tokio::fs::create_dir_all(dest).await?;
    let mut command = Command::new("tar");
    command
        .arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .arg("--strip-components=1");
    run(command, "tar").await
}

/// Expand a 7z archive into `dest`.
pub async fn un7z(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    tokio::fs::create_dir_all(dest).await?;
    let mut command = Command::new("7z");
    command.arg("x").arg("-y").arg(archive).current_dir(dest);
    run(command, "7z").await
}
