//! Artifact normalization: downloaded release artifact → canonical
//! component directory.
//!
//! Three shapes cover every source. Each drives extraction and directory
//! surgery inside the scratch directory and hands back a staged payload
//! ready for the layer emitter. The launcher script is written into the
//! payload as the final step, so a partially normalized tree is never
//! emitted.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;

use crate::catalog::ReleaseCandidate;
use crate::io::extract::{self, ExtractError};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The expected payload directory is absent after extraction — the
    /// upstream changed its packaging, which must not be ignored silently.
    #[error("payload directory missing after extraction: {0}")]
    MissingPayload(PathBuf),

    /// The RetroArch bundle did not contain the nested AppImage.
    #[error("nested AppImage missing: {0}")]
    MissingAppImage(PathBuf),

    /// `wine --version` failed or produced no output.
    #[error("version probe failed: {0}")]
    VersionProbe(String),
}

/// Launcher script injected into every normalized payload.
#[derive(Debug, Clone, Copy)]
pub struct Launcher {
    /// Destination path relative to the payload directory.
    pub rel_path: &'static str,
    /// Script body, embedded at compile time.
    pub contents: &'static str,
}

/// A normalized component directory plus the metadata the emitter needs.
#[derive(Debug)]
pub struct Normalized {
    /// Staged payload directory, launcher included.
    pub payload: PathBuf,
    /// Config subtree to relocate into the layer's home directory, when the
    /// upstream package carries one.
    pub config: Option<PathBuf>,
    /// Authoritative version string for the layer name.
    pub version: String,
}

/// The per-source normalization shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Self-extracting AppImage with a `usr/` payload (PCSX2, RPCS3).
    AppImage,
    /// Compressed tarball whose extracted binary reports the authoritative
    /// version (the wine family).
    WineTarball,
    /// 7z bundle nesting an AppImage plus a config subtree (RetroArch).
    RetroArch,
}

impl Normalizer {
    /// Where the pipeline downloads this candidate's artifact. RetroArch
    /// artifacts share one upstream filename, so they live in per-version
    /// subdirectories; everything else keys the scratch directory by the
    /// upstream filename directly.
    pub fn download_dest(self, build_dir: &Path, candidate: &ReleaseCandidate) -> PathBuf {
        match self {
            Self::RetroArch => build_dir
                .join(format!("retroarch-{}", candidate.version))
                .join(&candidate.filename),
            Self::AppImage | Self::WineTarball => build_dir.join(&candidate.filename),
        }
    }

    /// AppImages must be executable to self-extract.
    pub fn wants_executable(self) -> bool {
        self == Self::AppImage
    }

    /// Normalize a downloaded artifact into a staged component directory
    /// named `stage_name`, injecting `launcher` last.
    pub async fn normalize(
        self,
        build_dir: &Path,
        artifact: &Path,
        candidate: &ReleaseCandidate,
        stage_name: &str,
        launcher: Launcher,
    ) -> Result<Normalized, NormalizeError> {
        match self {
            Self::AppImage => normalize_appimage(build_dir, artifact, candidate, stage_name, launcher).await,
            Self::WineTarball => normalize_wine(build_dir, artifact, stage_name, launcher).await,
            Self::RetroArch => normalize_retroarch(artifact, candidate, launcher).await,
        }
    }
}

async fn normalize_appimage(
    build_dir: &Path,
    artifact: &Path,
    candidate: &ReleaseCandidate,
    stage_name: &str,
    launcher: Launcher,
) -> Result<Normalized, NormalizeError> {
    let appimage = tokio::fs::canonicalize(artifact).await?;
    extract::appimage_extract(&appimage, build_dir).await?;
    tokio::fs::remove_file(&appimage).await?;

    let squashfs = build_dir.join("squashfs-root");
    let usr = squashfs.join("usr");
    if !tokio::fs::try_exists(&usr).await? {
        return Err(NormalizeError::MissingPayload(usr));
    }

    let staged = build_dir.join(stage_name);
    remove_tree(&staged).await?;
    tokio::fs::rename(&usr, &staged).await?;
    remove_tree(&squashfs).await?;

    write_launcher(&staged, launcher).await?;

    Ok(Normalized {
        payload: staged,
        config: None,
        version: candidate.version.to_string(),
    })
}

async fn normalize_wine(
    build_dir: &Path,
    artifact: &Path,
    stage_name: &str,
    launcher: Launcher,
) -> Result<Normalized, NormalizeError> {
    let staged = build_dir.join(stage_name);
    remove_tree(&staged).await?;
    extract::untar_stripped(artifact, &staged).await?;
    tokio::fs::remove_file(artifact).await?;

    // The upstream filename formats vary and are less trustworthy than the
    // binary's self-report, so the layer is named after `wine --version`.
    let wine_bin = tokio::fs::canonicalize(staged.join("bin").join("wine")).await?;
    let output = Command::new(&wine_bin).arg("--version").output().await?;
    if !output.status.success() {
        return Err(NormalizeError::VersionProbe(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout
        .split_whitespace()
        .next()
        .ok_or_else(|| NormalizeError::VersionProbe("empty --version output".to_string()))?
        .to_string();

    write_launcher(&staged, launcher).await?;

    Ok(Normalized {
        payload: staged,
        config: None,
        version,
    })
}

async fn normalize_retroarch(
    artifact: &Path,
    candidate: &ReleaseCandidate,
    launcher: Launcher,
) -> Result<Normalized, NormalizeError> {
    // download_dest placed the archive in its per-version scratch directory.
    let scratch = artifact
        .parent()
        .ok_or_else(|| NormalizeError::MissingPayload(artifact.to_path_buf()))?
        .to_path_buf();

    extract::un7z(artifact, &scratch).await?;
    tokio::fs::remove_file(artifact).await?;

    let staged = scratch.join("retroarch");
    tokio::fs::create_dir_all(&staged).await?;

    let extracted = scratch.join("RetroArch-Linux-x86_64");
    let nested = extracted.join("RetroArch-Linux-x86_64.AppImage");
    if !tokio::fs::try_exists(&nested).await? {
        return Err(NormalizeError::MissingAppImage(nested));
    }
    let appimage = scratch.join("RetroArch-Linux-x86_64.AppImage");
    tokio::fs::rename(&nested, &appimage).await?;

    // The bundle ships default assets/settings next to the AppImage; they
    // become the layer's home-directory config.
    let config_src = extracted
        .join("RetroArch-Linux-x86_64.AppImage.home")
        .join(".config");
    if tokio::fs::try_exists(&config_src).await? {
        tokio::fs::rename(&config_src, staged.join("config")).await?;
    }
    tokio::fs::remove_dir_all(&extracted).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&appimage, std::fs::Permissions::from_mode(0o755)).await?;
    }

    let appimage = tokio::fs::canonicalize(&appimage).await?;
    extract::appimage_extract(&appimage, &scratch).await?;
    tokio::fs::remove_file(&appimage).await?;

    let squashfs = scratch.join("squashfs-root");
    let usr = squashfs.join("usr");
    if !tokio::fs::try_exists(&usr).await? {
        return Err(NormalizeError::MissingPayload(usr));
    }
    tokio::fs::rename(&usr, staged.join("data")).await?;
    remove_tree(&squashfs).await?;

    write_launcher(&staged, launcher).await?;

    let config = staged.join("config");
    let config = tokio::fs::try_exists(&config).await?.then_some(config);

    Ok(Normalized {
        payload: staged,
        config,
        version: candidate.version.to_string(),
    })
}

/// Remove a path that may be a directory or a symlink (RPCS3 AppImages leave
/// `squashfs-root` behind as a symlink).
async fn remove_tree(path: &Path) -> std::io::Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn write_launcher(payload: &Path, launcher: Launcher) -> std::io::Result<()> {
    let dest = payload.join(launcher.rel_path);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&dest, launcher.contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}
