//! Layer emission: staged payload → `.layer` artifact + checksum.
//!
//! The emitter assembles the synthetic `root/` overlay tree, invokes the
//! layering tool against it, and removes the tree unconditionally afterward
//! so scratch usage does not grow across candidates. Emission failure is
//! non-fatal to the run; the checksum is a separate always-attempted step
//! whose failure never unwinds the layer it describes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::process::Command;

use gib_schema::LayerName;

use crate::normalize::Normalized;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The layering tool exited non-zero; carries its diagnostic output.
    #[error("layering tool failed: {stderr}")]
    Tool { stderr: String },
}

/// What the layer's `home/` subtree looks like.
#[derive(Debug, Clone, Copy)]
pub enum HomeDir {
    /// No home subtree (wine family).
    None,
    /// An empty `home/<user>/.config` placeholder (PCSX2, RPCS3).
    Empty(&'static str),
    /// The normalized config subtree relocated to `home/<user>/.config`
    /// (RetroArch).
    Relocate(&'static str),
}

/// Assemble the overlay tree for `normalized` and run the layering tool.
///
/// `layer_tool` must be an absolute path: the tool runs with the scratch
/// directory as its working directory so the layer lands there under its
/// canonical filename. Returns the path of the produced layer inside
/// `build_dir`.
pub async fn emit_layer(
    build_dir: &Path,
    normalized: Normalized,
    name: &LayerName,
    home: HomeDir,
    layer_tool: &Path,
) -> Result<PathBuf, EmitError> {
    let root = build_dir.join("root");
    if tokio::fs::try_exists(&root).await? {
        tokio::fs::remove_dir_all(&root).await?;
    }

    let result = stage_and_run(build_dir, &root, normalized, name, home, layer_tool).await;

    // The root tree is removed on success and failure alike.
    if let Err(err) = tokio::fs::remove_dir_all(&root).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(root = %root.display(), %err, "failed to remove staging root");
        }
    }

    result.map(|()| build_dir.join(name.filename()))
}

async fn stage_and_run(
    build_dir: &Path,
    root: &Path,
    normalized: Normalized,
    name: &LayerName,
    home: HomeDir,
    layer_tool: &Path,
) -> Result<(), EmitError> {
    // home/ first: the config subtree still lives inside the payload and
    // must move out before the payload itself moves.
    match home {
        HomeDir::None => {}
        HomeDir::Empty(user) => {
            tokio::fs::create_dir_all(root.join("home").join(user).join(".config")).await?;
        }
        HomeDir::Relocate(user) => {
            let home_dir = root.join("home").join(user);
            tokio::fs::create_dir_all(&home_dir).await?;
            if let Some(config) = &normalized.config {
                tokio::fs::rename(config, home_dir.join(".config")).await?;
            }
        }
    }

    let payload_dest = root
        .join("opt")
        .join("gameimage")
        .join("runners")
        .join(&name.platform)
        .join(&name.owner)
        .join(&name.repo)
        .join(&name.component)
        .join(name.channel.as_str())
        .join(&name.version);
    if let Some(parent) = payload_dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(&normalized.payload, &payload_dest).await?;

    let filename = name.filename();
    tracing::info!(layer = %filename, "creating layer");

    let output = Command::new(layer_tool)
        .arg("fim-layer")
        .arg("create")
        .arg("root")
        .arg(&filename)
        .current_dir(build_dir)
        .env("FIM_DEBUG", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(EmitError::Tool {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Copy a produced layer into the publish directory.
pub async fn publish(layer: &Path, dist_dir: &Path) -> Result<PathBuf, EmitError> {
    tokio::fs::create_dir_all(dist_dir).await?;
    let filename = layer
        .file_name()
        .ok_or_else(|| EmitError::Io(std::io::Error::other("layer path has no filename")))?;
    let dest = dist_dir.join(filename);
    tokio::fs::copy(layer, &dest).await?;
    Ok(dest)
}

/// Compute the layer's SHA-256 and write the `.sha256sum` sidecar next to it
/// in the publish directory, in the standard two-field format.
pub async fn write_checksum(layer: &Path, dist_dir: &Path) -> Result<PathBuf, EmitError> {
    let filename = layer
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EmitError::Io(std::io::Error::other("layer path has no filename")))?
        .to_string();

    let digest = {
        let layer = layer.to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut file = std::fs::File::open(&layer)?;
            let mut hasher = Sha256::new();
            std::io::copy(&mut file, &mut hasher)?;
            Ok(hex::encode(hasher.finalize()))
        })
        .await
        .map_err(|e| EmitError::Io(std::io::Error::other(e)))??
    };

    let sidecar = dist_dir.join(format!("{filename}.sha256sum"));
    tokio::fs::write(&sidecar, format!("{digest}  {filename}\n")).await?;
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gib_schema::Channel;
    use std::os::unix::fs::PermissionsExt;

    fn layer_name() -> LayerName {
        LayerName {
            platform: "pcsx2".to_string(),
            owner: "PCSX2".to_string(),
            repo: "pcsx2".to_string(),
            component: "main".to_string(),
            channel: Channel::Stable,
            version: "2.4.407".to_string(),
        }
    }

    fn staged_payload(build: &Path) -> Normalized {
        let payload = build.join("pcsx2");
        std::fs::create_dir_all(payload.join("bin")).unwrap();
        std::fs::write(payload.join("bin/app"), b"bin").unwrap();
        std::fs::write(payload.join("boot"), b"#!/bin/sh\n").unwrap();
        Normalized {
            payload,
            config: None,
            version: "2.4.407".to_string(),
        }
    }

    fn stub_tool(dir: &Path, script: &str) -> PathBuf {
        let tool = dir.join("fim-tool");
        std::fs::write(&tool, script).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        tool
    }

    #[tokio::test]
    async fn emits_layer_and_removes_root() {
        let tmp = tempfile::tempdir().unwrap();
        let build = tmp.path().join("build");
        std::fs::create_dir_all(&build).unwrap();

        // Records the staged tree, then produces the layer file.
        let tool = stub_tool(
            tmp.path(),
            "#!/bin/sh\nfind \"$3\" -type d | sort > dirs.txt\necho layer > \"$4\"\n",
        );

        let layer = emit_layer(
            &build,
            staged_payload(&build),
            &layer_name(),
            HomeDir::Empty("pcsx2"),
            &tool,
        )
        .await
        .unwrap();

        assert_eq!(
            layer.file_name().unwrap().to_str().unwrap(),
            "pcsx2--PCSX2--pcsx2--main--stable--2.4.407.layer"
        );
        assert!(layer.exists());
        assert!(!build.join("root").exists());
        assert!(!build.join("pcsx2").exists(), "payload was moved into root");

        let dirs = std::fs::read_to_string(build.join("dirs.txt")).unwrap();
        assert!(dirs.contains("root/home/pcsx2/.config"));
        assert!(dirs.contains("root/opt/gameimage/runners/pcsx2/PCSX2/pcsx2/main/stable/2.4.407"));
    }

    #[tokio::test]
    async fn tool_failure_carries_diagnostics_and_cleans_root() {
        let tmp = tempfile::tempdir().unwrap();
        let build = tmp.path().join("build");
        std::fs::create_dir_all(&build).unwrap();

        let tool = stub_tool(tmp.path(), "#!/bin/sh\necho 'no space left' >&2\nexit 1\n");

        let err = emit_layer(
            &build,
            staged_payload(&build),
            &layer_name(),
            HomeDir::None,
            &tool,
        )
        .await
        .unwrap_err();

        match err {
            EmitError::Tool { stderr } => assert!(stderr.contains("no space left")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!build.join("root").exists());
    }

    #[tokio::test]
    async fn config_subtree_is_relocated_to_home() {
        let tmp = tempfile::tempdir().unwrap();
        let build = tmp.path().join("build");
        std::fs::create_dir_all(&build).unwrap();

        let payload = build.join("retroarch");
        std::fs::create_dir_all(payload.join("config/retroarch")).unwrap();
        std::fs::write(payload.join("config/retroarch/retroarch.cfg"), b"cfg").unwrap();
        std::fs::write(payload.join("boot"), b"#!/bin/sh\n").unwrap();
        let normalized = Normalized {
            config: Some(payload.join("config")),
            payload,
            version: "1.19.1".to_string(),
        };

        let tool = stub_tool(
            tmp.path(),
            "#!/bin/sh\nfind \"$3\" -type f | sort > files.txt\necho layer > \"$4\"\n",
        );
        let name = LayerName {
            platform: "retroarch".to_string(),
            owner: "libretro".to_string(),
            repo: "stable".to_string(),
            component: "main".to_string(),
            channel: Channel::Stable,
            version: "1.19.1".to_string(),
        };

        emit_layer(&build, normalized, &name, HomeDir::Relocate("gameimage"), &tool)
            .await
            .unwrap();

        let files = std::fs::read_to_string(build.join("files.txt")).unwrap();
        assert!(files.contains("root/home/gameimage/.config/retroarch/retroarch.cfg"));
        // The config subtree must not remain inside the payload.
        assert!(!files.contains("stable/1.19.1/config/"));
    }

    #[tokio::test]
    async fn checksum_sidecar_matches_content() {
        let tmp = tempfile::tempdir().unwrap();
        let dist = tmp.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();

        let layer = dist.join("a--b--c--d--stable--1.0.layer");
        std::fs::write(&layer, b"layer-bytes").unwrap();

        let sidecar = write_checksum(&layer, &dist).await.unwrap();
        let line = std::fs::read_to_string(&sidecar).unwrap();

        let expected = hex::encode(Sha256::digest(b"layer-bytes"));
        assert_eq!(
            line,
            format!("{expected}  a--b--c--d--stable--1.0.layer\n")
        );
    }
}
