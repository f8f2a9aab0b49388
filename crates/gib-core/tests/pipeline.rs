//! End-to-end pipeline test against a mocked upstream.
//!
//! The GitHub catalog, the release artifacts, and the layering tool are all
//! stand-ins: artifacts are shell scripts that emulate AppImage
//! self-extraction, and the tool stub can be told to fail for one candidate
//! to exercise partial-failure isolation.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gib_core::paths::WorkDirs;
use gib_core::{pipeline, source};

/// A fake AppImage: running it with `--appimage-extract` is emulated by the
/// script simply creating `squashfs-root/usr/` in its working directory.
const FAKE_APPIMAGE: &str = "#!/bin/sh\n\
    mkdir -p squashfs-root/usr/bin\n\
    echo pcsx2 > squashfs-root/usr/bin/pcsx2-qt\n";

fn stub_tool(dir: &Path, fail_on: &str) -> PathBuf {
    let tool = dir.join("fim-tool");
    let script = format!(
        "#!/bin/sh\ncase \"$4\" in *{fail_on}*) echo 'synthetic failure' >&2; exit 1;; esac\necho layer > \"$4\"\n"
    );
    std::fs::write(&tool, script).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    tool
}

fn release(server: &str, version: &str, prerelease: bool) -> serde_json::Value {
    serde_json::json!({
        "draft": false,
        "prerelease": prerelease,
        "assets": [
            {"browser_download_url": format!("{server}/dl/pcsx2-v{version}.AppImage")}
        ]
    })
}

#[tokio::test]
async fn failed_candidate_does_not_stop_the_source() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let releases = serde_json::json!([
        release(&base, "2.5.1", false),
        release(&base, "2.4.12", false),
        release(&base, "2.3.9", false),
        release(&base, "2.6.0", true),
    ]);
    server
        .mock("GET", "/repos/PCSX2/pcsx2/releases")
        .match_query(mockito::Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(releases.to_string())
        .create_async()
        .await;
    for version in ["2.5.1", "2.4.12", "2.3.9", "2.6.0"] {
        server
            .mock("GET", format!("/dl/pcsx2-v{version}.AppImage").as_str())
            .with_body(FAKE_APPIMAGE)
            .create_async()
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let dirs = WorkDirs::new(tmp.path());
    dirs.prepare().await.unwrap();

    // The middle stable candidate fails emission; the ones after it must
    // still be attempted and succeed.
    let tool = stub_tool(tmp.path(), "2.4.12");

    let spec = source::sources().into_iter().find(|s| s.name == "pcsx2").unwrap();
    let catalog = spec.catalog(&base, &base);
    let client = reqwest::Client::new();

    let report = pipeline::run_source(&client, &spec, catalog.as_ref(), &dirs, &tool).await;

    assert!(!report.aborted);
    assert_eq!(report.attempted, 4);
    assert_eq!(report.built, 3);
    assert_eq!(report.failed, 1);

    let dist = dirs.dist();
    for name in [
        "pcsx2--PCSX2--pcsx2--main--stable--2.5.1.layer",
        "pcsx2--PCSX2--pcsx2--main--stable--2.3.9.layer",
        "pcsx2--PCSX2--pcsx2--main--unstable--2.6.0.layer",
    ] {
        assert!(dist.join(name).exists(), "missing {name}");
        assert!(
            dist.join(format!("{name}.sha256sum")).exists(),
            "missing checksum for {name}"
        );
    }
    assert!(!dist
        .join("pcsx2--PCSX2--pcsx2--main--stable--2.4.12.layer")
        .exists());

    // The staging root never outlives an attempt, success or failure.
    assert!(!dirs.build().join("root").exists());
}

#[tokio::test]
async fn catalog_outage_aborts_only_this_source() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/repos/PCSX2/pcsx2/releases")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let dirs = WorkDirs::new(tmp.path());
    dirs.prepare().await.unwrap();
    let tool = stub_tool(tmp.path(), "never-matches");

    let spec = source::sources().into_iter().find(|s| s.name == "pcsx2").unwrap();
    let catalog = spec.catalog(&server.url(), &server.url());

    let report =
        pipeline::run_source(&reqwest::Client::new(), &spec, catalog.as_ref(), &dirs, &tool).await;

    assert!(report.aborted);
    assert_eq!(report.attempted, 0);
    assert!(std::fs::read_dir(dirs.dist()).unwrap().next().is_none());
}
