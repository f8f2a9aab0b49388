//! Invocation-surface tests for the `gib` binary.

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Test context with an isolated work directory.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn gib_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_gib");
        let mut cmd = Command::new(bin_path);
        cmd.current_dir(self.temp_dir.path());
        cmd
    }

    fn work_dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}

#[test]
fn help_lists_subcommands() {
    let ctx = TestContext::new();
    let output = ctx
        .gib_cmd()
        .arg("--help")
        .output()
        .expect("failed to run gib");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("build"));
    assert!(stdout.contains("manifest"));
}

#[test]
fn build_requires_an_existing_layer_tool() {
    let ctx = TestContext::new();
    let output = ctx
        .gib_cmd()
        .args(["build", "/nonexistent/fim-tool"])
        .output()
        .expect("failed to run gib");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a regular file"));

    // Fatal errors fire before any filesystem side effects.
    assert!(!ctx.work_dir().join("build").exists());
    assert!(!ctx.work_dir().join("dist").exists());
}

#[test]
fn build_rejects_unknown_sources() {
    let ctx = TestContext::new();
    let tool = ctx.work_dir().join("fim-tool");
    std::fs::write(&tool, b"#!/bin/sh\n").unwrap();

    let output = ctx
        .gib_cmd()
        .args(["build"])
        .arg(&tool)
        .args(["--source", "dolphin"])
        .output()
        .expect("failed to run gib");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown source"));
}

#[test]
fn manifest_requires_the_publish_directory() {
    let ctx = TestContext::new();
    let output = ctx
        .gib_cmd()
        .args(["manifest", "gameimage-2.0.x"])
        .output()
        .expect("failed to run gib");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("publish directory missing"));
}

#[test]
fn manifest_renders_the_publish_directory() {
    let ctx = TestContext::new();
    let dist = ctx.work_dir().join("dist");
    std::fs::create_dir_all(&dist).unwrap();
    std::fs::write(
        dist.join("pcsx2--PCSX2--pcsx2--main--stable--2.4.12.layer"),
        b"layer",
    )
    .unwrap();

    let output = ctx
        .gib_cmd()
        .args(["manifest", "gameimage-2.0.x"])
        .output()
        .expect("failed to run gib");

    assert!(output.status.success());
    let document: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("manifest is valid JSON");
    assert_eq!(document["version"], "2.0");
    assert_eq!(
        document["pcsx2"]["layer"]["PCSX2--pcsx2"]["main"]["stable"][0],
        "2.4.12"
    );
}
