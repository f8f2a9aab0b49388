//! `gib manifest` - regenerate the fetch manifest from the publish
//! directory.

use std::path::Path;

use anyhow::Result;

use gib_core::{manifest, WorkDirs, BUILDBOT_CORES};

pub(crate) async fn manifest(
    series: &str,
    work_dir: &Path,
    legacy: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let dirs = WorkDirs::new(work_dir);
    let client = reqwest::Client::new();

    let document =
        manifest::build_manifest(&client, &dirs.dist(), series, legacy, BUILDBOT_CORES).await?;

    let text = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => tokio::fs::write(path, format!("{text}\n")).await?,
        None => println!("{text}"),
    }
    Ok(())
}
