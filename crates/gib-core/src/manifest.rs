//! Manifest assembly: a derived view over the publish directory.
//!
//! The builder parses every `.layer` filename present, groups versions into
//! the nested platform structure, and — only when a `retroarch` platform is
//! present — enriches the document with the downloadable-core listing, or a
//! prior manifest's section when the listing is unreachable.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use gib_schema::manifest::{normalize_series, Manifest};
use gib_schema::{LayerName, LAYER_EXT};

use crate::paths::filename_from_url;

/// Build the manifest for `series_arg` (e.g. `gameimage-2.0.x`) from the
/// layers in `dist_dir`.
///
/// A missing publish directory is fatal; an unparseable layer filename is
/// skipped with a warning; core-listing enrichment failure degrades to the
/// legacy manifest or to no `core` section at all.
pub async fn build_manifest(
    client: &Client,
    dist_dir: &Path,
    series_arg: &str,
    legacy: Option<&Path>,
    cores_url: &str,
) -> Result<Manifest> {
    let names = scan_dist(dist_dir).await?;
    let mut manifest = assemble(&normalize_series(series_arg), &names);

    if manifest.platforms.contains_key("retroarch") {
        enrich_cores(&mut manifest, client, cores_url, legacy).await;
    }

    Ok(manifest)
}

/// Collect and parse the layer names in the publish directory, sorted for
/// deterministic output.
pub async fn scan_dist(dist_dir: &Path) -> Result<Vec<LayerName>> {
    let mut entries = tokio::fs::read_dir(dist_dir)
        .await
        .with_context(|| format!("publish directory missing: {}", dist_dir.display()))?;

    let mut filenames = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(LAYER_EXT) {
            filenames.push(name.to_string());
        }
    }
    filenames.sort();

    let mut names = Vec::new();
    for filename in filenames {
        match LayerName::parse(&filename) {
            Ok(name) => names.push(name),
            Err(err) => tracing::warn!(%filename, "unexpected layer name, skipping: {err}"),
        }
    }
    Ok(names)
}

/// Group parsed layer names into the nested manifest structure.
pub fn assemble(series: &str, names: &[LayerName]) -> Manifest {
    let mut manifest = Manifest::new(series);

    for name in names {
        let entry = manifest
            .platforms
            .entry(name.platform.clone())
            .or_default();
        entry
            .layer
            .entry(name.repo_key())
            .or_default()
            .entry(name.component.clone())
            .or_default()
            .entry(name.channel.to_string())
            .or_default()
            .push(name.version.clone());
    }

    // Newest versions first within every channel list.
    for entry in manifest.platforms.values_mut() {
        for components in entry.layer.values_mut() {
            for channels in components.values_mut() {
                for versions in channels.values_mut() {
                    versions.sort_by(|a, b| version_sort_key(b).cmp(&version_sort_key(a)));
                    versions.dedup();
                }
            }
        }
    }

    manifest
}

/// Numeric-aware sort key: digit runs compare as integers so `2.4.100`
/// outranks `2.4.99`, with the raw string as a deterministic fallback for
/// non-numeric fragments (`wine-9.0`).
fn version_sort_key(version: &str) -> (Vec<u64>, String) {
    let numbers = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(u64::MAX))
        .collect();
    (numbers, version.to_string())
}

async fn enrich_cores(
    manifest: &mut Manifest,
    client: &Client,
    cores_url: &str,
    legacy: Option<&Path>,
) {
    match fetch_core_listing(client, cores_url).await {
        Ok(cores) if !cores.is_empty() => {
            if let Some(entry) = manifest.platforms.get_mut("retroarch") {
                entry.core = Some(Value::from(cores));
            }
            return;
        }
        Ok(_) => tracing::warn!("core listing was empty, trying legacy manifest"),
        Err(err) => tracing::warn!("core listing fetch failed, trying legacy manifest: {err:#}"),
    }

    if let Some(path) = legacy {
        match legacy_core_section(path).await {
            Ok(Some(core)) => {
                if let Some(entry) = manifest.platforms.get_mut("retroarch") {
                    entry.core = Some(core);
                }
                return;
            }
            Ok(None) => tracing::warn!(legacy = %path.display(), "legacy manifest has no core section"),
            Err(err) => tracing::warn!(legacy = %path.display(), "legacy manifest unreadable: {err:#}"),
        }
    }

    // Accepted degraded mode: the manifest ships without a core section.
    tracing::warn!("no core listing available, manifest will omit retroarch.core");
}

/// Scrape the downloadable-core listing from the buildbot cores index.
async fn fetch_core_listing(client: &Client, cores_url: &str) -> Result<Vec<String>> {
    let body = client
        .get(cores_url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .context("cores index fetch failed")?
        .text()
        .await
        .context("cores index body unreadable")?;

    let re = Regex::new(r#"href="([^"]+\.so\.zip)""#).expect("valid regex");
    let cores: BTreeSet<String> = re
        .captures_iter(&body)
        .map(|cap| filename_from_url(&cap[1]).to_string())
        .collect();

    Ok(cores.into_iter().collect())
}

/// Pull the `retroarch.core` value out of a previously published manifest.
async fn legacy_core_section(path: &Path) -> Result<Option<Value>> {
    let text = tokio::fs::read_to_string(path).await?;
    let document: Value = serde_json::from_str(&text)?;
    Ok(document
        .get("retroarch")
        .and_then(|r| r.get("core"))
        .cloned())
}
