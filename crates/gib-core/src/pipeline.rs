//! The generic per-source pipeline: catalog → selection → per-candidate
//! download, normalization, and emission.
//!
//! Error policy, in decreasing blast radius: a catalog failure aborts its
//! source only; any single candidate's failure is logged and the loop moves
//! on; a checksum failure never unwinds the layer it describes. The run's
//! exit status reflects none of these.

use std::path::Path;

use anyhow::Context;
use reqwest::Client;

use gib_schema::{Channel, LayerName};

use crate::catalog::{Catalog, ReleaseCandidate};
use crate::emit;
use crate::io::download;
use crate::paths::WorkDirs;
use crate::select::select;
use crate::source::SourceSpec;

/// Outcome summary for one source.
#[derive(Debug)]
pub struct SourceReport {
    /// Source label (`pcsx2`, `wine/caffe`, …).
    pub source: String,
    /// Candidates selected for processing.
    pub attempted: usize,
    /// Layers emitted and published.
    pub built: usize,
    /// Candidates that failed at any stage.
    pub failed: usize,
    /// The catalog fetch itself failed; nothing was attempted.
    pub aborted: bool,
}

impl SourceReport {
    fn aborted(source: String) -> Self {
        Self {
            source,
            attempted: 0,
            built: 0,
            failed: 0,
            aborted: true,
        }
    }
}

/// Run one source end to end. Candidates are processed strictly one at a
/// time; there is no overlap between network I/O and extraction across
/// candidates.
pub async fn run_source(
    client: &Client,
    spec: &SourceSpec,
    catalog: &dyn Catalog,
    dirs: &WorkDirs,
    layer_tool: &Path,
) -> SourceReport {
    let label = spec.label();

    let candidates = match catalog.fetch(client).await {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::error!(source = %label, catalog = catalog.label(), "catalog fetch failed: {err:#}");
            return SourceReport::aborted(label);
        }
    };

    if candidates.is_empty() {
        tracing::info!(source = %label, "no candidates found, skipping");
        return SourceReport {
            source: label,
            attempted: 0,
            built: 0,
            failed: 0,
            aborted: false,
        };
    }

    let mut report = SourceReport {
        source: label.clone(),
        attempted: 0,
        built: 0,
        failed: 0,
        aborted: false,
    };

    let build_dir = dirs.build();
    let dist_dir = dirs.dist();

    for (channel, count) in [
        (Channel::Stable, spec.stable_count),
        (Channel::Unstable, spec.unstable_count),
    ] {
        if count == 0 {
            continue;
        }
        let pool: Vec<ReleaseCandidate> = candidates
            .iter()
            .filter(|c| c.channel == channel)
            .cloned()
            .collect();
        if pool.is_empty() {
            continue;
        }

        let selected = select(pool, spec.group_arity, count);
        tracing::info!(
            source = %label,
            %channel,
            selected = selected.len(),
            "processing selected candidates"
        );

        for candidate in selected {
            report.attempted += 1;
            match process_candidate(client, spec, &candidate, &build_dir, &dist_dir, layer_tool)
                .await
            {
                Ok(name) => {
                    tracing::info!(source = %label, layer = %name, "layer published");
                    report.built += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        source = %label,
                        filename = %candidate.filename,
                        "candidate failed, continuing: {err:#}"
                    );
                    report.failed += 1;
                }
            }
        }
    }

    report
}

async fn process_candidate(
    client: &Client,
    spec: &SourceSpec,
    candidate: &ReleaseCandidate,
    build_dir: &Path,
    dist_dir: &Path,
    layer_tool: &Path,
) -> anyhow::Result<LayerName> {
    let dest = spec.normalizer.download_dest(build_dir, candidate);
    download::fetch_to_path(
        client,
        &candidate.url,
        &dest,
        spec.normalizer.wants_executable(),
    )
    .await
    .with_context(|| format!("download failed: {}", candidate.url))?;

    let normalized = spec
        .normalizer
        .normalize(build_dir, &dest, candidate, spec.stage_name, spec.launcher)
        .await
        .context("normalization failed")?;

    let name = LayerName {
        platform: spec.platform.to_string(),
        owner: spec.owner.to_string(),
        repo: spec.repo.to_string(),
        component: spec.component.to_string(),
        channel: candidate.channel,
        version: normalized.version.clone(),
    };

    let layer = emit::emit_layer(build_dir, normalized, &name, spec.home, layer_tool)
        .await
        .context("layer emission failed")?;

    let published = emit::publish(&layer, dist_dir)
        .await
        .context("publishing failed")?;

    // Always attempted after a successful emission; never unwinds the layer.
    if let Err(err) = emit::write_checksum(&published, dist_dir).await {
        tracing::warn!(layer = %name, "checksum failed: {err}");
    }

    Ok(name)
}
