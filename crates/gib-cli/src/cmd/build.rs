//! `gib build` - run the packaging pipeline for every configured source.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};

use gib_core::pipeline::{self, SourceReport};
use gib_core::source::sources;
use gib_core::{WorkDirs, BUILDBOT_STABLE, GITHUB_API};

pub(crate) async fn build(layer_tool: &Path, filters: &[String], work_dir: &Path) -> Result<()> {
    // Fatal pre-flight checks, before any network or filesystem side effects.
    if !layer_tool.is_file() {
        bail!("layering tool is not a regular file: {}", layer_tool.display());
    }
    // The emitter runs the tool with the scratch directory as cwd, so the
    // path must survive that: resolve it up front.
    let layer_tool = layer_tool
        .canonicalize()
        .with_context(|| format!("cannot resolve layering tool path: {}", layer_tool.display()))?;

    let specs = sources();
    for filter in filters {
        if !specs.iter().any(|s| s.name == filter) {
            bail!("unknown source: {filter}");
        }
    }

    let dirs = WorkDirs::new(work_dir);
    dirs.prepare()
        .await
        .with_context(|| format!("cannot prepare work directories under {}", work_dir.display()))?;

    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut reports: Vec<SourceReport> = Vec::new();

    for spec in &specs {
        if !filters.is_empty() && !filters.iter().any(|f| f == spec.name) {
            continue;
        }

        println!();
        println!("  processing {}", spec.label());

        let catalog = spec.catalog(GITHUB_API, BUILDBOT_STABLE);
        let report = pipeline::run_source(&client, spec, catalog.as_ref(), &dirs, &layer_tool).await;

        if report.aborted {
            println!("    catalog unavailable, source skipped");
        } else {
            println!(
                "    {} built, {} failed of {} selected",
                report.built, report.failed, report.attempted
            );
        }
        reports.push(report);
    }

    // Summary
    let built: usize = reports.iter().map(|r| r.built).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let aborted: Vec<&str> = reports
        .iter()
        .filter(|r| r.aborted)
        .map(|r| r.source.as_str())
        .collect();

    println!();
    println!("  summary");
    for source in &aborted {
        println!("    aborted {source}");
    }
    println!(
        "  {} built, {} failed, {} aborted in {:.1}s",
        built,
        failed,
        aborted.len(),
        start.elapsed().as_secs_f64()
    );

    // Per-candidate and per-source failures do not affect the exit status;
    // the next scheduled run retries whatever is still missing.
    Ok(())
}
