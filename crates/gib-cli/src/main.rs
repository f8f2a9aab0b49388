//! gib - GameImage layer build system CLI

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(author, version, about = "Build and index GameImage runner layers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build layers for the configured upstream sources
    Build {
        /// Path to the layering tool binary
        layer_tool: PathBuf,

        /// Restrict the run to named sources (pcsx2, rpcs3, retroarch, wine);
        /// repeatable, defaults to all
        #[arg(long)]
        source: Vec<String>,

        /// Work root holding the build/ scratch and dist/ publish directories
        #[arg(long, default_value = ".")]
        work_dir: PathBuf,
    },

    /// Generate the fetch manifest from the layers in the publish directory
    Manifest {
        /// Release series, e.g. gameimage-2.0.x
        series: String,

        /// Work root whose dist/ directory is scanned
        #[arg(long, default_value = ".")]
        work_dir: PathBuf,

        /// Previously published manifest used as the retroarch core fallback
        #[arg(long)]
        legacy: Option<PathBuf>,

        /// Write the manifest here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            layer_tool,
            source,
            work_dir,
        } => cmd::build::build(&layer_tool, &source, &work_dir).await,
        Commands::Manifest {
            series,
            work_dir,
            legacy,
            output,
        } => cmd::manifest::manifest(&series, &work_dir, legacy.as_deref(), output.as_deref()).await,
    }
}
