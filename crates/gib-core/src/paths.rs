//! Path layout for one pipeline run.
//!
//! Every stage takes explicit paths rooted here; the process working
//! directory is never changed.

use std::io;
use std::path::{Path, PathBuf};

/// The two directories a run owns: a scratch `build/` tree, recreated at the
/// start of every run, and a flat `dist/` publish tree that accumulates
/// layers and checksums across runs.
///
/// A run assumes exclusive ownership of both; concurrent runs against the
/// same work root are the caller's responsibility to prevent.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    work: PathBuf,
}

impl WorkDirs {
    pub fn new(work: impl Into<PathBuf>) -> Self {
        Self { work: work.into() }
    }

    pub fn work(&self) -> &Path {
        &self.work
    }

    /// Scratch directory for downloads, extraction, and root-tree staging.
    pub fn build(&self) -> PathBuf {
        self.work.join("build")
    }

    /// Publish directory for `.layer` files and their checksums.
    pub fn dist(&self) -> PathBuf {
        self.work.join("dist")
    }

    /// Recreate `build/` from scratch and ensure `dist/` exists.
    pub async fn prepare(&self) -> io::Result<()> {
        let build = self.build();
        if tokio::fs::try_exists(&build).await? {
            tokio::fs::remove_dir_all(&build).await?;
        }
        tokio::fs::create_dir_all(&build).await?;
        tokio::fs::create_dir_all(self.dist()).await?;
        Ok(())
    }
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}
