pub mod catalog;
pub mod emit;
pub mod io;
pub mod manifest;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod select;
pub mod source;

pub use catalog::{Catalog, ReleaseCandidate};
pub use paths::WorkDirs;
pub use pipeline::SourceReport;
pub use source::SourceSpec;

/// User Agent string for all upstream requests
pub const USER_AGENT: &str = concat!("gib/", env!("CARGO_PKG_VERSION"));

/// Default GitHub REST API base.
pub const GITHUB_API: &str = "https://api.github.com";

/// Directory index listing the RetroArch stable releases.
pub const BUILDBOT_STABLE: &str = "https://buildbot.libretro.com/stable/";

/// Directory index listing the downloadable RetroArch cores.
pub const BUILDBOT_CORES: &str = "https://buildbot.libretro.com/nightly/linux/x86_64/latest/";
