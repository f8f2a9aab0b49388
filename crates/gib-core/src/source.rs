//! The source registry: one [`SourceSpec`] per upstream pipeline instance.
//!
//! Five upstreams feed the pipeline: PCSX2 and RPCS3 release AppImages, the
//! RetroArch buildbot, and the two wine forges (bottlesdevs hosts three
//! build flavors in one repository, Kron4ek two more). The generic pipeline
//! is instantiated once per spec; the wine forges expand to one spec per
//! flavor.

use regex::Regex;

use gib_schema::VersionPattern;

use crate::catalog::{AssetFilter, BuildbotStable, Catalog, GithubReleases};
use crate::emit::HomeDir;
use crate::normalize::{Launcher, Normalizer};

const PCSX2_BOOT: &str = include_str!("../scripts/pcsx2-boot.sh");
const RPCS3_BOOT: &str = include_str!("../scripts/rpcs3-boot.sh");
const RETROARCH_BOOT: &str = include_str!("../scripts/retroarch-boot.sh");
const WINE_SH: &str = include_str!("../scripts/wine.sh");

/// Where a source's catalog lives.
#[derive(Debug, Clone, Copy)]
enum CatalogKind {
    Github {
        filter: AssetFilterKind,
    },
    Buildbot,
}

/// Serializable description of the asset filter; turned into an
/// [`AssetFilter`] when the catalog is built.
#[derive(Debug, Clone, Copy)]
enum AssetFilterKind {
    Suffix(&'static str),
    Contains {
        needle: &'static str,
        exclude: &'static [&'static str],
    },
    AmdTarball(&'static str),
}

/// One instantiation of the generic pipeline.
pub struct SourceSpec {
    /// Name used for CLI filtering; the wine flavors share `wine`.
    pub name: &'static str,
    /// Layer-name platform field.
    pub platform: &'static str,
    /// Layer-name owner field.
    pub owner: &'static str,
    /// Layer-name repo field.
    pub repo: &'static str,
    /// Layer-name component field (`main`, or the wine flavor).
    pub component: &'static str,
    /// Version-extraction shape for this source's filenames.
    pub pattern: VersionPattern,
    /// How many leading version components form a selection group.
    pub group_arity: usize,
    /// Number of stable groups to build.
    pub stable_count: usize,
    /// Number of unstable groups to build.
    pub unstable_count: usize,
    /// Normalization shape.
    pub normalizer: Normalizer,
    /// Launcher script injected into the payload.
    pub launcher: Launcher,
    /// Home-subtree policy for the emitted layer.
    pub home: HomeDir,
    /// Directory name the payload is staged under in the scratch dir.
    pub stage_name: &'static str,
    catalog: CatalogKind,
}

impl std::fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSpec")
            .field("platform", &self.platform)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl SourceSpec {
    /// A label distinguishing the wine flavors in logs and summaries.
    pub fn label(&self) -> String {
        if self.component == "main" {
            self.platform.to_string()
        } else {
            format!("{}/{}", self.platform, self.component)
        }
    }

    /// Build this source's catalog. `github_api` and `buildbot_base` are the
    /// upstream endpoints; tests substitute a local server.
    pub fn catalog(&self, github_api: &str, buildbot_base: &str) -> Box<dyn Catalog> {
        match self.catalog {
            CatalogKind::Github { filter } => {
                let filter = match filter {
                    AssetFilterKind::Suffix(suffix) => AssetFilter::Suffix(suffix),
                    AssetFilterKind::Contains { needle, exclude } => {
                        AssetFilter::Contains { needle, exclude }
                    }
                    AssetFilterKind::AmdTarball(flavor) => AssetFilter::Matches(
                        Regex::new(&format!(r".*{flavor}-amd64\.tar\..*")).expect("valid regex"),
                    ),
                };
                Box::new(
                    GithubReleases::new(self.owner, self.repo, self.pattern, filter)
                        .with_api_base(github_api),
                )
            }
            CatalogKind::Buildbot => Box::new(BuildbotStable::new(buildbot_base)),
        }
    }
}

/// All pipeline instances, in build order.
pub fn sources() -> Vec<SourceSpec> {
    let mut specs = vec![
        SourceSpec {
            name: "pcsx2",
            platform: "pcsx2",
            owner: "PCSX2",
            repo: "pcsx2",
            component: "main",
            pattern: VersionPattern::ThreePart,
            group_arity: 2,
            stable_count: 5,
            unstable_count: 5,
            normalizer: Normalizer::AppImage,
            launcher: Launcher {
                rel_path: "boot",
                contents: PCSX2_BOOT,
            },
            home: HomeDir::Empty("pcsx2"),
            stage_name: "pcsx2",
            catalog: CatalogKind::Github {
                filter: AssetFilterKind::Suffix(".AppImage"),
            },
        },
        SourceSpec {
            name: "rpcs3",
            platform: "rpcs3",
            owner: "RPCS3",
            repo: "rpcs3-binaries-linux",
            component: "main",
            pattern: VersionPattern::ThreePartBuild,
            group_arity: 3,
            stable_count: 5,
            unstable_count: 5,
            normalizer: Normalizer::AppImage,
            launcher: Launcher {
                rel_path: "boot",
                contents: RPCS3_BOOT,
            },
            home: HomeDir::Empty("rpcs3"),
            stage_name: "rpcs3",
            catalog: CatalogKind::Github {
                filter: AssetFilterKind::Suffix(".AppImage"),
            },
        },
        SourceSpec {
            name: "retroarch",
            platform: "retroarch",
            owner: "libretro",
            repo: "stable",
            component: "main",
            pattern: VersionPattern::ThreePart,
            group_arity: 2,
            stable_count: 10,
            unstable_count: 0,
            normalizer: Normalizer::RetroArch,
            launcher: Launcher {
                rel_path: "boot",
                contents: RETROARCH_BOOT,
            },
            home: HomeDir::Relocate("gameimage"),
            stage_name: "retroarch",
            catalog: CatalogKind::Buildbot,
        },
    ];

    // bottlesdevs hosts caffe, vaniglia, and soda in one repository; assets
    // are told apart by flavor name, with the experimental and cx builds
    // filtered out.
    for flavor in ["caffe", "vaniglia", "soda"] {
        specs.push(wine_spec(
            flavor,
            "bottlesdevs",
            "wine",
            CatalogKind::Github {
                filter: AssetFilterKind::Contains {
                    needle: flavor,
                    exclude: &["experimental", "cx/vaniglia"],
                },
            },
        ));
    }

    for flavor in ["staging", "tkg"] {
        specs.push(wine_spec(
            flavor,
            "Kron4ek",
            "Wine-Builds",
            CatalogKind::Github {
                filter: AssetFilterKind::AmdTarball(flavor),
            },
        ));
    }

    specs
}

fn wine_spec(
    flavor: &'static str,
    owner: &'static str,
    repo: &'static str,
    catalog: CatalogKind,
) -> SourceSpec {
    SourceSpec {
        name: "wine",
        platform: "wine",
        owner,
        repo,
        component: flavor,
        pattern: VersionPattern::TwoPart,
        group_arity: 1,
        // The wine forges carry no prerelease signal; everything is stable.
        stable_count: 6,
        unstable_count: 0,
        normalizer: Normalizer::WineTarball,
        launcher: Launcher {
            rel_path: "bin/wine.sh",
            contents: WINE_SH,
        },
        home: HomeDir::None,
        stage_name: flavor,
        catalog,
    }
}
