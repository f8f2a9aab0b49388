//! Version keys parsed from upstream release filenames.
//!
//! Upstreams encode versions in three shapes: `major.minor.patch` (PCSX2,
//! RetroArch), `major.minor.patch-build` (RPCS3, where the trailing build
//! serial only breaks ties), and `major.minor` (the wine family, whose
//! filename version is used for grouping only).

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static THREE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+)\.(\d+)\.(\d+)").expect("valid regex"));

static THREE_PART_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+)\.(\d+)\.(\d+)-(\d+)").expect("valid regex"));

static TWO_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-](\d+)\.(\d+)").expect("valid regex"));

/// The filename shapes a source can declare for version extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPattern {
    /// `major.minor.patch`, e.g. `pcsx2-v2.4.407-linux.AppImage`.
    ThreePart,
    /// `major.minor.patch-build`, e.g. `rpcs3-v0.0.38-16857_linux64.AppImage`.
    /// The build serial is a tie-break, not an ordering component.
    ThreePartBuild,
    /// `major.minor` preceded by `-` or `_`, e.g. `wine-9.0-amd64.tar.xz`.
    TwoPart,
}

impl VersionPattern {
    /// Extract a [`VersionKey`] from a filename, or `None` when the filename
    /// does not carry a version in this shape. Callers drop unparseable
    /// candidates with a warning; a miss is never fatal.
    pub fn parse(self, filename: &str) -> Option<VersionKey> {
        match self {
            Self::ThreePart => {
                let cap = THREE_PART.captures(filename)?;
                Some(VersionKey::new(
                    vec![int(&cap[1]), int(&cap[2]), int(&cap[3])],
                    None,
                ))
            }
            Self::ThreePartBuild => {
                let cap = THREE_PART_BUILD.captures(filename)?;
                Some(VersionKey::new(
                    vec![int(&cap[1]), int(&cap[2]), int(&cap[3])],
                    Some(int(&cap[4])),
                ))
            }
            Self::TwoPart => {
                let cap = TWO_PART.captures(filename)?;
                Some(VersionKey::new(vec![int(&cap[1]), int(&cap[2])], None))
            }
        }
    }
}

fn int(s: &str) -> u64 {
    // The regexes only capture digit runs; absurdly long runs fall back to
    // u64::MAX rather than panicking.
    s.parse().unwrap_or(u64::MAX)
}

/// An ordered version extracted from a filename: a tuple of numeric
/// components compared lexicographically, plus an optional build serial used
/// only to break ties inside a selection group.
///
/// Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionKey {
    parts: Vec<u64>,
    build: Option<u64>,
}

impl VersionKey {
    pub fn new(parts: Vec<u64>, build: Option<u64>) -> Self {
        Self { parts, build }
    }

    /// The ordered numeric components (`[2, 4, 407]` for `2.4.407`).
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// The trailing build serial, when the source's pattern defines one.
    pub fn build(&self) -> Option<u64> {
        self.build
    }

    /// The first `arity` components, used to bucket candidates into
    /// selection groups.
    pub fn group_key(&self, arity: usize) -> Vec<u64> {
        self.parts[..arity.min(self.parts.len())].to_vec()
    }

    /// The components beyond the group key; within a group the candidate
    /// with the largest rest (then largest build serial) wins.
    pub fn rest(&self, arity: usize) -> &[u64] {
        &self.parts[arity.min(self.parts.len())..]
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Numeric, component-wise comparison: (10,0,0) > (9,9,9). A missing
        // build serial sorts below any present one.
        self.parts
            .cmp(&other.parts)
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dotted = self
            .parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match self.build {
            Some(build) => write!(f, "{dotted}-{build}"),
            None => write!(f, "{dotted}"),
        }
    }
}
