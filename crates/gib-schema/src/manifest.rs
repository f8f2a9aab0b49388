//! The published manifest document.
//!
//! The manifest is a derived view: it is always regenerable from the set of
//! `.layer` files in the publish directory, plus one external listing call
//! for the RetroArch core add-ons. Platforms map to a `layer` object keyed
//! by `<owner>--<repo>`, then component, then channel, then a list of
//! version strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nested layer index: `<owner>--<repo>` → component → channel → versions.
pub type LayerIndex = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

/// One platform's section of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Versions available per repository/component/channel.
    pub layer: LayerIndex,

    /// RetroArch-only: the downloadable core listing, carried as an opaque
    /// value so a legacy manifest's section can be copied verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<Value>,
}

/// The top-level manifest document (`fetch.json` / `gameimage-<v>.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Release series the manifest belongs to, e.g. `2.0`.
    pub version: String,

    /// Static description of the base container images.
    pub containers: Value,

    /// Per-platform layer sections, sorted by platform key.
    #[serde(flatten)]
    pub platforms: BTreeMap<String, PlatformEntry>,
}

impl Manifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            containers: containers(),
            platforms: BTreeMap::new(),
        }
    }
}

/// The static `containers` section carried verbatim into every manifest.
pub fn containers() -> Value {
    serde_json::json!({ "base": ["alpine"] })
}

/// Normalize the release-series argument: `gameimage-2.0.x` → `2.0`.
pub fn normalize_series(raw: &str) -> String {
    let s = raw.strip_prefix("gameimage-").unwrap_or(raw);
    s.strip_suffix(".x").unwrap_or(s).to_string()
}
