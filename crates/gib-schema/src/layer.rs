//! Layer identity: the canonical `--`-delimited layer filename.
//!
//! A layer's identity is its filename,
//! `<platform>--<owner>--<repo>--<component>--<channel>--<version>.layer`.
//! The manifest is rebuilt from these names alone, so formatting and parsing
//! must stay exact inverses for any field values free of `--` substrings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Filename extension for emitted layers.
pub const LAYER_EXT: &str = ".layer";

/// Release channel derived from upstream release metadata. Sources without
/// draft/prerelease flags (the wine forges, the RetroArch buildbot) are
/// always [`Channel::Stable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Unstable,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Unstable => "unstable",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = LayerNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Self::Stable),
            "unstable" => Ok(Self::Unstable),
            other => Err(LayerNameError::UnknownChannel(other.to_string())),
        }
    }
}

/// Errors from parsing a layer filename.
#[derive(thiserror::Error, Debug)]
pub enum LayerNameError {
    /// The name does not split into exactly the six mandatory fields.
    #[error("expected 6 `--`-separated fields, got {0}")]
    WrongArity(usize),

    /// One of the six fields is empty.
    #[error("empty field: {0}")]
    EmptyField(&'static str),

    /// The channel field is neither `stable` nor `unstable`.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// The parsed identity of one layer file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerName {
    /// Target platform key, e.g. `pcsx2` or `wine`.
    pub platform: String,
    /// Upstream repository owner, e.g. `PCSX2`.
    pub owner: String,
    /// Upstream repository name, e.g. `pcsx2`.
    pub repo: String,
    /// Component/distribution variant, `main` or a wine build flavor.
    pub component: String,
    /// Release channel.
    pub channel: Channel,
    /// Version string as it appears in the filename.
    pub version: String,
}

const FIELD_LABELS: [&str; 6] = ["platform", "owner", "repo", "component", "channel", "version"];

impl LayerName {
    /// Parse a layer filename (with or without the `.layer` extension).
    pub fn parse(filename: &str) -> Result<Self, LayerNameError> {
        let stem = filename.strip_suffix(LAYER_EXT).unwrap_or(filename);
        let fields: Vec<&str> = stem.split("--").collect();
        if fields.len() != 6 {
            return Err(LayerNameError::WrongArity(fields.len()));
        }
        for (field, label) in fields.iter().zip(FIELD_LABELS) {
            if field.is_empty() {
                return Err(LayerNameError::EmptyField(label));
            }
        }

        Ok(Self {
            platform: fields[0].to_string(),
            owner: fields[1].to_string(),
            repo: fields[2].to_string(),
            component: fields[3].to_string(),
            channel: fields[4].parse()?,
            version: fields[5].to_string(),
        })
    }

    /// The full filename, extension included.
    pub fn filename(&self) -> String {
        format!(
            "{}--{}--{}--{}--{}--{}{LAYER_EXT}",
            self.platform, self.owner, self.repo, self.component, self.channel, self.version
        )
    }

    /// The `<owner>--<repo>` key the manifest groups layers under.
    pub fn repo_key(&self) -> String {
        format!("{}--{}", self.owner, self.repo)
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}
