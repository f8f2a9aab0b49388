//! Upstream release catalogs.
//!
//! Two catalog shapes cover every source: the paginated GitHub release-list
//! API and a plain directory-index scrape. Both yield a flat candidate list;
//! grouping and truncation happen later in the selector. A catalog failure
//! aborts its source only — the caller moves on to the next source.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use gib_schema::{Channel, VersionKey, VersionPattern};

use crate::paths::filename_from_url;

/// One downloadable release artifact, as discovered in an upstream catalog.
/// Created by a [`Catalog`], consumed once by the selector.
#[derive(Debug, Clone)]
pub struct ReleaseCandidate {
    /// Direct download URL.
    pub url: String,
    /// Filename portion of the URL.
    pub filename: String,
    /// Version extracted from the filename.
    pub version: VersionKey,
    /// Stability classification.
    pub channel: Channel,
}

/// A source of release candidates.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Label used in diagnostics.
    fn label(&self) -> &str;

    /// Fetch the full candidate list from the upstream catalog.
    async fn fetch(&self, client: &Client) -> Result<Vec<ReleaseCandidate>>;
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    browser_download_url: String,
}

/// How a source picks its assets out of a release.
#[derive(Debug, Clone)]
pub enum AssetFilter {
    /// URL ends with the given suffix (`.AppImage`).
    Suffix(&'static str),
    /// URL contains `needle` and none of `exclude` (the bottlesdevs forge,
    /// where one repository hosts several build flavors).
    Contains {
        needle: &'static str,
        exclude: &'static [&'static str],
    },
    /// URL matches a regular expression (the Kron4ek tarball naming).
    Matches(Regex),
}

impl AssetFilter {
    fn accepts(&self, url: &str) -> bool {
        match self {
            Self::Suffix(suffix) => url.ends_with(suffix),
            Self::Contains { needle, exclude } => {
                url.contains(needle) && !exclude.iter().any(|e| url.contains(e))
            }
            Self::Matches(re) => re.is_match(url),
        }
    }
}

/// Paginated release-list catalog for one GitHub repository.
///
/// Draft releases are skipped entirely; prereleases are classified
/// [`Channel::Unstable`]. `GITHUB_TOKEN` is attached when present so large
/// paginated listings do not hit the anonymous rate limit.
#[derive(Debug)]
pub struct GithubReleases {
    api_base: String,
    owner: &'static str,
    repo: &'static str,
    pattern: VersionPattern,
    filter: AssetFilter,
    label: String,
}

impl GithubReleases {
    pub fn new(
        owner: &'static str,
        repo: &'static str,
        pattern: VersionPattern,
        filter: AssetFilter,
    ) -> Self {
        Self {
            api_base: crate::GITHUB_API.to_string(),
            owner,
            repo,
            pattern,
            filter,
            label: format!("github:{owner}/{repo}"),
        }
    }

    /// Override the API base (tests point this at a local server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn accepts(&self, url: &str) -> bool {
        self.filter.accepts(url)
    }
}

const PER_PAGE: usize = 100;

#[async_trait]
impl Catalog for GithubReleases {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<ReleaseCandidate>> {
        let mut candidates = Vec::new();

        for page in 1.. {
            let url = format!(
                "{}/repos/{}/{}/releases?per_page={PER_PAGE}&page={page}",
                self.api_base, self.owner, self.repo
            );
            let mut request = client
                .get(&url)
                .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                request = request.bearer_auth(token);
            }

            let releases: Vec<Release> = request
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .with_context(|| format!("release listing failed: {url}"))?
                .json()
                .await
                .with_context(|| format!("unparseable release listing: {url}"))?;

            let last_page = releases.len() < PER_PAGE;

            for release in releases {
                if release.draft {
                    continue;
                }
                let channel = if release.prerelease {
                    Channel::Unstable
                } else {
                    Channel::Stable
                };

                for asset in release.assets {
                    let url = asset.browser_download_url;
                    if !self.accepts(&url) {
                        continue;
                    }
                    let filename = filename_from_url(&url).to_string();
                    let Some(version) = self.pattern.parse(&filename) else {
                        tracing::warn!(catalog = %self.label, %filename, "no version in filename, dropping");
                        continue;
                    };
                    candidates.push(ReleaseCandidate {
                        url,
                        filename,
                        version,
                        channel,
                    });
                }
            }

            if last_page {
                break;
            }
        }

        Ok(candidates)
    }
}

/// Directory-index catalog for the RetroArch buildbot.
///
/// The stable index is a plain HTML listing; every `major.minor.patch`
/// occurrence is a published version, and each version maps to one fixed
/// artifact path beneath it. The buildbot carries no stability metadata, so
/// everything is [`Channel::Stable`].
#[derive(Debug)]
pub struct BuildbotStable {
    base_url: String,
}

impl BuildbotStable {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            base_url: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Catalog for BuildbotStable {
    fn label(&self) -> &str {
        "buildbot:stable"
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<ReleaseCandidate>> {
        let index = client
            .get(format!("{}/", self.base_url))
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("buildbot index fetch failed")?
            .text()
            .await
            .context("buildbot index body unreadable")?;

        let re = Regex::new(r"\d+\.\d+\.\d+").expect("valid regex");
        let versions: BTreeSet<&str> = re.find_iter(&index).map(|m| m.as_str()).collect();

        let mut candidates = Vec::new();
        for version in versions {
            let Some(key) = VersionPattern::ThreePart.parse(version) else {
                continue;
            };
            candidates.push(ReleaseCandidate {
                url: format!("{}/{version}/linux/x86_64/RetroArch.7z", self.base_url),
                filename: "RetroArch.7z".to_string(),
                version: key,
                channel: Channel::Stable,
            });
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new()
    }

    #[tokio::test]
    async fn github_classifies_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!([
            {
                "draft": true,
                "prerelease": false,
                "assets": [{"browser_download_url": "https://dl/pcsx2-v9.9.9.AppImage"}]
            },
            {
                "draft": false,
                "prerelease": true,
                "assets": [{"browser_download_url": "https://dl/pcsx2-v2.5.1.AppImage"}]
            },
            {
                "draft": false,
                "prerelease": false,
                "assets": [
                    {"browser_download_url": "https://dl/pcsx2-v2.4.407.AppImage"},
                    {"browser_download_url": "https://dl/pcsx2-v2.4.407.tar.xz"},
                    {"browser_download_url": "https://dl/pcsx2-latest.AppImage"}
                ]
            }
        ]);
        let mock = server
            .mock("GET", "/repos/PCSX2/pcsx2/releases")
            .match_query(mockito::Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let catalog = GithubReleases::new(
            "PCSX2",
            "pcsx2",
            VersionPattern::ThreePart,
            AssetFilter::Suffix(".AppImage"),
        )
        .with_api_base(server.url());

        let candidates = catalog.fetch(&client()).await.unwrap();
        mock.assert_async().await;

        // Draft dropped, non-AppImage dropped, versionless name dropped.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].channel, Channel::Unstable);
        assert_eq!(candidates[0].version.parts(), &[2, 5, 1]);
        assert_eq!(candidates[1].channel, Channel::Stable);
        assert_eq!(candidates[1].filename, "pcsx2-v2.4.407.AppImage");
    }

    #[tokio::test]
    async fn github_catalog_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/PCSX2/pcsx2/releases")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let catalog = GithubReleases::new(
            "PCSX2",
            "pcsx2",
            VersionPattern::ThreePart,
            AssetFilter::Suffix(".AppImage"),
        )
        .with_api_base(server.url());

        assert!(catalog.fetch(&client()).await.is_err());
    }

    #[test]
    fn contains_filter_excludes_variants() {
        let filter = AssetFilter::Contains {
            needle: "vaniglia",
            exclude: &["experimental", "cx/vaniglia"],
        };
        assert!(filter.accepts("https://dl/vaniglia-9.0.tar.xz"));
        assert!(!filter.accepts("https://dl/vaniglia-experimental-9.0.tar.xz"));
        assert!(!filter.accepts("https://dl/cx/vaniglia-9.0.tar.xz"));
        assert!(!filter.accepts("https://dl/soda-9.0.tar.xz"));
    }

    #[tokio::test]
    async fn buildbot_scrape_dedups_versions() {
        let mut server = mockito::Server::new_async().await;
        let html = r#"
            <a href="/stable/1.19.1/">1.19.1/</a>
            <a href="/stable/1.19.1/">1.19.1/</a>
            <a href="/stable/1.18.0/">1.18.0/</a>
            <a href="/stable/index.html">index</a>
        "#;
        server
            .mock("GET", "/")
            .with_body(html)
            .create_async()
            .await;

        let catalog = BuildbotStable::new(server.url());
        let candidates = catalog.fetch(&client()).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.channel == Channel::Stable));
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert!(urls[0].ends_with("/1.18.0/linux/x86_64/RetroArch.7z"));
        assert!(urls[1].ends_with("/1.19.1/linux/x86_64/RetroArch.7z"));
    }
}
