//! github
//!
//! The two remote lookups the policies need: release asset listings for
//! checksum inference and a non-following HEAD request for redirect
//! detection. Both sit behind traits so policies can be driven by fakes.

pub mod client;
pub mod errors;

use async_trait::async_trait;
use serde::Deserialize;

pub use client::GitHubClient;
pub use errors::GitHubError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Source of release metadata.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, GitHubError>;

    /// One page of a release's assets. Pages are 1-based.
    async fn list_release_assets(
        &self,
        owner: &str,
        repo: &str,
        release_id: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ReleaseAsset>, GitHubError>;
}

/// Status and `Location` of an unfollowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResponse {
    /// URL that was requested; relative locations resolve against it.
    pub url: String,
    pub status: u16,
    pub location: Option<String>,
}

/// Issues a single HEAD request for a repository page without following
/// redirects.
#[async_trait]
pub trait RedirectCheck: Send + Sync {
    async fn head(&self, owner: &str, repo: &str) -> Result<HeadResponse, GitHubError>;
}
