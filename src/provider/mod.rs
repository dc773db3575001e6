//! Polymorphic git-hosting provider abstraction.
//!
//! The two supported hosts expose uneven APIs: GitHub has a native cross-fork
//! compare endpoint, GitLab only lists commits per project, so its variant
//! derives branch divergence from commit-identifier sets (see `divergence`).

pub mod divergence;
pub mod github;
pub mod gitlab;
pub mod remote;

use std::fmt::{self, Display};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::provider::remote::RemoteRef;

/// Sentinel tag used when a project has no releases; valid data, not an error.
pub const NO_RELEASES: &str = "No releases found";

/// Per-request network timeout applied uniformly across both variants.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An open pull/merge request on the upstream project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub title: String,
    pub author: String,
    pub description: String,
    pub url: String,
}

impl Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- {} (by {})\n  URL: {}\n  Body: {}\n",
            self.title, self.author, self.url, self.description
        )
    }
}

/// The most recent release of the upstream project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    pub name: String,
    pub url: String,
    pub published_at: String,
}

impl Release {
    pub fn none_found() -> Self {
        Release {
            tag_name: NO_RELEASES.to_string(),
            name: String::new(),
            url: String::new(),
            published_at: String::new(),
        }
    }
}

impl Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Release {}@{}\n  URL: {}\n\n  Published: {}",
            self.name, self.tag_name, self.url, self.published_at
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    Identical,
    Ahead,
    Behind,
    Diverged,
}

impl Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonStatus::Identical => "identical",
            ComparisonStatus::Ahead => "ahead",
            ComparisonStatus::Behind => "behind",
            ComparisonStatus::Diverged => "diverged",
        };
        write!(f, "{s}")
    }
}

/// How a fork branch relates to the upstream default branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchComparison {
    pub ahead_by: u32,
    pub behind_by: u32,
    pub status: ComparisonStatus,
}

impl BranchComparison {
    /// Status is a pure function of the two counters.
    pub fn from_counts(ahead_by: u32, behind_by: u32) -> Self {
        let status = match (ahead_by, behind_by) {
            (0, 0) => ComparisonStatus::Identical,
            (_, 0) => ComparisonStatus::Ahead,
            (0, _) => ComparisonStatus::Behind,
            _ => ComparisonStatus::Diverged,
        };
        BranchComparison {
            ahead_by,
            behind_by,
            status,
        }
    }

    pub fn identical() -> Self {
        Self::from_counts(0, 0)
    }
}

impl Display for BranchComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Local branch vs main branch:\n  Status: {}\n  AheadBy: {}\n  BehindBy: {}",
            self.status, self.ahead_by, self.behind_by
        )
    }
}

/// Capability set a hosting provider exposes to the context gatherer.
#[async_trait]
pub trait GitProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open_pull_requests(&self, owner: &str, repo: &str) -> AppResult<Vec<PullRequest>>;

    /// Latest release, with "no releases yet" folded into the sentinel value.
    async fn latest_release(&self, owner: &str, repo: &str) -> AppResult<Release>;

    /// Whether `branch` exists on the given project. A 404 is a normal `false`.
    async fn branch_exists(&self, owner: &str, repo: &str, branch: &str) -> AppResult<bool>;

    /// Compare a fork branch against the upstream default branch.
    async fn compare_with_default(
        &self,
        owner: &str,
        repo: &str,
        fork_owner: &str,
        local_branch: &str,
    ) -> AppResult<BranchComparison>;
}

/// Pick and construct the provider variant matching the remote URL. A missing
/// token fails here, before any network call is made.
pub fn provider_for_remote(cfg: &Config, remote_url: &str) -> AppResult<Box<dyn GitProvider>> {
    let remote = RemoteRef::parse(remote_url)?;

    if remote_url.contains("github") {
        if cfg.github_token.is_empty() {
            return Err(AppError::MissingToken(
                "fetching GitHub remote info requires GITHUB_TOKEN to be set".to_string(),
            ));
        }
        return Ok(Box::new(github::GithubProvider::new(&cfg.github_token)?));
    }

    if remote_url.contains("gitlab") {
        if cfg.gitlab_token.is_empty() {
            return Err(AppError::MissingToken(
                "fetching GitLab remote info requires GITLAB_TOKEN to be set".to_string(),
            ));
        }
        let host_url = format!("https://{}", remote.host);
        return Ok(Box::new(gitlab::GitlabProvider::new(
            &cfg.gitlab_token,
            &host_url,
        )?));
    }

    Err(AppError::Config(format!(
        "unsupported git hosting provider for remote '{remote_url}'"
    )))
}

/// Map a non-success response to an `Api` error carrying the body text.
pub(crate) async fn check_response(
    provider: &'static str,
    resp: reqwest::Response,
) -> AppResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(AppError::Api {
        provider,
        status: status.as_u16(),
        message,
    })
}
