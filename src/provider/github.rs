//! GitHub variant. This host has a native cross-fork compare endpoint, so
//! branch divergence is delegated to the API instead of being computed here.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppResult;
use crate::provider::{
    check_response, BranchComparison, ComparisonStatus, GitProvider, PullRequest, Release,
    REQUEST_TIMEOUT,
};

const PROVIDER: &str = "github";
const DEFAULT_API_BASE: &str = "https://api.github.com";

pub struct GithubProvider {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Deserialize)]
struct GhPull {
    title: String,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    user: GhUser,
}

#[derive(Deserialize)]
struct GhRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    html_url: String,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct GhRepo {
    default_branch: String,
}

#[derive(Deserialize)]
struct GhComparison {
    ahead_by: u32,
    behind_by: u32,
    status: ComparisonStatus,
}

impl GithubProvider {
    pub fn new(token: &str) -> AppResult<Self> {
        Self::with_base(token, DEFAULT_API_BASE)
    }

    /// Construct against a non-default API base. Used for self-hosted-style
    /// testing against a mock server.
    pub fn with_base(token: &str, api_base: impl Into<String>) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, HeaderValue::from_static("flightdeck"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(GithubProvider {
            http,
            api_base: api_base.into(),
        })
    }

    async fn default_branch(&self, owner: &str, repo: &str) -> AppResult<String> {
        let url = format!("{}/repos/{owner}/{repo}", self.api_base);
        let resp = check_response(PROVIDER, self.http.get(url).send().await?).await?;
        let info: GhRepo = resp.json().await?;
        Ok(info.default_branch)
    }
}

#[async_trait]
impl GitProvider for GithubProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(name = "Fetching open GitHub PRs", level = "debug", skip(self))]
    async fn open_pull_requests(&self, owner: &str, repo: &str) -> AppResult<Vec<PullRequest>> {
        let url = format!("{}/repos/{owner}/{repo}/pulls", self.api_base);
        let resp = check_response(
            PROVIDER,
            self.http.get(url).query(&[("state", "open")]).send().await?,
        )
        .await?;
        let pulls: Vec<GhPull> = resp.json().await?;
        Ok(pulls
            .into_iter()
            .map(|pr| PullRequest {
                title: pr.title,
                author: pr.user.login,
                description: pr.body.unwrap_or_default(),
                url: pr.html_url,
            })
            .collect())
    }

    #[tracing::instrument(name = "Fetching latest GitHub release", level = "debug", skip(self))]
    async fn latest_release(&self, owner: &str, repo: &str) -> AppResult<Release> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.api_base);
        let resp = self.http.get(url).send().await?;
        // A project without releases answers 4xx; that is context, not failure.
        if resp.status().is_client_error() {
            debug!("No releases found for {owner}/{repo}");
            return Ok(Release::none_found());
        }
        let release: GhRelease = check_response(PROVIDER, resp).await?.json().await?;
        Ok(Release {
            tag_name: release.tag_name,
            name: release.name.unwrap_or_default(),
            url: release.html_url,
            published_at: release.published_at.unwrap_or_default(),
        })
    }

    async fn branch_exists(&self, owner: &str, repo: &str, branch: &str) -> AppResult<bool> {
        let url = format!("{}/repos/{owner}/{repo}/branches/{branch}", self.api_base);
        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_response(PROVIDER, resp).await?;
        Ok(true)
    }

    #[tracing::instrument(
        name = "Comparing branch against upstream default",
        level = "debug",
        skip(self)
    )]
    async fn compare_with_default(
        &self,
        owner: &str,
        repo: &str,
        fork_owner: &str,
        local_branch: &str,
    ) -> AppResult<BranchComparison> {
        let default_branch = self.default_branch(owner, repo).await?;

        if local_branch == default_branch && owner == fork_owner {
            return Ok(BranchComparison::identical());
        }

        let url = format!(
            "{}/repos/{owner}/{repo}/compare/{default_branch}...{fork_owner}:{local_branch}",
            self.api_base
        );
        let resp = check_response(PROVIDER, self.http.get(url).send().await?).await?;
        let cmp: GhComparison = resp.json().await?;
        Ok(BranchComparison {
            ahead_by: cmp.ahead_by,
            behind_by: cmp.behind_by,
            status: cmp.status,
        })
    }
}
