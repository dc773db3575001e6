//! GitLab variant. The v4 API only exposes per-project commit listings, so
//! cross-fork divergence is computed from commit-identifier sets via the
//! `divergence` module.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppResult;
use crate::provider::divergence::{collect_commits, divergence, CommitPage, CommitPager, PAGE_SIZE};
use crate::provider::{
    check_response, BranchComparison, GitProvider, PullRequest, Release, REQUEST_TIMEOUT,
};

const PROVIDER: &str = "gitlab";

pub struct GitlabProvider {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct GlAuthor {
    username: String,
}

#[derive(Deserialize)]
struct GlMergeRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    web_url: String,
    author: GlAuthor,
}

#[derive(Deserialize)]
struct GlLinks {
    #[serde(rename = "self")]
    self_url: String,
}

#[derive(Deserialize)]
struct GlRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    released_at: Option<String>,
    #[serde(rename = "_links")]
    links: GlLinks,
}

#[derive(Deserialize)]
struct GlProject {
    default_branch: String,
}

#[derive(Deserialize)]
struct GlCommit {
    id: String,
}

/// GitLab addresses projects by a URL-encoded `owner/repo` path.
fn project_id(owner: &str, repo: &str) -> String {
    format!("{owner}%2F{repo}")
}

impl GitlabProvider {
    /// `host_url` is the remote's own host (self-hosted instances included),
    /// e.g. `https://gitlab.example.com`.
    pub fn new(token: &str, host_url: &str) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(token)?;
        auth.set_sensitive(true);
        headers.insert("PRIVATE-TOKEN", auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(GitlabProvider {
            http,
            api_base: format!("{}/api/v4", host_url.trim_end_matches('/')),
        })
    }

    async fn default_branch(&self, owner: &str, repo: &str) -> AppResult<String> {
        let url = format!("{}/projects/{}", self.api_base, project_id(owner, repo));
        let resp = check_response(PROVIDER, self.http.get(url).send().await?).await?;
        let project: GlProject = resp.json().await?;
        Ok(project.default_branch)
    }

    fn commit_pager(&self, owner: &str, repo: &str, branch: &str) -> GitlabCommitPager<'_> {
        GitlabCommitPager {
            http: &self.http,
            api_base: &self.api_base,
            project: project_id(owner, repo),
            branch: branch.to_string(),
        }
    }
}

/// Paginated commit listing for one project ref, following the `x-next-page`
/// response header until it runs out.
struct GitlabCommitPager<'a> {
    http: &'a reqwest::Client,
    api_base: &'a str,
    project: String,
    branch: String,
}

#[async_trait]
impl CommitPager for GitlabCommitPager<'_> {
    async fn page(&self, page: usize) -> AppResult<CommitPage> {
        let url = format!(
            "{}/projects/{}/repository/commits",
            self.api_base, self.project
        );
        let resp = self
            .http
            .get(url)
            .query(&[
                ("ref_name", self.branch.as_str()),
                ("per_page", &PAGE_SIZE.to_string()),
                ("page", &page.to_string()),
            ])
            .send()
            .await?;
        let resp = check_response(PROVIDER, resp).await?;

        let next_page = resp
            .headers()
            .get("x-next-page")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0);
        let commits: Vec<GlCommit> = resp.json().await?;
        Ok(CommitPage {
            ids: commits.into_iter().map(|c| c.id).collect(),
            next_page,
        })
    }
}

#[async_trait]
impl GitProvider for GitlabProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(name = "Fetching open GitLab MRs", level = "debug", skip(self))]
    async fn open_pull_requests(&self, owner: &str, repo: &str) -> AppResult<Vec<PullRequest>> {
        let url = format!(
            "{}/projects/{}/merge_requests",
            self.api_base,
            project_id(owner, repo)
        );
        let resp = check_response(
            PROVIDER,
            self.http
                .get(url)
                .query(&[("state", "opened")])
                .send()
                .await?,
        )
        .await?;
        let mrs: Vec<GlMergeRequest> = resp.json().await?;
        Ok(mrs
            .into_iter()
            .map(|mr| PullRequest {
                title: mr.title,
                author: mr.author.username,
                description: mr.description.unwrap_or_default(),
                url: mr.web_url,
            })
            .collect())
    }

    #[tracing::instrument(name = "Fetching latest GitLab release", level = "debug", skip(self))]
    async fn latest_release(&self, owner: &str, repo: &str) -> AppResult<Release> {
        let url = format!(
            "{}/projects/{}/releases",
            self.api_base,
            project_id(owner, repo)
        );
        let resp = check_response(
            PROVIDER,
            self.http
                .get(url)
                .query(&[("per_page", "1"), ("page", "1")])
                .send()
                .await?,
        )
        .await?;
        let mut releases: Vec<GlRelease> = resp.json().await?;
        let Some(latest) = releases.drain(..).next() else {
            debug!("No releases found for {owner}/{repo}");
            return Ok(Release::none_found());
        };
        Ok(Release {
            tag_name: latest.tag_name,
            name: latest.name.unwrap_or_default(),
            url: latest.links.self_url,
            published_at: latest.released_at.unwrap_or_default(),
        })
    }

    async fn branch_exists(&self, owner: &str, repo: &str, branch: &str) -> AppResult<bool> {
        let url = format!(
            "{}/projects/{}/repository/branches/{branch}",
            self.api_base,
            project_id(owner, repo)
        );
        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_response(PROVIDER, resp).await?;
        Ok(true)
    }

    #[tracing::instrument(
        name = "Computing branch divergence from commit sets",
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

        let upstream_commits =
            collect_commits(&self.commit_pager(owner, repo, &default_branch)).await?;
        let fork_commits =
            collect_commits(&self.commit_pager(fork_owner, repo, local_branch)).await?;

        divergence(&upstream_commits, &fork_commits)
    }
}
