//! Runs the configured producers in order and assembles their labeled outputs
//! into a single context snapshot document.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::producers;
use crate::provider::remote::RemoteRef;
use crate::provider::{self, GitProvider};
use crate::repo;

/// Delimiter wrapping one producer's output inside the snapshot document.
fn section(name: &str, output: &str) -> String {
    format!("---CONTEXT FROM: {name} ---\n{output}\n\n")
}

/// Snapshot written on the very first run, before any real context exists.
pub fn placeholder_context(commands: &[String]) -> String {
    let mut out = String::new();
    for command in commands {
        out.push_str(&section(
            command.trim(),
            "First run, no context available yet.",
        ));
    }
    out
}

fn is_provider_backed(name: &str) -> bool {
    matches!(
        name,
        "github_prs" | "gitlab_mrs" | "release" | "git_branch_status"
    )
}

pub struct ContextGatherer<'a> {
    root: PathBuf,
    cfg: &'a Config,
    // Lazily constructed on first need; the failure message is remembered so
    // later provider-backed producers skip without retrying.
    provider: Option<Result<Box<dyn GitProvider>, String>>,
}

impl<'a> ContextGatherer<'a> {
    pub fn new(root: impl Into<PathBuf>, cfg: &'a Config) -> Self {
        ContextGatherer {
            root: root.into(),
            cfg,
            provider: None,
        }
    }

    fn init_provider(&mut self) {
        if self.provider.is_none() {
            let built = repo::primary_remote_url(&self.root)
                .and_then(|url| provider::provider_for_remote(self.cfg, &url))
                .map_err(|e| e.to_string());
            self.provider = Some(built);
        }
    }

    /// Run every configured producer and concatenate the labeled outputs.
    /// Provider-backed producers are skipped when the provider cannot be
    /// initialized; any other failure aborts the whole pass.
    #[tracing::instrument(name = "Gathering project context", level = "info", skip(self))]
    pub async fn gather(&mut self) -> AppResult<String> {
        let mut out = String::new();
        let commands = self.cfg.commands.clone();

        for raw in &commands {
            let name = raw.trim();
            let result = self.run_producer(name).await;
            match result {
                Ok(Some(output)) => out.push_str(&section(name, &output)),
                Ok(None) => continue,
                Err(e) => {
                    return Err(AppError::Producer {
                        name: name.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(out)
    }

    async fn run_producer(&mut self, name: &str) -> AppResult<Option<String>> {
        let output = match name {
            "git_status" => producers::git_status(&self.root).await?,
            "git_log" => producers::git_log(&self.root, 15).await?,
            "git_diff" => producers::git_diff(&self.root).await?,
            "tokei" => producers::tokei_stats(&self.root).await?,
            "ripsecrets" => producers::ripsecrets(&self.root).await?,
            "readme" => producers::readme(&self.root).await?,
            "gitignore" => producers::gitignore(&self.root).await?,
            "git_exclude" => producers::git_exclude(&self.root).await?,
            name if is_provider_backed(name) => return self.remote_section(name).await,
            other => {
                info!("Running generic command '{other}'");
                producers::run_external(&self.root, other).await?
            }
        };
        Ok(Some(output))
    }

    async fn remote_section(&mut self, name: &str) -> AppResult<Option<String>> {
        // The branch status producer can answer locally before touching the
        // provider at all.
        if name == "git_branch_status" && !repo::has_remote_tracking_branch(&self.root) {
            return Ok(Some(
                "Local branch has not been pushed to the remote.".to_string(),
            ));
        }

        self.init_provider();
        let provider = match &self.provider {
            Some(Ok(provider)) => provider.as_ref(),
            Some(Err(cause)) => {
                warn!("Skipping producer '{name}': could not initialize git provider ({cause})");
                return Ok(None);
            }
            None => return Ok(None),
        };

        // PR producers are host-specific; the one for the other host is a
        // silent no-op.
        if (provider.name() == "github" && name == "gitlab_mrs")
            || (provider.name() == "gitlab" && name == "github_prs")
        {
            return Ok(None);
        }

        let remote = RemoteRef::parse(&repo::primary_remote_url(&self.root)?)?;
        info!("Fetching info from {}: {name}", provider.name());

        let output = match name {
            "github_prs" | "gitlab_mrs" => {
                let prs = provider
                    .open_pull_requests(&remote.owner, &remote.repo)
                    .await?;
                if prs.is_empty() {
                    "No open pull/merge requests found.".to_string()
                } else {
                    prs.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n---\n")
                }
            }
            "release" => provider
                .latest_release(&remote.owner, &remote.repo)
                .await?
                .to_string(),
            "git_branch_status" => {
                let local_branch = repo::current_branch(&self.root)?;
                // The fork is whatever origin points at; a missing or
                // unparsable origin falls back to the upstream owner.
                let fork_owner = repo::origin_remote_url(&self.root)
                    .ok()
                    .and_then(|url| RemoteRef::parse(&url).ok())
                    .map(|r| r.owner)
                    .unwrap_or_else(|| remote.owner.clone());
                provider
                    .compare_with_default(&remote.owner, &remote.repo, &fork_owner, &local_branch)
                    .await?
                    .to_string()
            }
            _ => return Ok(None),
        };
        Ok(Some(output))
    }
}
