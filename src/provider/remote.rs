use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult};

/// Matches the SSH and HTTPS remote URL shapes, with optional port and
/// optional `.git` suffix. The port is deliberately kept out of the host
/// capture.
static GIT_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ssh://git@|git@|https?://)?([\w.-]+?)(?::\d+)?[:/]([\w.-]+)/([\w.-]+?)(?:\.git)?$")
        .expect("git remote URL regex is valid")
});

/// Host, owner and repository extracted from a remote URL. Derived once per
/// invocation and used as the lookup key for provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl RemoteRef {
    pub fn parse(url: &str) -> AppResult<Self> {
        let captures = GIT_URL_REGEX
            .captures(url.trim())
            .ok_or_else(|| AppError::UrlParse(url.to_string()))?;
        Ok(RemoteRef {
            host: captures[1].to_string(),
            owner: captures[2].to_string(),
            repo: captures[3].to_string(),
        })
    }
}
