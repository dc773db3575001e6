use std::path::{Path, PathBuf};

use git2::{BranchType, Repository};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Find the top-level working directory of the repository containing `cwd`.
pub fn find_git_root() -> AppResult<PathBuf> {
    let repo = Repository::discover(".")?;
    let root = repo
        .workdir()
        .ok_or_else(|| AppError::Config("bare repository has no working tree".to_string()))?
        .to_path_buf();
    debug!("Resolved git root to {}", root.display());
    Ok(root)
}

/// URL of the remote the upstream project lives at. An `upstream` remote wins
/// over `origin` so fork-based workflows target the canonical repository.
pub fn primary_remote_url(root: &Path) -> AppResult<String> {
    let repo = Repository::open(root)?;
    for name in ["upstream", "origin"] {
        if let Ok(remote) = repo.find_remote(name) {
            if let Some(url) = remote.url() {
                return Ok(url.trim().to_string());
            }
        }
    }
    Err(AppError::Config(
        "failed to retrieve a URL for the 'upstream' or 'origin' remotes".to_string(),
    ))
}

/// URL of the `origin` remote, which is the fork local branches are pushed to.
pub fn origin_remote_url(root: &Path) -> AppResult<String> {
    let repo = Repository::open(root)?;
    let remote = repo.find_remote("origin")?;
    remote
        .url()
        .map(|url| url.trim().to_string())
        .ok_or_else(|| AppError::Config("the 'origin' remote has no valid URL".to_string()))
}

/// Short name of the currently checked-out branch.
pub fn current_branch(root: &Path) -> AppResult<String> {
    let repo = Repository::open(root)?;
    let head = repo.head()?;
    head.shorthand()
        .map(str::to_string)
        .ok_or_else(|| AppError::Config("HEAD does not point at a named branch".to_string()))
}

/// Whether the current branch has a configured remote-tracking branch.
pub fn has_remote_tracking_branch(root: &Path) -> bool {
    let Ok(repo) = Repository::open(root) else {
        return false;
    };
    let Ok(head) = repo.head() else {
        return false;
    };
    let Some(name) = head.shorthand() else {
        return false;
    };
    repo.find_branch(name, BranchType::Local)
        .and_then(|branch| branch.upstream())
        .is_ok()
}

#[cfg(test)]
mod tests {
    use git2::Signature;
    use tempfile::TempDir;

    use super::*;

    fn init_repo_with_commit(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        repo.set_head("refs/heads/trunk").unwrap();
        {
            let sig = Signature::now("test", "test@example.com").unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn prefers_upstream_remote_over_origin() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo_with_commit(dir.path());
        repo.remote("origin", "git@github.com:fork/project.git")
            .unwrap();
        repo.remote("upstream", "git@github.com:canonical/project.git")
            .unwrap();

        let url = primary_remote_url(dir.path()).unwrap();
        assert_eq!(url, "git@github.com:canonical/project.git");
        let origin = origin_remote_url(dir.path()).unwrap();
        assert_eq!(origin, "git@github.com:fork/project.git");
    }

    #[test]
    fn falls_back_to_origin_when_no_upstream() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo_with_commit(dir.path());
        repo.remote("origin", "https://gitlab.com/team/project.git")
            .unwrap();

        let url = primary_remote_url(dir.path()).unwrap();
        assert_eq!(url, "https://gitlab.com/team/project.git");
    }

    #[test]
    fn errors_without_any_remote() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        assert!(primary_remote_url(dir.path()).is_err());
    }

    #[test]
    fn reports_current_branch() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        assert_eq!(current_branch(dir.path()).unwrap(), "trunk");
    }

    #[test]
    fn fresh_branch_has_no_remote_tracking() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        assert!(!has_remote_tracking_branch(dir.path()));
    }
}
