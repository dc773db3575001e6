//! Built-in local context producers and the generic command runner they share.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Run a program in `dir` and return its stdout, failing on a non-zero exit.
pub async fn run_command(dir: &Path, program: &str, args: &[&str]) -> AppResult<String> {
    debug!("Running '{program}' with args {args:?}");
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| AppError::Command {
            command: program.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(AppError::Command {
            command: program.to_string(),
            detail: format!(
                "{}, stderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(String::from_utf8(output.stdout)?)
}

/// Run an arbitrary command line through the shell, capturing combined output.
pub async fn run_external(dir: &Path, command_line: &str) -> AppResult<String> {
    debug!("Running generic command '{command_line}'");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command_line)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| AppError::Command {
            command: command_line.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(AppError::Command {
            command: command_line.to_string(),
            detail: format!(
                "{}, stderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}

/// Machine-parsable working tree status via the porcelain format.
pub async fn git_status(root: &Path) -> AppResult<String> {
    run_command(root, "git", &["status", "--porcelain"]).await
}

/// Concise log of the latest `n` commits.
pub async fn git_log(root: &Path, n: usize) -> AppResult<String> {
    let count = n.to_string();
    run_command(
        root,
        "git",
        &["log", "--oneline", "--graph", "--decorate", "-n", &count],
    )
    .await
}

/// Uncommitted changes in the working tree.
pub async fn git_diff(root: &Path) -> AppResult<String> {
    run_command(root, "git", &["diff"]).await
}

/// Code statistics in JSON format.
pub async fn tokei_stats(root: &Path) -> AppResult<String> {
    run_command(root, "tokei", &["--output", "json"]).await
}

/// Potentially leaked secrets. ripsecrets exits 1 when it finds something, so
/// that case carries findings rather than failure.
pub async fn ripsecrets(root: &Path) -> AppResult<String> {
    let output = Command::new("ripsecrets")
        .arg(root)
        .current_dir(root)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| AppError::Command {
            command: "ripsecrets".to_string(),
            detail: e.to_string(),
        })?;

    if output.status.code() == Some(1) {
        return Ok(String::from_utf8(output.stdout)?);
    }
    if output.status.success() {
        return Ok("No secrets leaked.".to_string());
    }
    Err(AppError::Command {
        command: "ripsecrets".to_string(),
        detail: format!(
            "{}, stderr: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ),
    })
}

async fn read_or_placeholder(path: &Path, placeholder: &str) -> AppResult<String> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(placeholder.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// README.md contents, or a placeholder when the project has none.
pub async fn readme(root: &Path) -> AppResult<String> {
    read_or_placeholder(
        &root.join("README.md"),
        "No README.md file provided in this project.",
    )
    .await
}

pub async fn gitignore(root: &Path) -> AppResult<String> {
    read_or_placeholder(&root.join(".gitignore"), "No .gitignore file found.").await
}

pub async fn git_exclude(root: &Path) -> AppResult<String> {
    read_or_placeholder(
        &root.join(".git").join("info").join("exclude"),
        "No .git/info/exclude file found.",
    )
    .await
}
