use std::collections::HashSet;
use std::env;

use tracing::info;

use crate::error::{AppError, AppResult};

/// Producers run on every invocation unless `FLIGHTDECK_COMMANDS` overrides them.
pub const DEFAULT_COMMANDS: &str = "git_status,git_log,readme,git_exclude,gitignore,git_diff,github_prs,gitlab_mrs,release,git_branch_status,tokei,ripsecrets";

/// Runtime configuration, resolved once per invocation from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub commands: Vec<String>,
    pub github_token: String,
    pub gitlab_token: String,
    pub provider: String,
    pub model: String,
    pub ollama_host: String,
    pub use_knowledge: bool,
}

/// Binary a builtin producer shells out to, if any. `None` means the name is
/// not a builtin and should be checked as a command of its own.
fn builtin_binary(name: &str) -> Option<&'static str> {
    match name {
        "git_status" | "git_log" | "git_diff" => Some("git"),
        "tokei" => Some("tokei"),
        "ripsecrets" => Some("ripsecrets"),
        "readme" | "gitignore" | "git_exclude" | "github_prs" | "gitlab_mrs" | "release"
        | "git_branch_status" => Some(""),
        _ => None,
    }
}

fn ensure_binary_installed(bin: &str) -> AppResult<()> {
    which::which(bin)
        .map(|_| ())
        .map_err(|_| AppError::Config(format!("binary '{bin}' not found in $PATH")))
}

impl Config {
    pub fn load() -> AppResult<Self> {
        Self::resolve(|key| env::var(key).ok())
    }

    /// Resolve configuration from a key lookup. Split out from `load` so tests
    /// can inject an environment.
    fn resolve(var: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut provider = var("FLIGHTDECK_PROVIDER").unwrap_or_default();
        if provider.is_empty() {
            provider = "gemini_cli".to_string();
        }

        let mut model = var("FLIGHTDECK_MODEL").unwrap_or_default();
        if model.is_empty() {
            model = match provider.as_str() {
                "gemini_cli" => "gemini-2.5-pro".to_string(),
                "claude_code" => "claude-sonnet-4".to_string(),
                "ollama" => "gemma3n".to_string(),
                _ => model,
            };
        }

        let mut ollama_host = var("OLLAMA_HOST").unwrap_or_default();
        if provider == "ollama" && ollama_host.is_empty() {
            info!("No 'OLLAMA_HOST' provided, defaulting to 'http://localhost:11434'");
            ollama_host = "http://localhost:11434".to_string();
        }

        let commands_str = var("FLIGHTDECK_COMMANDS")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_COMMANDS.to_string());
        let commands: Vec<String> = commands_str
            .split(',')
            .map(|c| c.trim().to_string())
            .collect();

        let mut checked: HashSet<String> = HashSet::new();
        for command in &commands {
            let bin = match builtin_binary(command) {
                Some(bin) => bin.to_string(),
                // Unknown names run as external commands, so their first word
                // must resolve to a binary.
                None => command
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            };
            if !bin.is_empty() && checked.insert(bin.clone()) {
                ensure_binary_installed(&bin)?;
            }
        }

        let use_knowledge = var("FLIGHTDECK_KNOWLEDGE")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "off"))
            .unwrap_or(true);

        Ok(Config {
            commands,
            github_token: var("GITHUB_TOKEN").unwrap_or_default(),
            gitlab_token: var("GITLAB_TOKEN").unwrap_or_default(),
            provider,
            model,
            ollama_host,
            use_knowledge,
        })
    }
}
