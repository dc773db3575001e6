//! Summarizer variants: local CLI models driven over stdin, or an Ollama
//! server reached over HTTP. All configuration flows through `Config`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Opaque summarization capability. Failure is reported, never fatal to the
/// snapshot state machine.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn summarize(&self, prompt: &str) -> AppResult<String>;
}

pub fn pick_summarizer(cfg: &Config) -> AppResult<Box<dyn Summarizer>> {
    match cfg.provider.as_str() {
        "claude_code" => Ok(Box::new(ClaudeCode {
            model: cfg.model.clone(),
        })),
        "gemini_cli" => Ok(Box::new(GeminiCli {
            model: cfg.model.clone(),
        })),
        "ollama" => Ok(Box::new(Ollama::new(&cfg.ollama_host, &cfg.model)?)),
        other => Err(AppError::Config(format!(
            "unknown summarizer provider '{other}'"
        ))),
    }
}

/// Launch a CLI model, feed the prompt on stdin, and collect stdout.
async fn run_with_stdin(program: &str, args: &[&str], prompt: &str) -> AppResult<String> {
    debug!("Launching '{program}' with args {args:?}");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::Summarizer(format!("failed to launch '{program}': {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(prompt.as_bytes()).await?;
        // Dropping stdin closes the pipe so the child sees EOF.
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(AppError::Summarizer(format!(
            "'{program}' failed with args {args:?}: {}, stderr: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8(output.stdout)?)
}

pub struct ClaudeCode {
    model: String,
}

#[async_trait]
impl Summarizer for ClaudeCode {
    fn name(&self) -> &'static str {
        "Claude Code"
    }

    async fn summarize(&self, prompt: &str) -> AppResult<String> {
        run_with_stdin("claude", &["--print", "--model", &self.model], prompt).await
    }
}

pub struct GeminiCli {
    model: String,
}

#[async_trait]
impl Summarizer for GeminiCli {
    fn name(&self) -> &'static str {
        "Gemini CLI"
    }

    async fn summarize(&self, prompt: &str) -> AppResult<String> {
        run_with_stdin("gemini", &["-y", "-m", &self.model], prompt).await
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaModelInfo {
    name: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelInfo>,
}

pub struct Ollama {
    http: reqwest::Client,
    server: String,
    model: String,
}

impl Ollama {
    pub fn new(server: &str, model: &str) -> AppResult<Self> {
        // Generation can legitimately take minutes; only the connect phase is
        // bounded tightly.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Ollama {
            http,
            server: server.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn model_is_pulled(&self) -> AppResult<bool> {
        let url = format!("{}/api/tags", self.server);
        let resp = self.http.get(&url).send().await.map_err(|e| {
            AppError::Summarizer(format!(
                "could not connect to ollama server at '{}': {e}. Is the server running?",
                self.server
            ))
        })?;
        if !resp.status().is_success() {
            return Err(AppError::Summarizer(format!(
                "ollama server returned non-200 status: {}",
                resp.status()
            )));
        }
        let tags: OllamaTagsResponse = resp.json().await?;
        Ok(tags
            .models
            .iter()
            .any(|m| m.name.starts_with(&self.model)))
    }
}

#[async_trait]
impl Summarizer for Ollama {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    #[tracing::instrument(name = "Summarizing with Ollama", level = "debug", skip_all)]
    async fn summarize(&self, prompt: &str) -> AppResult<String> {
        // Check the model has been pulled before sending a large prompt.
        if !self.model_is_pulled().await? {
            return Err(AppError::Summarizer(format!(
                "ollama model '{model}' not found. Please pull it by running 'ollama pull {model}' on the host server.",
                model = self.model
            )));
        }

        let url = format!("{}/api/generate", self.server);
        let resp = self
            .http
            .post(&url)
            .json(&OllamaRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::Summarizer(format!(
                "ollama server returned non-200 status: {}",
                resp.status()
            )));
        }
        let body: OllamaResponse = resp.json().await?;
        Ok(body.response)
    }
}
