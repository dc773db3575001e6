//! Snapshot persistence and the per-run compare loop: first run writes a
//! placeholder, an unchanged snapshot is a no-op, and a changed one feeds the
//! summarizer. The new snapshot is persisted even when summarization fails so
//! state always advances.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::gatherer;
use crate::knowledge;
use crate::llm::Summarizer;
use crate::prompt::PromptTemplate;

/// Per-repository state directory, created under the git root.
pub const STATE_DIR: &str = ".flightdeck";
const DYNAMIC_CONTEXT_FILE: &str = "dynamic_context.txt";
const STATIC_CONTEXT_FILE: &str = "static_context.txt";

const DEFAULT_TEMPLATE: &str = "You are a helpful project assistant. Your goal is to provide a clear and concise summary of the project's changes.

Summarize the key differences between the PREVIOUS and CURRENT states provided below.

--- PREVIOUS STATE ---
{{PREVIOUS_CONTEXT}}

--- CURRENT STATE ---
{{CURRENT_CONTEXT}}

---
Add a section at the end of your responses labeled 'UNCERTAINTY MAP', where you describe what you're least confident about and what questions would change your opinion.
";

/// Write through a temp file and rename so a crash mid-write cannot leave a
/// half-written file behind.
pub async fn write_atomic(dir: &Path, name: &str, data: &str) -> AppResult<()> {
    fs::create_dir_all(dir).await?;
    let tmp = dir.join(format!(".{name}.tmp"));
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, dir.join(name)).await?;
    Ok(())
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(git_root: &Path) -> Self {
        SnapshotStore {
            dir: git_root.join(STATE_DIR),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.dir
    }

    /// The snapshot persisted by the previous run, if any.
    pub async fn previous(&self) -> AppResult<Option<String>> {
        match fs::read_to_string(self.dir.join(DYNAMIC_CONTEXT_FILE)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn persist(&self, snapshot: &str) -> AppResult<()> {
        write_atomic(&self.dir, DYNAMIC_CONTEXT_FILE, snapshot).await
    }

    /// The prompt template, created with the default on first use.
    pub async fn template(&self) -> AppResult<String> {
        match fs::read_to_string(self.dir.join(STATIC_CONTEXT_FILE)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No prompt template found, creating the default");
                write_atomic(&self.dir, STATIC_CONTEXT_FILE, DEFAULT_TEMPLATE).await?;
                Ok(DEFAULT_TEMPLATE.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Terminal outcome of one compare-and-summarize pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    FirstRun,
    Unchanged,
    Updated { summarized: bool },
}

/// Diff the freshly gathered snapshot against the stored one and react.
#[tracing::instrument(
    name = "Comparing context against the previous run",
    level = "info",
    skip_all
)]
pub async fn compare_and_summarize(
    cfg: &Config,
    git_root: &Path,
    summarizer: &dyn Summarizer,
    current: &str,
) -> AppResult<RunOutcome> {
    let store = SnapshotStore::new(git_root);

    let Some(previous) = store.previous().await? else {
        println!(
            "flightdeck: initializing project, no summary will be generated on this first run."
        );
        store
            .persist(&gatherer::placeholder_context(&cfg.commands))
            .await?;
        return Ok(RunOutcome::FirstRun);
    };

    if previous == current {
        println!("✅ flightdeck: no new updates.");
        return Ok(RunOutcome::Unchanged);
    }

    let template = store.template().await?;
    let mut vars = HashMap::new();
    vars.insert("PREVIOUS_CONTEXT", previous.as_str());
    vars.insert("CURRENT_CONTEXT", current);
    let mut prompt = PromptTemplate::new(&template).render(&vars);

    if cfg.use_knowledge {
        let ledger = match knowledge::read(store.state_dir()).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read the knowledge ledger: {e}");
                "No existing project knowledge found.".to_string()
            }
        };
        prompt.push_str(&knowledge::instructions(&ledger));
    }

    info!(
        "Context has changed, analyzing with {} using '{}'",
        summarizer.name(),
        cfg.model
    );
    let summarized = match summarizer.summarize(&prompt).await {
        Ok(summary) => {
            if cfg.use_knowledge {
                let update = knowledge::extract_update(&summary);
                if !update.is_empty() {
                    match knowledge::write(store.state_dir(), &update).await {
                        Ok(()) => println!("🧠 flightdeck: knowledge ledger updated."),
                        Err(e) => warn!("Could not update the knowledge ledger: {e}"),
                    }
                }
            }
            println!("{summary}");
            true
        }
        Err(e) => {
            warn!("⚠️ Could not generate a summary: {e}");
            false
        }
    };

    // State must advance regardless of summarizer success, otherwise the same
    // diff would be re-analyzed forever.
    store.persist(current).await?;
    println!("flightdeck: context updated.");
    Ok(RunOutcome::Updated { summarized })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn summarize(&self, _prompt: &str) -> AppResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn summarize(&self, _prompt: &str) -> AppResult<String> {
            Err(AppError::Summarizer("model unavailable".to_string()))
        }
    }

    /// Summarizer that records the prompt it was handed.
    struct CapturingSummarizer(std::sync::Mutex<String>);

    #[async_trait]
    impl Summarizer for CapturingSummarizer {
        fn name(&self) -> &'static str {
            "capturing"
        }
        async fn summarize(&self, prompt: &str) -> AppResult<String> {
            *self.0.lock().unwrap() = prompt.to_string();
            Ok("summary".to_string())
        }
    }

    fn test_config() -> Config {
        Config {
            commands: vec!["readme".to_string()],
            github_token: String::new(),
            gitlab_token: String::new(),
            provider: "gemini_cli".to_string(),
            model: "test-model".to_string(),
            ollama_host: String::new(),
            use_knowledge: false,
        }
    }

    #[tokio::test]
    async fn first_run_writes_a_placeholder_and_skips_summarization() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config();

        let outcome = compare_and_summarize(&cfg, dir.path(), &FixedSummarizer("s"), "snapshot")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::FirstRun);

        let stored = SnapshotStore::new(dir.path()).previous().await.unwrap();
        assert_eq!(
            stored.unwrap(),
            "---CONTEXT FROM: readme ---\nFirst run, no context available yet.\n\n"
        );
    }

    #[tokio::test]
    async fn unchanged_snapshot_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config();
        let store = SnapshotStore::new(dir.path());
        store.persist("same").await.unwrap();

        let outcome = compare_and_summarize(&cfg, dir.path(), &FailingSummarizer, "same")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Unchanged);
        assert_eq!(store.previous().await.unwrap().unwrap(), "same");
    }

    #[tokio::test]
    async fn changed_snapshot_is_persisted_even_when_summarization_fails() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config();
        let store = SnapshotStore::new(dir.path());
        store.persist("old").await.unwrap();

        let outcome = compare_and_summarize(&cfg, dir.path(), &FailingSummarizer, "new")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Updated { summarized: false });
        assert_eq!(store.previous().await.unwrap().unwrap(), "new");
    }

    #[tokio::test]
    async fn changed_snapshot_renders_both_contexts_into_the_prompt() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config();
        let store = SnapshotStore::new(dir.path());
        store.persist("the old state").await.unwrap();

        let capturing = CapturingSummarizer(std::sync::Mutex::new(String::new()));
        let outcome = compare_and_summarize(&cfg, dir.path(), &capturing, "the new state")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Updated { summarized: true });

        let prompt = capturing.0.lock().unwrap().clone();
        assert!(prompt.contains("the old state"));
        assert!(prompt.contains("the new state"));
        assert!(!prompt.contains("{{PREVIOUS_CONTEXT}}"));
        assert!(!prompt.contains("{{CURRENT_CONTEXT}}"));
    }

    #[tokio::test]
    async fn knowledge_update_is_extracted_and_written() {
        let dir = TempDir::new().unwrap();
        let mut cfg = test_config();
        cfg.use_knowledge = true;
        let store = SnapshotStore::new(dir.path());
        store.persist("old").await.unwrap();

        const SUMMARY: &str = "Changes look fine.\n\n## KNOWLEDGE UPDATE\n\nThe ingestion path now batches writes to cut fsync pressure.\n";
        let outcome = compare_and_summarize(&cfg, dir.path(), &FixedSummarizer(SUMMARY), "new")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Updated { summarized: true });

        let ledger = tokio::fs::read_to_string(dir.path().join(STATE_DIR).join(knowledge::LEDGER_FILE))
            .await
            .unwrap();
        assert!(ledger.contains("batches writes to cut fsync pressure"));
    }
}
