//! The knowledge ledger: a prepend-only, timestamped markdown file of
//! insights accumulated across runs, plus the heuristic extractor that pulls
//! a bounded "KNOWLEDGE UPDATE" section out of free-form summarizer output.

use std::io::ErrorKind;
use std::path::Path;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::fs;
use tracing::warn;

use crate::error::AppResult;
use crate::snapshot::write_atomic;

pub const LEDGER_FILE: &str = "KNOWLEDGE.md";
const HEADER: &str = "# Project Knowledge";
const PLACEHOLDER_BODY: &str =
    "*This file will be automatically updated with project insights and important context.*";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

fn timestamp() -> AppResult<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(now.format(TIMESTAMP_FORMAT)?)
}

/// Read the ledger, initializing it with the placeholder body when absent.
pub async fn read(state_dir: &Path) -> AppResult<String> {
    let path = state_dir.join(LEDGER_FILE);
    match fs::read_to_string(&path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let initial = format!("{HEADER}\n\n*Last updated: {}*\n\n{PLACEHOLDER_BODY}", timestamp()?);
            write_atomic(state_dir, LEDGER_FILE, &initial).await?;
            Ok(initial)
        }
        Err(e) => Err(e.into()),
    }
}

/// Strip the header and last-updated preamble, leaving the accumulated body.
fn accumulated_body(content: &str) -> String {
    if content.starts_with(HEADER) {
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() >= 3 {
            // Header, blank line, last-updated line.
            return lines[3..].join("\n").trim().to_string();
        }
    }
    content.trim().to_string()
}

/// Prepend a new timestamped entry to the ledger. Existing entries are never
/// reordered or merged; the full history stays readable below the new block.
pub async fn write(state_dir: &Path, new_body: &str) -> AppResult<()> {
    let existing = match fs::read_to_string(state_dir.join(LEDGER_FILE)).await {
        Ok(content) => accumulated_body(&content),
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let ts = timestamp()?;
    let content = if existing.is_empty() || existing == PLACEHOLDER_BODY {
        // First real entry; nothing worth preserving yet.
        format!("{HEADER}\n\n*Last updated: {ts}*\n\n{new_body}")
    } else {
        format!(
            "{HEADER}\n\n*Last updated: {ts}*\n\n## Latest Update ({ts})\n\n{new_body}\n\n---\n\n## Previous Knowledge\n\n{existing}"
        )
    };

    write_atomic(state_dir, LEDGER_FILE, &content).await
}

/// Block appended to the summarization prompt when the ledger is enabled.
pub fn instructions(ledger_content: &str) -> String {
    format!(
        r#"

--- PROJECT KNOWLEDGE ---
{ledger_content}

CRITICAL KNOWLEDGE MANAGEMENT INSTRUCTIONS:
This project maintains a living knowledge base at .flightdeck/KNOWLEDGE.md that must grow over time.

Current knowledge above represents the institutional memory of this project. Your task is to:

1. READ the existing knowledge carefully - it contains important context about the project's evolution
2. ANALYZE the current changes in relation to this existing knowledge
3. If this session reveals any of the following, you MUST include a 'KNOWLEDGE UPDATE' section:
   - New architectural decisions or technology stack changes
   - Important bug fixes or patterns discovered
   - Significant feature additions or modifications
   - Development workflow changes
   - Dependencies or configuration changes
   - Any insights that would help future development sessions

KNOWLEDGE UPDATE format:
- Include a 'KNOWLEDGE UPDATE' section in your response containing ONLY NEW insights
- Focus on what's NEW or CHANGED since the last session
- DO NOT repeat existing knowledge - the system will preserve it automatically
- Organize new insights by: Architecture, Recent Changes, Important Patterns, Development Notes
- Be comprehensive about NEW information that would help future development sessions

Your KNOWLEDGE UPDATE should contain only fresh insights - existing knowledge will be preserved automatically in a timeline format."#
    )
}

enum ScanState {
    Searching,
    Capturing,
}

/// Locate the bounded knowledge-update section inside a summarizer response.
///
/// A heading mentioning "KNOWLEDGE UPDATE" starts capture. Once content has
/// been captured, a level-1 or level-2 heading not mentioning "knowledge"
/// ends it, as does an "UNCERTAINTY MAP" line. Level-3 and deeper
/// subheadings belong to the update itself and never end capture. Results
/// under 50 characters are discarded so a truncated fragment never poisons
/// the ledger.
pub fn extract_update(response: &str) -> String {
    let mut state = ScanState::Searching;
    let mut captured: Vec<&str> = Vec::new();

    for line in response.lines() {
        match state {
            ScanState::Searching => {
                if line.to_uppercase().contains("KNOWLEDGE UPDATE") {
                    state = ScanState::Capturing;
                }
            }
            ScanState::Capturing => {
                let trimmed = line.trim();
                if captured.is_empty() && trimmed.is_empty() {
                    continue;
                }
                let upper = line.to_uppercase();
                // "# " and "## " match their exact heading level; "### " and
                // deeper start with neither prefix.
                let is_section_boundary = (trimmed.starts_with("# ")
                    || trimmed.starts_with("## "))
                    && !upper.contains("KNOWLEDGE");
                if !captured.is_empty()
                    && (upper.contains("UNCERTAINTY MAP") || is_section_boundary)
                {
                    break;
                }
                captured.push(line);
            }
        }
    }

    while captured.last().is_some_and(|l| l.trim().is_empty()) {
        captured.pop();
    }

    let result = captured.join("\n").trim().to_string();
    if result.len() < 50 {
        if !result.is_empty() {
            warn!(
                "Knowledge update too short ({} chars), skipping to prevent data loss",
                result.len()
            );
        }
        return String::new();
    }
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    const LONG_BODY: &str =
        "Foo bar baz: the build moved to a two-stage pipeline with cached artifacts.";

    #[test]
    fn extracts_the_bounded_update_section() {
        let response = format!(
            "Intro text.\n\n## KNOWLEDGE UPDATE\n\n{LONG_BODY}\n\n## Something Else\nIrrelevant"
        );
        assert_eq!(extract_update(&response), LONG_BODY);
    }

    #[test]
    fn short_fragments_are_discarded() {
        let response = "## KNOWLEDGE UPDATE\n\ntoo short\n";
        assert_eq!(extract_update(response), "");
    }

    #[test]
    fn missing_section_yields_empty() {
        assert_eq!(extract_update("No update here at all."), "");
    }

    #[test]
    fn boundary_heading_cuts_even_a_short_capture() {
        let response =
            "## KNOWLEDGE UPDATE\n\nFirst insight line.\n## Next Section\nmore prose\n";
        // The single captured line is under the length floor, so the result
        // is discarded, but the boundary must still have cut "Next Section".
        assert_eq!(extract_update(response), "");

        let response = format!("## KNOWLEDGE UPDATE\n\n{LONG_BODY}\n## Next Section\nmore prose");
        assert_eq!(extract_update(&response), LONG_BODY);
    }

    #[test]
    fn late_nested_subheading_is_kept() {
        let response = format!(
            "## KNOWLEDGE UPDATE\n\n{LONG_BODY}\nsecond line\nthird line\nextra detail line\n\n### Development Notes\nnotes body\n"
        );
        let update = extract_update(&response);
        assert!(update.contains("### Development Notes"));
        assert!(update.contains("notes body"));
    }

    #[test]
    fn early_nested_heading_does_not_truncate() {
        let response = format!(
            "## KNOWLEDGE UPDATE\n\n### Architecture\n{LONG_BODY}\nmore detail line\n\n## UNCERTAINTY MAP\nwhatever"
        );
        let update = extract_update(&response);
        assert!(update.contains("### Architecture"));
        assert!(update.contains("more detail line"));
        assert!(!update.contains("UNCERTAINTY MAP"));
    }

    #[test]
    fn uncertainty_map_ends_capture() {
        let response = format!("## KNOWLEDGE UPDATE\n\n{LONG_BODY}\n\nUNCERTAINTY MAP: unsure");
        assert_eq!(extract_update(&response), LONG_BODY);
    }

    #[tokio::test]
    async fn read_initializes_a_missing_ledger() {
        let dir = TempDir::new().unwrap();
        let content = read(dir.path()).await.unwrap();
        assert!(content.starts_with(HEADER));
        assert!(content.contains(PLACEHOLDER_BODY));
        // Subsequent reads return the persisted file.
        let again = read(dir.path()).await.unwrap();
        assert_eq!(content, again);
    }

    #[tokio::test]
    async fn first_real_entry_replaces_the_placeholder() {
        let dir = TempDir::new().unwrap();
        read(dir.path()).await.unwrap();
        write(dir.path(), "Switched the parser to a streaming design.")
            .await
            .unwrap();

        let content = fs::read_to_string(dir.path().join(LEDGER_FILE)).await.unwrap();
        assert!(content.contains("Switched the parser to a streaming design."));
        assert!(!content.contains("Previous Knowledge"));
        assert!(!content.contains(PLACEHOLDER_BODY));
    }

    #[tokio::test]
    async fn second_write_prepends_above_previous_knowledge() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "First insight about the cache layer.")
            .await
            .unwrap();
        write(dir.path(), "Second insight about the API retries.")
            .await
            .unwrap();

        let content = fs::read_to_string(dir.path().join(LEDGER_FILE)).await.unwrap();
        let latest = content.find("Second insight about the API retries.").unwrap();
        let previous_marker = content.find("## Previous Knowledge").unwrap();
        let first = content.find("First insight about the cache layer.").unwrap();
        assert!(latest < previous_marker);
        assert!(previous_marker < first);
        assert!(content.contains("## Latest Update"));
    }
}
