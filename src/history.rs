//! Append-only log of past enhancements.
//!
//! One JSON object per line, in the order enhancements finished.

use crate::enhancer::EnhancementResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A stored enhancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub result: EnhancementResult,
}

impl HistoryEntry {
    /// One-line label for pickers: the original prompt and the start of the
    /// enhanced one.
    pub fn label(&self, max_chars: usize) -> String {
        let original = self.result.original_prompt.replace('\n', " ");
        let enhanced = self.result.enhanced_prompt.replace('\n', " ");
        let preview: String = enhanced.chars().take(max_chars).collect();
        let ellipsis = if enhanced.chars().count() > max_chars { "..." } else { "" };
        format!("{} -> {}{}", original, preview, ellipsis)
    }
}

/// History file handle.
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a finished enhancement.
    pub fn append(&self, result: &EnhancementResult) -> Result<HistoryEntry> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let entry = HistoryEntry {
            timestamp: Utc::now(),
            result: result.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))?;
        debug!("Appended history entry to {}", self.path.display());
        Ok(entry)
    }

    /// All entries, oldest first. Unreadable lines are skipped.
    pub fn load(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;

        let mut entries = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping malformed history line {} in {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Style;

    fn result(n: usize) -> EnhancementResult {
        EnhancementResult {
            original_prompt: format!("prompt {}", n),
            enhanced_prompt: format!("enhanced prompt number {}", n),
            style: Style::Concise,
            model_name: "llama3".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        assert!(history.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_is_monotonic_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("deep").join("history.jsonl"));

        for n in 0..5 {
            history.append(&result(n)).unwrap();
            assert_eq!(history.load().unwrap().len(), n + 1);
        }

        let entries = history.load().unwrap();
        let originals: Vec<_> = entries
            .iter()
            .map(|e| e.result.original_prompt.as_str())
            .collect();
        assert_eq!(originals, vec!["prompt 0", "prompt 1", "prompt 2", "prompt 3", "prompt 4"]);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let history = History::new(&path);
        history.append(&result(1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ not json").unwrap();
        history.append(&result(2)).unwrap();

        let entries = history.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].result, result(2));
    }

    #[test]
    fn test_entry_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        History::new(&path).append(&result(7)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["original_prompt"], "prompt 7");
        assert_eq!(value["model"], "llama3");
        assert_eq!(value["style"], "concise");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_label_truncates() {
        let entry = HistoryEntry {
            timestamp: Utc::now(),
            result: result(3),
        };
        assert_eq!(entry.label(8), "prompt 3 -> enhanced...");
        assert_eq!(entry.label(100), "prompt 3 -> enhanced prompt number 3");
    }
}
