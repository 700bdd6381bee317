//! Journal tail for the roomkeeper unit.
//!
//! Supervised subsystems inherit the agent's stdout, so their output lands
//! in the same unit and can be narrowed with `grep`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::process::Command;

use crate::global::SERVICE_UNIT;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalQuery {
    pub lines: usize,
    /// Only entries matching this pattern (journalctl `--grep`).
    pub grep: Option<String>,
}

impl JournalQuery {
    pub fn new(lines: usize) -> Self {
        Self { lines, grep: None }
    }

    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.grep = (!pattern.trim().is_empty()).then_some(pattern);
        self
    }

    fn journalctl_args(&self) -> Vec<String> {
        let mut args = vec![
            "--user".to_string(),
            "--unit".to_string(),
            SERVICE_UNIT.to_string(),
            "--lines".to_string(),
            self.lines.to_string(),
            "--output=short-iso".to_string(),
            "--no-pager".to_string(),
        ];
        if let Some(pattern) = &self.grep {
            args.push("--grep".to_string());
            args.push(pattern.clone());
        }
        args
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalTail {
    pub unit: String,
    /// Oldest first.
    pub entries: Vec<String>,
    /// False when journalctl ran but refused the query (no user journal,
    /// unit never installed).
    pub journal_available: bool,
}

/// Errors only when journalctl itself cannot be run.
pub fn tail_journal(query: &JournalQuery) -> Result<JournalTail> {
    let output = Command::new("journalctl")
        .args(query.journalctl_args())
        .output()
        .context("journalctl could not be run; roomkeeper logs need systemd")?;

    // `--grep` with no match exits 1 with empty output.
    let entries = journal_entries(&String::from_utf8_lossy(&output.stdout));
    let journal_available = output.status.success() || query.grep.is_some();

    Ok(JournalTail {
        unit: SERVICE_UNIT.to_string(),
        entries,
        journal_available,
    })
}

fn journal_entries(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("-- "))
        .map(String::from)
        .collect()
}
