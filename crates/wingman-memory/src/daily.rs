// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-day activity log under `memory/YYYY-MM-DD.md`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use wingman_core::WingmanError;

use crate::workspace::{append_to, read_or_empty};

/// Lines of today's log included in the system prompt.
pub const DEFAULT_TAIL_LINES: usize = 50;

/// Appends timestamped entries to the log file for the current day.
#[derive(Debug, Clone)]
pub struct DailyLog {
    dir: PathBuf,
}

impl DailyLog {
    /// `workspace` is the workspace root; logs live in its `memory/` dir.
    pub fn new(workspace: &Path) -> Self {
        Self {
            dir: workspace.join("memory"),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    pub async fn append(&self, entry: &str) -> Result<(), WingmanError> {
        let now = Local::now();
        let line = format!("\n[{}] {entry}\n", now.format("%H:%M:%S"));
        append_to(&self.path_for(now.date_naive()), &line).await
    }

    /// The whole log for `date`, empty if nothing was logged.
    pub async fn read(&self, date: NaiveDate) -> Result<String, WingmanError> {
        read_or_empty(&self.path_for(date)).await
    }

    /// The last `lines` lines of today's log.
    pub async fn tail_today(&self, lines: usize) -> Result<String, WingmanError> {
        let content = self.read(Local::now().date_naive()).await?;
        Ok(tail(&content, lines))
    }
}

fn tail(content: &str, lines: usize) -> String {
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// First `max` characters of `text`, for log summaries.
pub fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
