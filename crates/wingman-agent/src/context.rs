// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly from the workspace memory files.
//!
//! Sections appear in a fixed order and only when they have content:
//! identity, personality, guidelines, user profile, tool conventions,
//! long-term memory, active skill, today's activity log, current context,
//! then the tool usage instructions when tools are offered.

use std::sync::Arc;

use chrono::Local;
use tracing::warn;
use wingman_memory::{DailyLog, MemoryFile, MemoryStore, DEFAULT_TAIL_LINES};
use wingman_session::Session;

/// Separator placed between prompt sections.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

const MEMORY_SECTIONS: [(MemoryFile, &str); 6] = [
    (MemoryFile::Identity, "Your Identity"),
    (MemoryFile::Soul, "Your Personality"),
    (MemoryFile::Agents, "Guidelines"),
    (MemoryFile::User, "About the User"),
    (MemoryFile::Tools, "Your Tools"),
    (MemoryFile::Memory, "Long-Term Memory"),
];

const TOOL_INSTRUCTIONS: &str = "## Tool Usage\n\n\
You have access to tools. Use them when needed to answer questions, execute tasks, \
or gather information. Explain what you are doing before using a tool, and interpret \
the result for the user afterwards.\n\n\
**Important**: Use the `memory_update` or `memory_append` tools to save important \
information about the user for future sessions.";

/// Builds the system prompt for a turn.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    memory: Arc<MemoryStore>,
    daily: DailyLog,
}

impl PromptBuilder {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        let daily = DailyLog::new(memory.root());
        Self { memory, daily }
    }

    /// Assembles the prompt for `session`. Unreadable files are logged and
    /// left out.
    pub async fn build(&self, session: &Session, with_tools: bool) -> String {
        let mut sections = Vec::new();

        for (file, title) in MEMORY_SECTIONS {
            match self.memory.read(file).await {
                Ok(content) => push_section(&mut sections, title, &content),
                Err(e) => warn!(file = file.file_name(), error = %e, "skipping memory file"),
            }
        }

        if let Some(skill) = session.active_skill.as_deref() {
            match self.memory.skill(skill).await {
                Ok(Some(content)) => {
                    push_section(&mut sections, &format!("Active Skill: {skill}"), &content)
                }
                Ok(None) => warn!(skill, "active skill has no SKILL.md"),
                Err(e) => warn!(skill, error = %e, "failed to read skill"),
            }
        }

        match self.daily.tail_today(DEFAULT_TAIL_LINES).await {
            Ok(log) => push_section(&mut sections, "Today's Activity Log", &log),
            Err(e) => warn!(error = %e, "failed to read daily log"),
        }

        sections.push(current_context(session));

        if with_tools {
            sections.push(TOOL_INSTRUCTIONS.to_string());
        }

        sections.join(SECTION_SEPARATOR)
    }
}

fn push_section(sections: &mut Vec<String>, title: &str, content: &str) {
    let content = content.trim();
    if !content.is_empty() {
        sections.push(format!("## {title}\n\n{content}"));
    }
}

fn current_context(session: &Session) -> String {
    let now = Local::now();
    format!(
        "## Current Context\n\n\
         - **Date**: {}\n\
         - **Time**: {}\n\
         - **Session**: {}\n\
         - **Channel**: {}",
        now.format("%A, %B %d, %Y"),
        now.format("%I:%M %p"),
        session.id,
        session.channel,
    )
}

#[cfg(test)]
mod tests {
    use wingman_session::{SessionKey, SessionKind, SessionPolicy};

    use super::*;

    fn session() -> Session {
        let key = SessionKey::derive("telegram", Some("42"), None, true);
        Session::new(key, SessionPolicy::for_kind(SessionKind::DirectMessage))
    }

    #[tokio::test]
    async fn sections_follow_fixed_order_and_skip_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new(dir.path()));
        store.write(MemoryFile::Memory, "Likes tea.").await.unwrap();
        store.write(MemoryFile::Identity, "I am Wingman.").await.unwrap();
        store.write(MemoryFile::Soul, "  \n").await.unwrap();

        let prompt = PromptBuilder::new(store).build(&session(), false).await;
        let sections: Vec<&str> = prompt.split(SECTION_SEPARATOR).collect();

        assert_eq!(sections[0], "## Your Identity\n\nI am Wingman.");
        assert_eq!(sections[1], "## Long-Term Memory\n\nLikes tea.");
        assert!(sections[2].starts_with("## Current Context"));
        assert!(sections[2].contains("- **Session**: dm:telegram:42"));
        assert!(sections[2].contains("- **Channel**: telegram"));
        assert_eq!(sections.len(), 3);
        assert!(!prompt.contains("Your Personality"));
    }

    #[tokio::test]
    async fn includes_active_skill_log_and_tool_instructions() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new(dir.path()));
        let skill_dir = dir.path().join("skills/research");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "Cite sources.").unwrap();
        DailyLog::new(dir.path())
            .append("User (cli): hello")
            .await
            .unwrap();

        let mut session = session();
        session.active_skill = Some("research".into());
        let prompt = PromptBuilder::new(store).build(&session, true).await;

        let skill = prompt.find("## Active Skill: research\n\nCite sources.").unwrap();
        let log = prompt.find("## Today's Activity Log").unwrap();
        let context = prompt.find("## Current Context").unwrap();
        let tools = prompt.find("## Tool Usage").unwrap();
        assert!(skill < log && log < context && context < tools);
        assert!(prompt.contains("User (cli): hello"));
        assert!(prompt.contains("`memory_update`"));
    }
}
