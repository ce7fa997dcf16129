// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace layout and the section-keyed markdown memory files.
//!
//! ```text
//! workspace/
//! ├── sessions/      session documents
//! ├── memory/        daily activity logs (YYYY-MM-DD.md)
//! ├── transcripts/   per-session JSONL transcripts
//! ├── skills/        skills/{name}/SKILL.md
//! ├── projects/      projects/{name}/state.json
//! ├── AGENTS.md  SOUL.md  IDENTITY.md  USER.md  MEMORY.md  TOOLS.md
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use wingman_core::WingmanError;

/// Subdirectories created by [`MemoryStore::ensure_workspace`].
pub const WORKSPACE_DIRS: &[&str] = &["sessions", "memory", "transcripts", "skills", "projects"];

/// A long-term memory file, addressed by its lowercase key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MemoryFile {
    /// Behavioral guidelines.
    Agents,
    /// Personality.
    Soul,
    /// Who the agent is.
    Identity,
    /// What is known about the user.
    User,
    /// Curated long-term facts.
    Memory,
    /// Tool usage conventions.
    Tools,
}

impl MemoryFile {
    pub fn file_name(self) -> &'static str {
        match self {
            MemoryFile::Agents => "AGENTS.md",
            MemoryFile::Soul => "SOUL.md",
            MemoryFile::Identity => "IDENTITY.md",
            MemoryFile::User => "USER.md",
            MemoryFile::Memory => "MEMORY.md",
            MemoryFile::Tools => "TOOLS.md",
        }
    }

    /// Comma-separated list of valid keys, for error messages.
    pub fn valid_keys() -> String {
        MemoryFile::iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn io_err(e: std::io::Error) -> WingmanError {
    WingmanError::storage(e)
}

/// Reads and writes the workspace's memory files.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: PathBuf,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file: MemoryFile) -> PathBuf {
        self.root.join(file.file_name())
    }

    /// Creates the workspace directories and a `# Name` stub for every
    /// missing memory file. Existing files are left untouched.
    pub async fn ensure_workspace(&self) -> Result<(), WingmanError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        for dir in WORKSPACE_DIRS {
            tokio::fs::create_dir_all(self.root.join(dir))
                .await
                .map_err(io_err)?;
        }

        for file in MemoryFile::iter() {
            let path = self.path_of(file);
            if tokio::fs::try_exists(&path).await.map_err(io_err)? {
                continue;
            }
            let title = file.file_name().trim_end_matches(".md");
            tokio::fs::write(&path, format!("# {title}\n\n"))
                .await
                .map_err(io_err)?;
            info!(file = file.file_name(), "created memory file");
        }
        Ok(())
    }

    /// Contents of a memory file; empty when the file does not exist.
    pub async fn read(&self, file: MemoryFile) -> Result<String, WingmanError> {
        read_or_empty(&self.path_of(file)).await
    }

    pub async fn write(&self, file: MemoryFile, content: &str) -> Result<(), WingmanError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        tokio::fs::write(self.path_of(file), content)
            .await
            .map_err(io_err)?;
        debug!(file = file.file_name(), "memory file updated");
        Ok(())
    }

    pub async fn append(&self, file: MemoryFile, content: &str) -> Result<(), WingmanError> {
        append_to(&self.path_of(file), content).await
    }

    /// Every memory file with non-blank content, in declaration order.
    pub async fn read_all(&self) -> Result<Vec<(MemoryFile, String)>, WingmanError> {
        let mut out = Vec::new();
        for file in MemoryFile::iter() {
            let content = self.read(file).await?;
            if !content.trim().is_empty() {
                out.push((file, content));
            }
        }
        Ok(out)
    }

    /// `skills/{name}/SKILL.md`, or `None` if the skill does not exist.
    ///
    /// Names containing path separators or `..` never resolve.
    pub async fn skill(&self, name: &str) -> Result<Option<String>, WingmanError> {
        if !is_valid_skill_name(name) {
            return Ok(None);
        }
        let path = self.root.join("skills").join(name).join("SKILL.md");
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }
}

pub(crate) fn is_valid_skill_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub(crate) async fn read_or_empty(path: &Path) -> Result<String, WingmanError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(io_err(e)),
    }
}

pub(crate) async fn append_to(path: &Path, content: &str) -> Result<(), WingmanError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;
    file.write_all(content.as_bytes()).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[tokio::test]
    async fn ensure_workspace_creates_layout_and_stubs() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("ws"));
        store.ensure_workspace().await.unwrap();

        for sub in WORKSPACE_DIRS {
            assert!(store.root().join(sub).is_dir(), "{sub} missing");
        }
        assert_eq!(store.read(MemoryFile::Soul).await.unwrap(), "# SOUL\n\n");

        store.write(MemoryFile::Soul, "curious").await.unwrap();
        store.ensure_workspace().await.unwrap();
        assert_eq!(store.read(MemoryFile::Soul).await.unwrap(), "curious");
    }

    #[tokio::test]
    async fn read_missing_is_empty_and_append_creates() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        assert_eq!(store.read(MemoryFile::Memory).await.unwrap(), "");

        store.append(MemoryFile::Memory, "- likes tea\n").await.unwrap();
        store.append(MemoryFile::Memory, "- owns a cat\n").await.unwrap();
        assert_eq!(
            store.read(MemoryFile::Memory).await.unwrap(),
            "- likes tea\n- owns a cat\n"
        );
    }

    #[tokio::test]
    async fn read_all_skips_blank_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.write(MemoryFile::User, "Name: Ada").await.unwrap();
        store.write(MemoryFile::Tools, "   \n").await.unwrap();

        let all = store.read_all().await.unwrap();
        assert_eq!(all, vec![(MemoryFile::User, "Name: Ada".to_string())]);
    }

    #[tokio::test]
    async fn skills_resolve_by_name_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let skill_dir = dir.path().join("skills/research");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "Cite sources.").unwrap();

        assert_eq!(
            store.skill("research").await.unwrap().as_deref(),
            Some("Cite sources.")
        );
        assert!(store.skill("missing").await.unwrap().is_none());
        assert!(store.skill("../research").await.unwrap().is_none());
    }

    #[test]
    fn memory_file_keys_parse_case_insensitively() {
        assert_eq!(MemoryFile::from_str("USER").unwrap(), MemoryFile::User);
        assert_eq!(MemoryFile::Agents.to_string(), "agents");
        assert!(MemoryFile::from_str("diary").is_err());
        assert_eq!(
            MemoryFile::valid_keys(),
            "agents, soul, identity, user, memory, tools"
        );
    }
}
