// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem and shell containment for the built-in tools.
//!
//! A [`Sandbox`] owns the directory tools resolve paths against. When
//! confined, every resolved path must stay under that root; symlinks are
//! followed before the check. System paths are refused whenever they fall
//! outside the root, confined or not. Shell commands are screened for
//! destructive patterns before they run.

use std::path::{Component, Path, PathBuf};

use tracing::warn;
use wingman_core::WingmanError;

/// Paths no tool may touch unless they sit inside the sandbox root.
pub const BLOCKED_PATHS: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    "/etc/ssh",
    "/root",
    "/var/log/auth.log",
    "/var/root",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/boot",
    "/System",
    "/Library",
];

/// Substrings that reject a shell command outright (matched lowercase).
pub const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "rm -rf ~",
    "mkfs",
    "dd if=",
    ":(){:|:&};:",
    ">/dev/sda",
    ">/dev/hda",
    "curl | sh",
    "wget | sh",
    "curl | bash",
    "wget | bash",
    "chmod 777",
    "chmod -r 777",
    "chown -r",
    "kill -9 1",
    ">/etc/",
    ">/boot/",
    ">/sys/",
    "nc -l",
    "ncat -l",
];

/// Commands that run but are logged.
const HIGH_RISK_COMMANDS: &[&str] = &[
    "rm", "dd", "shred", "chmod", "chown", "sudo", "su", "curl", "wget", "nc", "python",
    "python3", "perl", "node",
];

/// Per-call adjustments the runtime derives from the calling session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Id of the session the call belongs to.
    pub session_id: Option<String>,
    /// Replaces the sandbox root for this call.
    pub root: Option<PathBuf>,
    /// Confine to the root even when the sandbox is configured open.
    pub confine: bool,
}

impl ToolContext {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    confined: bool,
    blocked_commands: Vec<String>,
}

impl Sandbox {
    /// A sandbox confined to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            confined: true,
            blocked_commands: Vec::new(),
        }
    }

    /// Lets relative paths resolve against `root` while still allowing
    /// absolute paths elsewhere, system paths excepted.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            confined: false,
            ..Self::new(root)
        }
    }

    /// Extra substrings that reject a shell command, on top of
    /// [`DANGEROUS_PATTERNS`].
    pub fn with_blocked_commands(mut self, patterns: &[String]) -> Self {
        self.blocked_commands = patterns.iter().map(|p| p.to_lowercase()).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_confined(&self) -> bool {
        self.confined
    }

    /// This sandbox as adjusted by `ctx`.
    pub fn scoped(&self, ctx: &ToolContext) -> Sandbox {
        Sandbox {
            root: ctx.root.clone().unwrap_or_else(|| self.root.clone()),
            confined: self.confined || ctx.confine,
            blocked_commands: self.blocked_commands.clone(),
        }
    }

    /// Resolves a tool-supplied path, refusing anything outside the root
    /// when confined and any blocked system path outside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, WingmanError> {
        let requested = Path::new(path);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let resolved = real_path(&normalize(&joined));
        let root = real_path(&normalize(&self.root));

        if resolved.starts_with(&root) {
            return Ok(resolved);
        }
        if self.confined {
            warn!(path, root = %root.display(), "path escapes the workspace");
            return Err(WingmanError::tool(format!(
                "Access denied: '{path}' is outside the workspace"
            )));
        }
        if let Some(blocked) = BLOCKED_PATHS.iter().find(|b| resolved.starts_with(b)) {
            warn!(path, blocked, "blocked system path");
            return Err(WingmanError::tool(format!(
                "Access denied to system path: {blocked}"
            )));
        }
        Ok(resolved)
    }

    /// Rejects destructive or configured-blocked commands.
    pub fn check_command(&self, command: &str) -> Result<(), WingmanError> {
        let lower = command.to_lowercase();
        if let Some(pattern) = self.blocked_commands.iter().find(|p| lower.contains(p.as_str())) {
            warn!(command, pattern = %pattern, "blocked command");
            return Err(WingmanError::tool(format!(
                "Command blocked: matches blocked pattern '{pattern}'"
            )));
        }
        if let Some(pattern) = DANGEROUS_PATTERNS.iter().find(|p| lower.contains(*p)) {
            warn!(command, pattern, "dangerous command");
            return Err(WingmanError::tool(format!(
                "Command blocked: dangerous pattern '{pattern}'"
            )));
        }
        if let Some(first) = command.split_whitespace().next()
            && HIGH_RISK_COMMANDS.contains(&first)
        {
            warn!(command = first, "high-risk command allowed");
        }
        Ok(())
    }
}

/// Removes `.` and folds `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalizes the longest existing prefix of `path` so symlinks inside
/// it are followed, then re-attaches the part that does not exist yet.
fn real_path(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(&existing) {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confined_sandbox_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path());

        assert!(sandbox.resolve("notes/new.txt").is_ok());
        assert!(sandbox.resolve("a/../b.txt").is_ok());
        assert!(sandbox.resolve("../outside.txt").is_err());
        assert!(sandbox.resolve("/tmp").is_err());
        let inside = dir.path().join("x.txt");
        assert!(sandbox.resolve(inside.to_str().unwrap()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let sandbox = Sandbox::new(dir.path());
        assert!(sandbox.resolve("link/secret.txt").is_err());
    }

    #[test]
    fn open_sandbox_still_blocks_system_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::open(dir.path());
        let err = sandbox.resolve("/etc/shadow").unwrap_err();
        assert!(err.to_string().contains("/etc/shadow"), "{err}");
        assert!(sandbox.resolve("../elsewhere.txt").is_ok());
    }

    #[test]
    fn context_narrows_the_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("projects/site");
        let ctx = ToolContext {
            root: Some(project.clone()),
            confine: true,
            ..ToolContext::default()
        };
        let scoped = Sandbox::open(dir.path()).scoped(&ctx);
        assert!(scoped.is_confined());
        assert_eq!(scoped.root(), project);
        assert!(scoped.resolve("../other/file.txt").is_err());
    }

    #[test]
    fn dangerous_and_configured_commands_are_rejected() {
        let sandbox = Sandbox::new(".").with_blocked_commands(&["Shutdown".to_string()]);
        assert!(sandbox.check_command("ls -la").is_ok());
        assert!(sandbox.check_command("sudo RM -RF / --no-preserve-root").is_err());
        assert!(sandbox.check_command("wget | bash").is_err());
        let err = sandbox.check_command("shutdown now").unwrap_err();
        assert!(err.to_string().contains("shutdown"), "{err}");
    }
}
