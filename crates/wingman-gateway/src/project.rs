// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-step projects driven through the agent runtime.
//!
//! A project starts in `planning`: its first step asks the model for a
//! numbered plan. Each later step executes one plan entry in the project's
//! own session, until every entry is done. State lives in
//! `workspace/projects/{name}/state.json` and is saved after every step;
//! the project's tools work inside `workspace/projects/{name}/files`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{info, warn};
use wingman_agent::{AgentRuntime, EventSink, TurnOutcome};
use wingman_core::WingmanError;
use wingman_memory::preview;
use wingman_session::SessionKey;

use crate::jobs::JobLatch;

const RESULT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Executing,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStep {
    pub id: u32,
    pub title: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub name: String,
    pub prompt: String,
    pub session_id: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub plan: Vec<ProjectStep>,
    #[serde(default)]
    pub history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectState {
    fn new(name: &str, prompt: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            session_id: SessionKey::project(name).id,
            status: ProjectStatus::Planning,
            plan: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn log(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
        self.updated_at = Utc::now();
    }
}

/// Extracts `1. Title` / `2) Title` lines from a plan reply.
pub fn parse_plan(text: &str) -> Vec<ProjectStep> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 {
                return None;
            }
            let rest = line[digits..].strip_prefix(['.', ')'])?;
            let title = rest.trim().trim_matches('*').trim();
            (!title.is_empty()).then(|| title.to_string())
        })
        .enumerate()
        .map(|(i, title)| ProjectStep {
            id: i as u32 + 1,
            title,
            status: StepStatus::Pending,
            result: None,
        })
        .collect()
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn io_err(e: std::io::Error) -> WingmanError {
    WingmanError::storage(e)
}

pub struct ProjectManager {
    dir: PathBuf,
    runtime: Arc<AgentRuntime>,
    latches: DashMap<String, Arc<JobLatch>>,
}

impl ProjectManager {
    /// Projects live under `workspace/projects`.
    pub fn new(workspace: &Path, runtime: Arc<AgentRuntime>) -> Self {
        Self {
            dir: workspace.join("projects"),
            runtime,
            latches: DashMap::new(),
        }
    }

    fn state_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join("state.json")
    }

    /// Working directory for the project's tool calls.
    pub fn files_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name).join("files")
    }

    /// The busy latch guarding step execution for `name`.
    pub fn latch(&self, name: &str) -> Arc<JobLatch> {
        self.latches
            .entry(name.to_string())
            .or_insert_with(JobLatch::new)
            .clone()
    }

    pub async fn create(&self, name: &str, prompt: &str) -> Result<ProjectState, WingmanError> {
        if !is_valid_name(name) {
            return Err(WingmanError::Protocol(format!(
                "invalid project name '{name}': use letters, digits, '-', '_' or '.'"
            )));
        }
        if prompt.trim().is_empty() {
            return Err(WingmanError::Protocol("project prompt is empty".into()));
        }
        if tokio::fs::try_exists(self.state_path(name))
            .await
            .map_err(io_err)?
        {
            return Err(WingmanError::Protocol(format!(
                "project '{name}' already exists"
            )));
        }

        let mut state = ProjectState::new(name, prompt);
        state.log("Project created.");
        self.save(&state).await?;
        info!(project = name, session_id = %state.session_id, "project created");
        Ok(state)
    }

    pub async fn load(&self, name: &str) -> Result<Option<ProjectState>, WingmanError> {
        if !is_valid_name(name) {
            return Ok(None);
        }
        let content = match tokio::fs::read_to_string(self.state_path(name)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(WingmanError::storage)
    }

    /// Names of every project with a state file, sorted.
    pub async fn list(&self) -> Result<Vec<String>, WingmanError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(io_err(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if tokio::fs::try_exists(self.state_path(&name))
                .await
                .unwrap_or(false)
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn save(&self, state: &ProjectState) -> Result<(), WingmanError> {
        let path = self.state_path(&state.name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(WingmanError::storage)?;
        tokio::fs::write(&path, json).await.map_err(io_err)
    }

    /// Advances the project by one step and returns the new state with a
    /// status message. Turn progress is reported on `events` when given.
    ///
    /// Callers serialize steps per project through [`Self::latch`].
    pub async fn run_next_step(
        &self,
        name: &str,
        events: Option<&EventSink>,
    ) -> Result<(ProjectState, String), WingmanError> {
        let Some(mut state) = self.load(name).await? else {
            return Err(WingmanError::Protocol(format!(
                "project '{name}' not found"
            )));
        };
        let handle = self
            .runtime
            .sessions()
            .open(SessionKey::project(name))
            .await;
        {
            let mut session = handle.lock().await;
            if session.workdir().is_none() {
                session.set_workdir(self.files_dir(name).to_string_lossy());
            }
        }

        let message = match state.status {
            ProjectStatus::Planning => {
                let request = format!(
                    "Break the following request into a short numbered list of \
                     implementation steps, one step per line, formatted as \
                     `1. Step title`. Reply with the list only.\n\n{}",
                    state.prompt
                );
                match self.runtime.process_turn(&handle, &request, events).await {
                    TurnOutcome::Answer(text) => {
                        let plan = parse_plan(&text);
                        if plan.is_empty() {
                            state.log("Planning produced no steps.");
                            "Planning produced no steps. Try again.".to_string()
                        } else {
                            let count = plan.len();
                            state.plan = plan;
                            state.status = ProjectStatus::Executing;
                            state.log("Plan created.");
                            format!("Plan created with {count} steps.")
                        }
                    }
                    other => {
                        warn!(project = name, outcome = %other, "planning failed");
                        state.log("Planning failed.");
                        format!("Planning failed: {other}")
                    }
                }
            }
            ProjectStatus::Executing => self.execute_step(&mut state, &handle, events).await,
            ProjectStatus::Completed => "Project is already complete.".to_string(),
        };

        self.save(&state).await?;
        Ok((state, message))
    }

    async fn execute_step(
        &self,
        state: &mut ProjectState,
        handle: &wingman_session::SessionHandle,
        events: Option<&EventSink>,
    ) -> String {
        let Some(index) = state
            .plan
            .iter()
            .position(|s| s.status != StepStatus::Completed)
        else {
            state.status = ProjectStatus::Completed;
            state.log("All steps completed.");
            return "Project completed! All steps are done.".to_string();
        };

        let (id, title) = (state.plan[index].id, state.plan[index].title.clone());
        let request = format!(
            "Project '{}': {}\n\nCarry out step {id} of the plan: {title}",
            state.name, state.prompt
        );
        info!(project = %state.name, step = id, "executing project step");

        let outcome = self.runtime.process_turn(handle, &request, events).await;
        let step = &mut state.plan[index];
        step.result = Some(preview(&outcome.text(), RESULT_PREVIEW_CHARS));
        if outcome.is_answer() {
            step.status = StepStatus::Completed;
            state.log(format!("Step {id} completed."));
            format!("Step {id} completed: {title}")
        } else {
            step.status = StepStatus::Failed;
            state.log(format!("Step {id} failed."));
            format!("Step {id} failed: {outcome}")
        }
    }
}
