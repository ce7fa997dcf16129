// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent turn loop.
//!
//! A turn runs `AwaitModel -> (Done | ExecuteTools -> AwaitModel)` until the
//! model answers without tool calls, the provider chain fails, or the
//! session's tool iteration ceiling is reached. Every way out is a
//! [`TurnOutcome`]; nothing inside a turn propagates as an error.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use wingman_config::WingmanConfig;
use wingman_core::{ChatMessage, ProviderRequest, Role, ToolCall, WingmanError};
use wingman_memory::{preview, DailyLog, MemoryStore, TranscriptLogger};
use wingman_provider::ProviderManager;
use wingman_session::{storage_stem, SandboxLevel, Session, SessionHandle, SessionManager};
use wingman_skill::{ToolContext, ToolRegistry};

use crate::context::PromptBuilder;
use crate::events::{AgentEvent, EventSink, TurnOutcome, EVENT_RESULT_PREVIEW_CHARS};

/// Characters of each message copied into the daily activity log.
const DAILY_PREVIEW_CHARS: usize = 200;
/// Characters of a tool result kept in the transcript.
const TRANSCRIPT_RESULT_CHARS: usize = 500;

/// Knobs for [`AgentRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Messages of history sent with each provider call.
    pub history_limit: usize,
    /// Model label recorded with assistant transcript entries.
    pub model: String,
    /// When false no tool definitions are offered to the model.
    pub tools_enabled: bool,
    /// How many request ids are remembered for deduplication.
    pub request_log_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            history_limit: 50,
            model: "unknown".into(),
            tools_enabled: true,
            request_log_capacity: 1024,
        }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &WingmanConfig) -> Self {
        let providers = &config.providers;
        let model = providers
            .default
            .as_deref()
            .and_then(|name| providers.backends.iter().find(|b| b.name == name))
            .or_else(|| providers.backends.first())
            .map(|b| b.model.clone())
            .unwrap_or_else(|| "unknown".into());
        Self {
            history_limit: config.session.history_limit,
            model,
            tools_enabled: config.tools.enabled,
            ..Self::default()
        }
    }
}

/// An inbound message addressed by conversation coordinates.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub channel: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub is_direct: bool,
    pub content: String,
    /// Client-chosen id; a repeated id is not processed twice.
    pub request_id: Option<String>,
}

impl TurnRequest {
    pub fn new(channel: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub session_id: String,
    pub outcome: TurnOutcome,
}

/// Bounded set of request ids already claimed, oldest evicted first.
#[derive(Debug)]
struct RequestLog {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RequestLog {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// True when `id` had not been seen before.
    fn claim(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    /// Forgets `id` so a retry of a failed turn is processed.
    fn release(&mut self, id: &str) {
        if self.seen.remove(id) {
            self.order.retain(|seen| seen != id);
        }
    }
}

/// Runs conversation turns against the provider chain and tool registry.
pub struct AgentRuntime {
    sessions: Arc<SessionManager>,
    providers: Arc<ProviderManager>,
    tools: Arc<ToolRegistry>,
    memory: Arc<MemoryStore>,
    prompt: PromptBuilder,
    transcripts: TranscriptLogger,
    daily: DailyLog,
    settings: RuntimeSettings,
    requests: Mutex<RequestLog>,
    workspace: PathBuf,
}

impl AgentRuntime {
    /// `workspace` holds the memory files, transcripts and daily logs.
    pub fn new(
        sessions: Arc<SessionManager>,
        providers: Arc<ProviderManager>,
        tools: Arc<ToolRegistry>,
        workspace: &Path,
        settings: RuntimeSettings,
    ) -> Self {
        let memory = Arc::new(MemoryStore::new(workspace));
        Self {
            sessions,
            providers,
            tools,
            prompt: PromptBuilder::new(memory.clone()),
            memory,
            transcripts: TranscriptLogger::new(workspace),
            daily: DailyLog::new(workspace),
            requests: Mutex::new(RequestLog::new(settings.request_log_capacity)),
            settings,
            workspace: workspace.to_path_buf(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn providers(&self) -> &Arc<ProviderManager> {
        &self.providers
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn transcripts(&self) -> &TranscriptLogger {
        &self.transcripts
    }

    /// Resolves the session for `request` and runs one turn on it.
    pub async fn process_message(
        &self,
        request: TurnRequest,
        events: Option<&EventSink>,
    ) -> TurnReply {
        let handle = self
            .sessions
            .resolve(
                &request.channel,
                request.user_id.as_deref(),
                request.group_id.as_deref(),
                request.is_direct,
            )
            .await;
        self.process_request(
            &handle,
            &request.content,
            request.request_id.as_deref(),
            events,
        )
        .await
    }

    /// Runs one turn on `handle` unless `request_id` was already claimed,
    /// in which case the session is left untouched and the reply is
    /// [`TurnOutcome::Duplicate`].
    ///
    /// The id is claimed when the turn starts and released again if the
    /// turn fails, so a client may retry after an outage.
    pub async fn process_request(
        &self,
        handle: &SessionHandle,
        text: &str,
        request_id: Option<&str>,
        events: Option<&EventSink>,
    ) -> TurnReply {
        if let Some(request_id) = request_id {
            if !self.requests.lock().await.claim(request_id) {
                let session_id = handle.lock().await.id.clone();
                info!(%session_id, request_id, "duplicate request ignored");
                return TurnReply {
                    session_id,
                    outcome: TurnOutcome::Duplicate,
                };
            }
        }

        let outcome = self.process_turn(handle, text, events).await;
        if let (Some(request_id), TurnOutcome::Failed(_)) = (request_id, &outcome) {
            self.requests.lock().await.release(request_id);
            debug!(request_id, "released request id after failed turn");
        }
        let session_id = handle.lock().await.id.clone();
        TurnReply {
            session_id,
            outcome,
        }
    }

    /// Runs one turn on an already resolved session.
    ///
    /// The session lock is held for the whole turn, so turns on the same
    /// session never interleave.
    pub async fn process_turn(
        &self,
        handle: &SessionHandle,
        text: &str,
        events: Option<&EventSink>,
    ) -> TurnOutcome {
        let mut session = handle.lock().await;
        let session_id = session.id.clone();
        emit(
            events,
            AgentEvent::Start {
                session_id: session_id.clone(),
            },
        )
        .await;

        self.record_user_message(&mut session, text).await;

        let tools = if self.settings.tools_enabled {
            self.tools.definitions(|name| session.is_tool_allowed(name))
        } else {
            Vec::new()
        };
        let system = self.prompt.build(&session, !tools.is_empty()).await;
        let max_iterations = session.policy.max_tool_iterations;

        let mut iteration = 0;
        let outcome = loop {
            if iteration >= max_iterations {
                break TurnOutcome::IterationLimitReached {
                    iterations: max_iterations,
                };
            }
            iteration += 1;
            debug!(%session_id, iteration, max_iterations, "agent loop iteration");
            emit(
                events,
                AgentEvent::Thinking {
                    status: format!("Thinking (step {iteration})"),
                },
            )
            .await;

            let mut messages = vec![ChatMessage::system(system.as_str())];
            messages.extend(session.history(self.settings.history_limit));
            let request = ProviderRequest {
                messages,
                tools: tools.clone(),
                ..ProviderRequest::default()
            };

            let response = match self.providers.chat(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(%session_id, error = %e, "LLM call failed");
                    self.transcripts
                        .log_error(&session_id, &format!("LLM call failed: {e}"), "provider")
                        .await;
                    break TurnOutcome::Failed(format!("❌ LLM call failed: {e}"));
                }
            };

            if let Some(usage) = response.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "token usage"
                );
            }

            if !response.has_tool_calls() {
                let answer = response.content.trim().to_string();
                session.add_message(Role::Assistant, answer.as_str());
                break TurnOutcome::Answer(answer);
            }

            session.add_tool_calls(response.content.as_str(), response.tool_calls.clone());
            for call in &response.tool_calls {
                self.run_tool_call(&mut session, call, events).await;
            }
        };

        self.finish_turn(&session, &outcome, events).await;
        outcome
    }

    /// Runs a tool-less turn, forwarding text deltas to `chunks` as they
    /// arrive.
    ///
    /// A stream that breaks part way sends a final `❌ Streaming failed`
    /// chunk; whatever text arrived before the failure is kept.
    pub async fn process_turn_stream(
        &self,
        handle: &SessionHandle,
        text: &str,
        chunks: &mpsc::Sender<String>,
    ) -> TurnOutcome {
        let mut session = handle.lock().await;
        let session_id = session.id.clone();
        self.record_user_message(&mut session, text).await;

        let system = self.prompt.build(&session, false).await;
        let mut messages = vec![ChatMessage::system(system.as_str())];
        messages.extend(session.history(self.settings.history_limit));
        let request = ProviderRequest {
            messages,
            ..ProviderRequest::default()
        };

        let mut full = String::new();
        let failure = match self.providers.chat_stream(request).await {
            Ok(mut stream) => {
                let mut failure = None;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) if chunk.delta.is_empty() => {}
                        Ok(chunk) => {
                            full.push_str(&chunk.delta);
                            // Receiver gone only stops delivery; the turn completes.
                            let _ = chunks.send(chunk.delta).await;
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                failure
            }
            Err(e) => Some(e),
        };

        let outcome = match failure {
            None => {
                let answer = full.trim().to_string();
                session.add_message(Role::Assistant, answer.as_str());
                TurnOutcome::Answer(answer)
            }
            Some(e) => {
                warn!(%session_id, error = %e, "streaming failed");
                let message = format!("❌ Streaming failed: {e}");
                let _ = chunks.send(format!("\n{message}")).await;
                self.transcripts
                    .log_error(&session_id, &format!("Streaming failed: {e}"), "stream")
                    .await;
                if !full.trim().is_empty() {
                    session.add_message(Role::Assistant, full.trim());
                }
                TurnOutcome::Failed(message)
            }
        };

        self.finish_turn(&session, &outcome, None).await;
        outcome
    }

    /// Sets the session's active skill. Returns false when
    /// `skills/{name}/SKILL.md` does not exist.
    pub async fn activate_skill(
        &self,
        handle: &SessionHandle,
        name: &str,
    ) -> Result<bool, WingmanError> {
        if self.memory.skill(name).await?.is_none() {
            return Ok(false);
        }
        let mut session = handle.lock().await;
        session.active_skill = Some(name.to_string());
        session.touch();
        self.sessions.save(&session).await;
        info!(session_id = %session.id, skill = name, "skill activated");
        Ok(true)
    }

    /// Clears the active skill and returns the one that was active.
    pub async fn deactivate_skill(&self, handle: &SessionHandle) -> Option<String> {
        let mut session = handle.lock().await;
        let previous = session.active_skill.take();
        if previous.is_some() {
            session.touch();
            self.sessions.save(&session).await;
        }
        previous
    }

    async fn record_user_message(&self, session: &mut Session, text: &str) {
        session.add_message(Role::User, text);
        self.transcripts
            .log_user_message(&session.id, text, &session.channel)
            .await;
        self.log_daily(&format!(
            "User ({}): {}",
            session.channel,
            preview(text, DAILY_PREVIEW_CHARS)
        ))
        .await;
    }

    /// Tool context for calls made from `session`.
    ///
    /// `Restricted` sessions are confined to the workspace. `Isolated`
    /// sessions get a private directory: the session's workdir when one is
    /// set, otherwise `sandboxes/{stem}` under the workspace.
    async fn tool_context(&self, session: &Session) -> ToolContext {
        let mut ctx = ToolContext::for_session(session.id.clone());
        match session.policy.sandbox {
            SandboxLevel::None => {}
            SandboxLevel::Restricted => ctx.confine = true,
            SandboxLevel::Isolated => {
                let root = match session.workdir() {
                    Some(dir) => PathBuf::from(dir),
                    None => self
                        .workspace
                        .join("sandboxes")
                        .join(storage_stem(&session.id)),
                };
                if let Err(e) = tokio::fs::create_dir_all(&root).await {
                    warn!(session_id = %session.id, error = %e, "failed to create session workdir");
                }
                ctx.root = Some(root);
                ctx.confine = true;
            }
        }
        ctx
    }

    async fn run_tool_call(
        &self,
        session: &mut Session,
        call: &ToolCall,
        events: Option<&EventSink>,
    ) {
        info!(session_id = %session.id, tool = %call.name, call_id = %call.id, "tool call");
        self.transcripts
            .log_tool_call(&session.id, &call.name, &call.arguments)
            .await;
        emit(
            events,
            AgentEvent::ToolCall {
                call_id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        )
        .await;

        let (result, success) = if session.is_tool_allowed(&call.name) {
            let ctx = self.tool_context(session).await;
            let output = self.tools.run(call, &ctx).await;
            (output.content, !output.is_error)
        } else {
            warn!(session_id = %session.id, tool = %call.name, "tool denied by session policy");
            (
                format!("❌ Tool '{}' is not allowed in this session.", call.name),
                false,
            )
        };

        self.transcripts
            .log_tool_result(
                &session.id,
                &call.name,
                &preview(&result, TRANSCRIPT_RESULT_CHARS),
                success,
            )
            .await;
        emit(
            events,
            AgentEvent::ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                result: preview(&result, EVENT_RESULT_PREVIEW_CHARS),
            },
        )
        .await;
        session.add_tool_result(&call.id, &call.name, result);
    }

    async fn finish_turn(
        &self,
        session: &Session,
        outcome: &TurnOutcome,
        events: Option<&EventSink>,
    ) {
        match outcome {
            TurnOutcome::Answer(text) => {
                self.transcripts
                    .log_assistant_message(&session.id, text, &self.settings.model)
                    .await;
                self.log_daily(&format!(
                    "Assistant: {}",
                    preview(text, DAILY_PREVIEW_CHARS)
                ))
                .await;
            }
            TurnOutcome::IterationLimitReached { iterations } => {
                warn!(session_id = %session.id, iterations, "tool iteration ceiling reached");
                self.transcripts
                    .log_error(&session.id, &outcome.text(), "iteration_limit")
                    .await;
            }
            TurnOutcome::Failed(_) | TurnOutcome::Duplicate => {}
        }

        self.sessions.save(session).await;
        emit(
            events,
            AgentEvent::Complete {
                session_id: session.id.clone(),
                text: outcome.text(),
            },
        )
        .await;
    }

    async fn log_daily(&self, entry: &str) {
        if let Err(e) = self.daily.append(entry).await {
            warn!(error = %e, "failed to write daily log (non-fatal)");
        }
    }
}

async fn emit(events: Option<&EventSink>, event: AgentEvent) {
    if let Some(sink) = events {
        if sink.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}
