// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sub-agent delegation tools: `sessions_create`, `sessions_message`,
//! `sessions_list` and `sessions_close`.
//!
//! A session spawns children keyed by [`SessionKey::agent`] and talks to
//! them through ordinary turns. A caller may only message or close its own
//! children, which rules out a child waiting on a parent whose lock is held
//! by the very turn that is waiting on the child.
//!
//! The tools live in the registry the runtime owns, so they reach the
//! runtime through a [`Delegation`] link attached once the runtime exists.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};
use wingman_core::WingmanError;
use wingman_session::{SessionHandle, SessionKey};
use wingman_skill::{required_str, Tool, ToolContext, ToolOutput, ToolRegistry};

use crate::events::TurnOutcome;
use crate::runtime::AgentRuntime;

const PURPOSE_KEY: &str = "purpose";
const AGENT_TYPE_KEY: &str = "agent_type";
const PARENT_KEY: &str = "parent_session";

pub const DEFAULT_AGENT_TYPE: &str = "general";
pub const AGENT_TYPES: &[&str] = &[
    "general", "research", "coding", "writer", "data", "browser", "system",
];
pub const DEFAULT_MESSAGE_TIMEOUT_SECS: u64 = 60;

/// A delegated session as seen by the tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildSession {
    pub session_id: String,
    pub purpose: String,
    pub agent_type: String,
    pub parent_session_id: String,
}

/// Late-bound link from the delegation tools to the runtime, plus the
/// children created since startup.
#[derive(Default)]
pub struct Delegation {
    runtime: OnceLock<Weak<AgentRuntime>>,
    children: Mutex<BTreeMap<String, ChildSession>>,
}

impl Delegation {
    /// Points the tools at `runtime`. Later calls are ignored.
    pub fn attach(&self, runtime: &Arc<AgentRuntime>) {
        if self.runtime.set(Arc::downgrade(runtime)).is_err() {
            warn!("delegation tools already attached to a runtime");
        }
    }

    fn runtime(&self) -> Result<Arc<AgentRuntime>, WingmanError> {
        self.runtime
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| WingmanError::tool("agent runtime is not available"))
    }

    pub async fn children(&self) -> Vec<ChildSession> {
        self.children.lock().await.values().cloned().collect()
    }

    async fn create(
        &self,
        parent: &str,
        purpose: &str,
        agent_type: &str,
    ) -> Result<ChildSession, WingmanError> {
        let runtime = self.runtime()?;
        let handle = runtime
            .sessions()
            .open(SessionKey::agent(parent, purpose))
            .await;
        let child = {
            let mut session = handle.lock().await;
            session
                .context
                .insert(PURPOSE_KEY.into(), Value::String(purpose.into()));
            session
                .context
                .insert(AGENT_TYPE_KEY.into(), Value::String(agent_type.into()));
            session
                .context
                .insert(PARENT_KEY.into(), Value::String(parent.into()));
            runtime.sessions().save(&session).await;
            ChildSession {
                session_id: session.id.clone(),
                purpose: purpose.into(),
                agent_type: agent_type.into(),
                parent_session_id: parent.into(),
            }
        };
        info!(
            session_id = %child.session_id,
            parent_session_id = %parent,
            agent_type,
            "created child session"
        );
        self.children
            .lock()
            .await
            .insert(child.session_id.clone(), child.clone());
        Ok(child)
    }

    /// Finds `session_id` and checks that `parent` owns it. Children from
    /// before a restart are recovered from the stored session.
    async fn owned_child(
        &self,
        runtime: &AgentRuntime,
        parent: &str,
        session_id: &str,
    ) -> Result<(ChildSession, SessionHandle), String> {
        if session_id == parent {
            return Err("A session cannot delegate to itself".into());
        }
        let Some(handle) = runtime.sessions().get(session_id).await else {
            return Err(format!("Session {session_id} not found"));
        };

        let known = self.children.lock().await.get(session_id).cloned();
        let child = match known {
            Some(child) => child,
            None => {
                // Never wait here: the target may be the caller's own parent,
                // locked by the turn that is waiting on the caller.
                let Ok(session) = handle.try_lock() else {
                    return Err(format!("Session {session_id} is busy"));
                };
                let field = |key: &str| {
                    session
                        .context
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                let Some(parent_session_id) = field(PARENT_KEY) else {
                    return Err(format!("Session {session_id} is not a delegated session"));
                };
                let child = ChildSession {
                    session_id: session_id.to_string(),
                    purpose: field(PURPOSE_KEY).unwrap_or_default(),
                    agent_type: field(AGENT_TYPE_KEY)
                        .unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string()),
                    parent_session_id,
                };
                drop(session);
                self.children
                    .lock()
                    .await
                    .insert(child.session_id.clone(), child.clone());
                child
            }
        };

        if child.parent_session_id != parent {
            return Err(format!("Session {session_id} belongs to another session"));
        }
        Ok((child, handle))
    }
}

/// Registers the four delegation tools, skipping names in `disabled`. Call
/// [`Delegation::attach`] on the returned link once the runtime is built.
pub fn register_delegation_tools(
    registry: &mut ToolRegistry,
    disabled: &[String],
) -> Arc<Delegation> {
    let link = Arc::new(Delegation::default());
    for op in [Op::Create, Op::Message, Op::List, Op::Close] {
        if disabled.iter().any(|d| d == op.name()) {
            continue;
        }
        registry.register(Arc::new(DelegationTool {
            op,
            link: link.clone(),
        }));
    }
    link
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Create,
    Message,
    List,
    Close,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Op::Create => "sessions_create",
            Op::Message => "sessions_message",
            Op::List => "sessions_list",
            Op::Close => "sessions_close",
        }
    }
}

struct DelegationTool {
    op: Op,
    link: Arc<Delegation>,
}

fn reply(success: bool, mut body: Value) -> ToolOutput {
    body["success"] = Value::Bool(success);
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    if success {
        ToolOutput::ok(text)
    } else {
        ToolOutput::error(text)
    }
}

fn failure(error: impl Into<String>) -> ToolOutput {
    reply(false, json!({ "error": error.into() }))
}

fn caller(ctx: &ToolContext) -> Result<&str, WingmanError> {
    ctx.session_id
        .as_deref()
        .ok_or_else(|| WingmanError::tool("delegation needs a calling session"))
}

#[async_trait]
impl Tool for DelegationTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        match self.op {
            Op::Create => "Create a new agent session to delegate work to a specialized agent",
            Op::Message => "Send a message to one of your agent sessions and get its response",
            Op::List => "List agent sessions, optionally filtered by parent",
            Op::Close => "Close one of your agent sessions and save its history",
        }
    }

    fn parameters_schema(&self) -> Value {
        match self.op {
            Op::Create => json!({
                "type": "object",
                "properties": {
                    "purpose": {
                        "type": "string",
                        "description": "What this agent session should accomplish"
                    },
                    "agent_type": {
                        "type": "string",
                        "enum": AGENT_TYPES,
                        "default": DEFAULT_AGENT_TYPE,
                        "description": "Kind of agent"
                    }
                },
                "required": ["purpose"]
            }),
            Op::Message => json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "Target session ID" },
                    "message": { "type": "string", "description": "Message to send to the agent" },
                    "wait_for_response": {
                        "type": "boolean",
                        "default": true,
                        "description": "Wait for the agent's reply"
                    },
                    "timeout": {
                        "type": "integer",
                        "default": DEFAULT_MESSAGE_TIMEOUT_SECS,
                        "description": "Max wait in seconds"
                    }
                },
                "required": ["session_id", "message"]
            }),
            Op::List => json!({
                "type": "object",
                "properties": {
                    "parent_session_id": {
                        "type": "string",
                        "description": "Only list children of this session"
                    }
                }
            }),
            Op::Close => json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "Session ID to close" }
                },
                "required": ["session_id"]
            }),
        }
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
        self.invoke_with(input, &ToolContext::default()).await
    }

    async fn invoke_with(
        &self,
        input: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, WingmanError> {
        match self.op {
            Op::Create => self.create(&input, ctx).await,
            Op::Message => self.message(&input, ctx).await,
            Op::List => self.list(&input).await,
            Op::Close => self.close(&input, ctx).await,
        }
    }
}

impl DelegationTool {
    async fn create(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, WingmanError> {
        let parent = caller(ctx)?;
        let purpose = required_str(input, "purpose")?;
        let agent_type = input
            .get("agent_type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_AGENT_TYPE);
        if !AGENT_TYPES.contains(&agent_type) {
            return Ok(failure(format!(
                "Unknown agent_type '{agent_type}'. Valid: [{}]",
                AGENT_TYPES.join(", ")
            )));
        }

        let child = self.link.create(parent, purpose, agent_type).await?;
        Ok(reply(
            true,
            json!({
                "session_id": child.session_id,
                "purpose": child.purpose,
                "agent_type": child.agent_type,
            }),
        ))
    }

    async fn message(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, WingmanError> {
        let parent = caller(ctx)?;
        let session_id = required_str(input, "session_id")?;
        let message = required_str(input, "message")?.to_string();
        let wait = input
            .get("wait_for_response")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let timeout = Duration::from_secs(
            input
                .get("timeout")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_MESSAGE_TIMEOUT_SECS),
        );

        let runtime = self.link.runtime()?;
        let (child, handle) = match self.link.owned_child(&runtime, parent, session_id).await {
            Ok(found) => found,
            Err(error) => return Ok(failure(error)),
        };

        if !wait {
            tokio::spawn(async move {
                let outcome = runtime.process_turn(&handle, &message, None).await;
                if !outcome.is_answer() {
                    warn!(session_id = %child.session_id, outcome = %outcome, "delegated turn did not answer");
                }
            });
            return Ok(reply(
                true,
                json!({
                    "session_id": session_id,
                    "message": "Message sent (async, no response awaited)",
                }),
            ));
        }

        match tokio::time::timeout(timeout, runtime.process_turn(&handle, &message, None)).await {
            Ok(TurnOutcome::Answer(response)) => Ok(reply(
                true,
                json!({ "session_id": session_id, "response": response }),
            )),
            Ok(outcome) => Ok(reply(
                false,
                json!({ "session_id": session_id, "error": outcome.text() }),
            )),
            Err(_) => Ok(failure(format!(
                "Response timeout after {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn list(&self, input: &Value) -> Result<ToolOutput, WingmanError> {
        let parent = input.get("parent_session_id").and_then(Value::as_str);
        let sessions: Vec<ChildSession> = self
            .link
            .children()
            .await
            .into_iter()
            .filter(|c| parent.is_none_or(|p| c.parent_session_id == p))
            .collect();
        Ok(reply(
            true,
            json!({ "count": sessions.len(), "sessions": sessions }),
        ))
    }

    async fn close(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, WingmanError> {
        let parent = caller(ctx)?;
        let session_id = required_str(input, "session_id")?;
        let runtime = self.link.runtime()?;
        if let Err(error) = self.link.owned_child(&runtime, parent, session_id).await {
            return Ok(failure(error));
        }

        runtime.sessions().close(session_id).await;
        self.link.children.lock().await.remove(session_id);
        info!(session_id, "closed child session");
        Ok(reply(
            true,
            json!({ "session_id": session_id, "message": "Session closed and saved" }),
        ))
    }
}
