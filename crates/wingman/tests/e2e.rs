// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios for the complete agent pipeline.
//!
//! Each test builds an isolated TestHarness over a temp workspace with a
//! scripted provider. Tests are independent and order-insensitive.

use std::sync::Arc;

use serde_json::json;
use wingman_agent::TurnOutcome;
use wingman_config::model::PolicyOverride;
use wingman_core::{ProviderAdapter, Role};
use wingman_test_utils::{FailingProvider, MockProvider, MockReply, TestHarness};

// ---- Plain question, tools disabled ----

#[tokio::test]
async fn arithmetic_question_takes_one_call() {
    let harness = TestHarness::builder()
        .without_tools()
        .with_mock_responses(["2 + 2 = 4"])
        .build()
        .await
        .unwrap();

    let reply = harness.send_message("cli", "What's 2+2?").await;
    assert!(reply.outcome.text().contains('4'));
    assert_eq!(harness.provider.calls(), 1);

    let request = harness.provider.last_request().await.unwrap();
    assert!(request.tools.is_empty());

    let handle = harness.sessions.get(&reply.session_id).await.unwrap();
    let session = handle.lock().await;
    assert_eq!(session.id, "main");
    assert_eq!(session.message_count(), 2);
}

#[tokio::test]
async fn conversation_survives_a_reload() {
    let harness = TestHarness::builder()
        .with_mock_responses(["Nice to meet you, Ada.", "You are Ada."])
        .build()
        .await
        .unwrap();

    harness.send_message("cli", "My name is Ada.").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    harness.sessions.evict_idle(std::time::Duration::ZERO).await;
    assert_eq!(harness.sessions.live_count(), 0);

    let reply = harness.send_message("cli", "Who am I?").await;
    assert_eq!(reply.outcome, TurnOutcome::Answer("You are Ada.".into()));

    let request = harness.provider.last_request().await.unwrap();
    let history: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        history,
        ["My name is Ada.", "Nice to meet you, Ada.", "Who am I?"]
    );
}

// ---- Session policies ----

#[tokio::test]
async fn group_sessions_cannot_run_bash() {
    let harness = TestHarness::builder()
        .with_builtins()
        .with_reply(MockReply::tool_call(
            "bash",
            json!({"command": "touch pwned"}),
        ))
        .with_mock_responses(["I can't do that here."])
        .build()
        .await
        .unwrap();

    let reply = harness
        .send_group_message("telegram", "alice", "family", "run touch pwned")
        .await;
    assert!(reply.session_id.starts_with("group:telegram:"));
    assert_eq!(reply.outcome.text(), "I can't do that here.");
    assert!(!harness.workspace().join("pwned").exists());

    // bash is not offered to group sessions at all.
    let first = &harness.provider.requests().await[0];
    assert!(first.tools.iter().all(|t| t.name != "bash"));

    let handle = harness.sessions.get(&reply.session_id).await.unwrap();
    let session = handle.lock().await;
    let denial = session
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(denial.content, "❌ Tool 'bash' is not allowed in this session.");
}

#[tokio::test]
async fn iteration_ceiling_stops_a_looping_model() {
    let provider =
        MockProvider::new().always(MockReply::tool_call("list_dir", json!({"path": "."})));
    let harness = TestHarness::builder()
        .with_provider(provider)
        .with_builtins()
        .with_policy_override(
            "main",
            PolicyOverride {
                max_tool_iterations: Some(3),
                ..PolicyOverride::default()
            },
        )
        .build()
        .await
        .unwrap();

    let reply = harness.send_message("cli", "list forever").await;
    assert_eq!(
        reply.outcome,
        TurnOutcome::IterationLimitReached { iterations: 3 }
    );
    assert_eq!(harness.provider.calls(), 3);
}

#[tokio::test]
async fn unknown_tools_answer_with_text() {
    let harness = TestHarness::builder()
        .with_builtins()
        .with_reply(MockReply::tool_call("teleport", json!({})))
        .with_mock_responses(["That tool does not exist."])
        .build()
        .await
        .unwrap();

    let reply = harness.send_message("cli", "beam me up").await;
    assert!(reply.outcome.is_answer());

    let requests = harness.provider.requests().await;
    let tool_message = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(
        tool_message.content.starts_with("❌ Unknown tool: teleport"),
        "{}",
        tool_message.content
    );
}

// ---- Provider failover ----

#[tokio::test]
async fn failover_reaches_the_backup_provider() {
    let backup = Arc::new(MockProvider::with_responses(["from backup"]).named("backup"));
    let harness = TestHarness::builder()
        .with_provider(MockProvider::failing("primary down").named("primary"))
        .with_fallback(backup.clone() as Arc<dyn ProviderAdapter>)
        .build()
        .await
        .unwrap();

    let reply = harness.send_message("cli", "hello?").await;
    assert_eq!(reply.outcome, TurnOutcome::Answer("from backup".into()));
    assert_eq!(harness.provider.calls(), 1);
    assert_eq!(backup.calls(), 1);
}

#[tokio::test]
async fn exhausted_providers_fail_the_turn() {
    let second = Arc::new(FailingProvider::new("second", "quota exceeded"));
    let harness = TestHarness::builder()
        .with_provider(MockProvider::failing("primary down").named("primary"))
        .with_fallback(second.clone() as Arc<dyn ProviderAdapter>)
        .build()
        .await
        .unwrap();

    let reply = harness.send_message("cli", "anyone?").await;
    let TurnOutcome::Failed(text) = &reply.outcome else {
        panic!("expected a failed turn, got {:?}", reply.outcome);
    };
    assert!(text.contains("All providers failed"), "{text}");
    assert!(text.contains("quota exceeded"), "{text}");
    assert_eq!(second.calls(), 1);

    let handle = harness.sessions.get(&reply.session_id).await.unwrap();
    assert_eq!(handle.lock().await.message_count(), 1);
}

// ---- Memory tools ----

#[tokio::test]
async fn memory_tools_write_the_workspace() {
    let harness = TestHarness::builder()
        .with_memory_tools()
        .with_reply(MockReply::tool_call(
            "memory_append",
            json!({"key": "user", "content": "- prefers tea"}),
        ))
        .with_mock_responses(["Noted."])
        .build()
        .await
        .unwrap();

    let reply = harness.send_message("cli", "remember that I like tea").await;
    assert_eq!(reply.outcome.text(), "Noted.");

    let user = std::fs::read_to_string(harness.workspace().join("USER.md")).unwrap();
    assert!(user.contains("- prefers tea"), "{user}");
}
