// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wingman chat` command implementation.
//!
//! Runs turns on the `cli` channel, which resolves to the shared `main`
//! session. With text on the command line it runs one turn and exits;
//! otherwise it starts a readline REPL.

use std::io::Write;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use wingman_agent::{AgentEvent, TurnOutcome};
use wingman_config::WingmanConfig;
use wingman_core::WingmanError;
use wingman_session::SessionHandle;

use crate::serve::init_tracing;
use crate::stack::{build_stack, Stack};

pub const CLI_CHANNEL: &str = "cli";

pub async fn run_chat(config: WingmanConfig, text: String, stream: bool) -> Result<(), WingmanError> {
    init_tracing(&config.agent.log_level);
    let stack = build_stack(&config).await?;
    let handle = stack
        .sessions
        .resolve(CLI_CHANNEL, None, None, true)
        .await;

    let result = if text.trim().is_empty() {
        repl(&stack, &handle, stream).await
    } else {
        send(&stack, &handle, text.trim(), stream).await;
        Ok(())
    };

    stack.sessions.save_all().await;
    result
}

async fn repl(stack: &Stack, handle: &SessionHandle, stream: bool) -> Result<(), WingmanError> {
    let mut rl = DefaultEditor::new()
        .map_err(|e| WingmanError::Internal(format!("failed to initialize readline: {e}")))?;

    let session_id = handle.lock().await.id.clone();
    println!("{} ({session_id})", "wingman chat".bold().green());
    println!(
        "Type {} to exit, {} to load a skill.\n",
        "/quit".yellow(),
        "/skill <name>".yellow()
    );

    let prompt = format!("{}> ", "wingman".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if let Some(arg) = trimmed.strip_prefix("/skill") {
                    skill_command(stack, handle, arg.trim()).await;
                    continue;
                }
                send(stack, handle, trimmed, stream).await;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                return Err(WingmanError::Internal(format!("readline error: {e}")));
            }
        }
    }
    Ok(())
}

async fn skill_command(stack: &Stack, handle: &SessionHandle, name: &str) {
    if name.is_empty() || name == "off" {
        match stack.runtime.deactivate_skill(handle).await {
            Some(previous) => println!("Skill '{previous}' deactivated."),
            None => println!("No skill is active."),
        }
        return;
    }
    match stack.runtime.activate_skill(handle, name).await {
        Ok(true) => println!("Skill '{name}' activated."),
        Ok(false) => println!("{}", format!("Skill '{name}' not found.").yellow()),
        Err(e) => eprintln!("{}", format!("error: {e}").red()),
    }
}

async fn send(stack: &Stack, handle: &SessionHandle, text: &str, stream: bool) {
    let outcome = if stream {
        let (tx, mut rx) = mpsc::channel::<String>(64);
        let printer = tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            while let Some(delta) = rx.recv().await {
                print!("{delta}");
                let _ = stdout.flush();
            }
            println!();
        });
        let outcome = stack.runtime.process_turn_stream(handle, text, &tx).await;
        drop(tx);
        let _ = printer.await;
        if outcome.is_answer() {
            return;
        }
        outcome
    } else {
        let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::ToolCall { name, arguments, .. } => {
                        eprintln!("{}", format!("  -> {name} {arguments}").dimmed());
                    }
                    AgentEvent::ToolResult { name, result, .. } => {
                        let first = result.lines().next().unwrap_or_default();
                        eprintln!("{}", format!("  <- {name}: {first}").dimmed());
                    }
                    _ => {}
                }
            }
        });
        let reply = stack
            .runtime
            .process_request(handle, text, None, Some(&tx))
            .await;
        drop(tx);
        let _ = printer.await;
        reply.outcome
    };

    match outcome {
        TurnOutcome::Answer(text) => println!("{text}"),
        other => println!("{}", other.text().yellow()),
    }
}
