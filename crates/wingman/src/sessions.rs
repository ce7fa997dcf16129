// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wingman sessions`: lists stored sessions without starting the runtime.

use std::sync::Arc;

use colored::Colorize;
use wingman_config::WingmanConfig;
use wingman_core::WingmanError;
use wingman_session::SessionManager;

use crate::stack::session_store;

pub async fn run_sessions(config: WingmanConfig) -> Result<(), WingmanError> {
    let sessions = SessionManager::new(Arc::new(session_store(&config)));
    let summaries = sessions.list().await?;

    if summaries.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    println!(
        "{:<40} {:<8} {:<12} {:>8}  {}",
        "ID".bold(),
        "KIND".bold(),
        "CHANNEL".bold(),
        "MESSAGES".bold(),
        "UPDATED".bold()
    );
    for s in summaries {
        println!(
            "{:<40} {:<8} {:<12} {:>8}  {}",
            s.id,
            s.kind.to_string(),
            s.channel,
            s.message_count,
            s.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
