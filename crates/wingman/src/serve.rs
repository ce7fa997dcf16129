// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wingman serve` command implementation.
//!
//! Starts the WebSocket gateway and the heartbeat scheduler, then waits for
//! SIGTERM/SIGINT. Live sessions are saved before exit.

use std::time::Duration;

use tracing::{info, warn};
use wingman_agent::{install_signal_handler, register_default_tasks, HeartbeatScheduler};
use wingman_config::WingmanConfig;
use wingman_core::WingmanError;
use wingman_gateway::{start_server, GatewayState, ServerConfig};

use crate::stack::build_stack;

pub async fn run_serve(config: WingmanConfig) -> Result<(), WingmanError> {
    init_tracing(&config.agent.log_level);
    info!(agent = %config.agent.name, "starting wingman serve");

    let stack = build_stack(&config).await?;
    info!(
        providers = ?stack.providers.provider_names(),
        model = %stack.model,
        workspace = %stack.workspace.display(),
        "runtime ready"
    );

    let cancel = install_signal_handler();

    let heartbeat = if config.heartbeat.enabled {
        let scheduler = HeartbeatScheduler::new(Duration::from_secs(config.heartbeat.tick_secs));
        register_default_tasks(
            &scheduler,
            &config.heartbeat,
            stack.sessions.clone(),
            stack.providers.clone(),
        )
        .await;
        let token = cancel.clone();
        Some(tokio::spawn(async move { scheduler.run(token).await }))
    } else {
        info!("heartbeat scheduler disabled");
        None
    };

    if config.gateway.enabled {
        let state = GatewayState::new(
            stack.runtime.clone(),
            &stack.workspace,
            stack.model.clone(),
            config.gateway.max_frame_bytes,
        );
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        if let Err(e) = start_server(&server_config, state, cancel.clone()).await {
            cancel.cancel();
            stack.sessions.save_all().await;
            return Err(e);
        }
    } else {
        info!("gateway disabled, waiting for shutdown signal");
        cancel.cancelled().await;
    }

    if let Some(task) = heartbeat {
        if let Err(e) = task.await {
            warn!(error = %e, "heartbeat task ended abnormally");
        }
    }

    stack.sessions.save_all().await;
    info!("wingman serve shutdown complete");
    Ok(())
}

/// Installs the fmt subscriber on stderr. `RUST_LOG` wins over
/// `agent.log_level`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wingman={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
