// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wingman - a personal AI agent runtime.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod chat;
mod serve;
mod sessions;
mod stack;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wingman_config::WingmanConfig;

/// Wingman - a personal AI agent runtime.
#[derive(Parser, Debug)]
#[command(name = "wingman", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the usual locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway and heartbeat scheduler.
    Serve,
    /// Send one message, or start an interactive chat when no text is given.
    Chat {
        /// Message text.
        text: Vec<String>,
        /// Stream the reply as it is generated (tools are not offered).
        #[arg(long)]
        stream: bool,
    },
    /// List stored sessions.
    Sessions,
    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Option<WingmanConfig> {
    let loaded = match path {
        Some(path) => wingman_config::load_and_validate_path(path),
        None => wingman_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => Some(config),
        Err(errors) => {
            wingman_config::render_errors(&errors);
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(config) = load_config(cli.config.as_ref()) else {
        std::process::exit(1);
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Chat { text, stream }) => {
            chat::run_chat(config, text.join(" "), stream).await
        }
        Some(Commands::Sessions) => sessions::run_sessions(config).await,
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => {
                    print!("{rendered}");
                    Ok(())
                }
                Err(e) => Err(wingman_core::WingmanError::Internal(format!(
                    "failed to render config: {e}"
                ))),
            }
        }
        None => {
            println!("wingman: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_chat_text() {
        let cli = Cli::parse_from(["wingman", "chat", "--stream", "what's", "up?"]);
        match cli.command {
            Some(Commands::Chat { text, stream }) => {
                assert!(stream);
                assert_eq!(text.join(" "), "what's up?");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn default_config_renders_as_toml() {
        let config = wingman_config::load_and_validate_str("")
            .expect("default config should be valid");
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[gateway]"), "{rendered}");
    }
}
