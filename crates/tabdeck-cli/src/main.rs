//! # tabdeck
//!
//! Operator CLI for the tab manifest: save a tab list, show the freshest
//! stored copy, or stream change events as server-sent-event frames.

#![deny(unsafe_code)]

mod commands;
mod context;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::context::{AppContext, Overrides};

/// Tab manifest tool.
#[derive(Parser, Debug)]
#[command(name = "tabdeck", about = "Save, inspect, and watch the tab manifest", version)]
struct Cli {
    /// Settings file (default: `~/.tabdeck/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Primary manifest path (overrides settings).
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Alternate manifest path (overrides settings).
    #[arg(long, global = true)]
    fallback: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Save a request body (`{"pin", "tabs", "activeIndex"}`).
    Save {
        /// JSON file to read; `-` or omitted reads stdin.
        input: Option<PathBuf>,

        /// PIN to use when the body carries none.
        #[arg(long)]
        pin: Option<String>,
    },
    /// Print the freshest stored manifest.
    Show,
    /// Stream change events until interrupted.
    Watch,
    /// Print effective settings with secrets masked.
    Settings,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            settings_file: self.settings.clone(),
            manifest: self.manifest.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let base_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let ctx = AppContext::load(&cli.overrides(), &base_dir)?;
    tabdeck_core::logging::init_subscriber(&ctx.settings.logging.level, ctx.settings.logging.json);

    let mut stdout = std::io::stdout().lock();
    let status = match cli.command {
        Command::Save { input, pin } => {
            let body = commands::read_body(input.as_deref()).await?;
            commands::save(&ctx, body, pin.as_deref(), &mut stdout).await?
        }
        Command::Show => commands::show(&ctx, &mut stdout).await?,
        Command::Watch => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            drop(tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, stopping watch");
                }
                on_signal.cancel();
            }));
            commands::watch(&ctx, cancel, &mut stdout).await?
        }
        Command::Settings => commands::settings(&ctx, &mut stdout)?,
    };
    Ok(status.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_save_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "tabdeck",
            "save",
            "body.json",
            "--pin",
            "4321",
            "--manifest",
            "data/manifest.json",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Save {
                input: Some(PathBuf::from("body.json")),
                pin: Some("4321".to_string()),
            }
        );
        assert_eq!(cli.overrides().manifest, Some(PathBuf::from("data/manifest.json")));
        assert!(cli.overrides().fallback.is_none());
    }

    #[test]
    fn save_input_is_optional() {
        let cli = Cli::try_parse_from(["tabdeck", "--fallback", "/tmp/m.json", "save"]).unwrap();
        assert_eq!(cli.command, Command::Save { input: None, pin: None });
        assert_eq!(cli.overrides().fallback, Some(PathBuf::from("/tmp/m.json")));
    }

    #[test]
    fn subcommand_required() {
        assert!(Cli::try_parse_from(["tabdeck"]).is_err());
    }
}
