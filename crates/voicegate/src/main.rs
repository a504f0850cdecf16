// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use voicegate::oauth::login::LoginPhase;
use voicegate::realtime::{CallContext, ToolSpec};
use voicegate::redact::mask_token;
use voicegate::{GateConfig, Provider, VoiceGate};

#[derive(Parser)]
#[command(name = "voicegate", version, about = "Realtime voice session bootstrap and OAuth sign-in")]
struct Cli {
    #[command(flatten)]
    config: GateConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in to a provider through the browser.
    ///
    /// Keeps the loopback listener open until sign-in finishes or times out.
    Login { provider: Provider },
    /// Show per-provider configuration and sign-in status.
    Status,
    /// Delete the stored token for a provider.
    Logout { provider: Provider },
    /// Exchange the stored refresh token for a new access token.
    Refresh { provider: Provider },
    /// Negotiate a realtime session and print its descriptor.
    Session {
        /// JSON file holding an array of tool definitions.
        #[arg(long)]
        tools: Option<PathBuf>,
        /// Chat session the call belongs to.
        #[arg(long)]
        chat_session: Option<String>,
        /// Model to use when a connection does not pin one.
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.config);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &GateConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init(),
    };
    drop(result);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let gate = VoiceGate::new(&cli.config)?;

    let code = match cli.command {
        Command::Login { provider } => {
            let url = gate.start_login(provider).await?;
            eprintln!("Open this URL to sign in to {provider}:\n\n  {url}\n");
            let status = gate.wait_login(provider, cli.config.login_timeout()).await?;
            gate.shutdown().await;
            match status.phase {
                LoginPhase::Complete => {
                    eprintln!("Signed in to {provider}.");
                    0
                }
                LoginPhase::Error => {
                    let code = status.error_code.as_deref().unwrap_or("error");
                    let message = status.error.as_deref().unwrap_or("sign-in failed");
                    eprintln!("error: {code}: {message}");
                    1
                }
                LoginPhase::Idle | LoginPhase::Pending => {
                    eprintln!("error: sign-in timed out");
                    1
                }
            }
        }
        Command::Status => {
            let statuses = gate.provider_statuses().await?;
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            0
        }
        Command::Logout { provider } => {
            let removed = gate.logout(provider).await?;
            eprintln!("{}", if removed { "Signed out." } else { "No stored token." });
            0
        }
        Command::Refresh { provider } => {
            let token = gate.refresh(provider).await?;
            eprintln!("Refreshed {provider}: {}", mask_token(&token.access_token));
            0
        }
        Command::Session { tools, chat_session, model } => {
            let tools = match tools {
                Some(path) => load_tools(&path)?,
                None => Vec::new(),
            };
            let context =
                CallContext { chat_session_id: chat_session, preferred_model: model, ..Default::default() };
            let session = gate.create_session(tools, context).await?;
            let mut out = serde_json::to_value(&session)?;
            if let Some(fields) = out.as_object_mut() {
                fields.insert("token".to_owned(), mask_token(&session.token).into());
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
            0
        }
    };
    Ok(code)
}

fn load_tools(path: &Path) -> anyhow::Result<Vec<ToolSpec>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
