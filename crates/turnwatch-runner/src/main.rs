//! Turn announcer entry point.
//!
//! The runner polls a hosted Unciv game, and whenever the turn or the active
//! player changes it posts an announcement to a Telegram chat. On a new turn
//! it follows up with a short narrative of what changed on the map.
//!
//! # Architecture
//!
//! ```text
//! Unciv server --> GameServerSource --> TurnWatcher --> Narrator --> TelegramSink
//!                                     (diff, classify, track)
//! ```
//!
//! A cycle that fails never stops the loop; only Ctrl-C does.

mod config;
mod error;
mod fetch;
mod llm;
mod prompt;
mod telegram;

use anyhow::Context as _;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use turnwatch_core::message::ReportDigest;
use turnwatch_core::{CallTimeouts, TrackerState, TurnWatcher};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::fetch::GameServerSource;
use crate::llm::{LlmBackend, LlmSummarizer, Narrator};
use crate::prompt::PromptEngine;
use crate::telegram::TelegramSink;

/// Application entry point.
///
/// Initializes logging, loads configuration, assembles the collaborators,
/// then polls until interrupted.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("turnwatch-runner starting");
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
    }

    let config = RunnerConfig::from_env().context("loading configuration")?;
    info!(
        game_id = config.game_id,
        server_url = config.server_url,
        check_interval_secs = config.check_interval.as_secs(),
        call_timeout_ms = config.call_timeout.as_millis(),
        named_players = config.player_names.len(),
        "configuration loaded"
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("turnwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RunnerError::Http(e.to_string()))?;

    let source = GameServerSource::new(client.clone(), &config.server_url, &config.game_id);
    info!(
        preview_url = source.preview_url(),
        save_url = source.save_url(),
        "watching game"
    );
    let sink = TelegramSink::new(
        client.clone(),
        &config.telegram_api_url,
        &config.bot_token,
        &config.chat_id,
    );

    let narrator = match &config.llm {
        Some(llm) => {
            let prompts = PromptEngine::new(config.templates_dir.as_deref())
                .context("loading prompt templates")?;
            Narrator::Llm(LlmSummarizer::new(LlmBackend::new(client, llm), prompts))
        }
        None => Narrator::Digest(ReportDigest),
    };
    info!(
        narrator = narrator.name(),
        model = config.llm.as_ref().map(|llm| llm.model.as_str()),
        "narrator configured"
    );

    let watcher = TurnWatcher::new(
        source,
        narrator,
        sink,
        config.player_names.clone(),
        CallTimeouts::uniform(config.call_timeout),
    );

    let mut state = TrackerState::new();
    let summary = watcher
        .run_until(&mut state, config.check_interval, shutdown_signal())
        .await;

    info!(
        cycles = summary.cycles,
        notified = summary.notified,
        aborted = summary.aborted,
        last_turn = state.last_turn(),
        "turnwatch-runner stopped"
    );
    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
