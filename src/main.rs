//! Straylight server binary.
//!
//! Loads configuration, wires the engagement engine, runs the idle
//! session sweep in the background, and serves the HTTP transport.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use straylight::callback::CallbackDispatcher;
use straylight::config::Config;
use straylight::engine::Engine;
use straylight::generative::gemini::GeminiGenerator;
use straylight::generative::GenerativeText;
use straylight::http::{self, AppState};
use straylight::logging;

/// How often the background sweep looks for idle sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Conversational honeypot server.
#[derive(Debug, Parser)]
#[command(name = "straylight", version, about)]
struct Cli {
    /// Bind address override (takes precedence over config and env).
    #[arg(long)]
    bind: Option<String>,

    /// Config file path (same effect as STRAYLIGHT_CONFIG_PATH).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for rotating JSON logs.
    #[arg(long, default_value = "logs")]
    logs_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; absence is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        std::env::set_var("STRAYLIGHT_CONFIG_PATH", path);
    }

    let config = Config::load().context("failed to load configuration")?;
    let _logging_guard =
        logging::init_production(&cli.logs_dir).context("failed to initialise logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "straylight starting");

    // The generative capability is selected once, here. Absence of an
    // API key means every generative path falls back to the rules.
    let generative = match config.generative.api_key.clone() {
        Some(api_key) => {
            info!(model = %config.generative.model, "generative capability available");
            GenerativeText::Available {
                provider: Arc::new(GeminiGenerator::new(
                    config.generative.model.clone(),
                    api_key,
                )),
                timeout: config.generative.timeout(),
            }
        }
        None => {
            info!("no generative API key, rule-based replies only");
            GenerativeText::Unavailable
        }
    };

    let callback = CallbackDispatcher::new(
        config.callback.url.clone(),
        config.callback.timeout(),
        config.engagement.min_turns_for_callback,
    );

    let engine = Arc::new(Engine::new(
        config.engagement.clone(),
        callback,
        generative,
    ));

    // Background maintenance: sweep idle sessions on an interval,
    // independent of per-request termination.
    let sweeper = Arc::clone(&engine);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            sweeper.force_cleanup().await;
        }
    });

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let state = AppState {
        engine,
        api_key: config.server.api_key.clone(),
    };

    http::serve(&bind, state).await
}
