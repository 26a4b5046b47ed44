//! Configuration loading.
//!
//! Loads from `./config.toml` (or `$STRAYLIGHT_CONFIG_PATH`).
//! Precedence: env vars > config file > defaults. A missing file is not
//! an error; defaults are serviceable for local runs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engagement ceilings and timeouts.
    pub engagement: EngagementConfig,
    /// Reporting callback endpoint.
    pub callback: CallbackConfig,
    /// Optional generative-text provider.
    pub generative: GenerativeConfig,
    /// HTTP transport.
    pub server: ServerConfig,
}

/// Session engagement limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Turn ceiling per session, both speakers counted.
    pub max_turns: usize,
    /// Idle seconds before a session times out (and is sweepable).
    pub session_timeout_secs: u64,
    /// Minimum turns before a terminated session qualifies for the
    /// callback.
    pub min_turns_for_callback: usize,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            session_timeout_secs: 3600,
            min_turns_for_callback: 3,
        }
    }
}

impl EngagementConfig {
    /// Idle timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

/// Reporting callback endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Reporting endpoint URL.
    pub url: String,
    /// Delivery timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            url: "https://hackathon.guvi.in/api/updateHoneyPotFinalResult".to_owned(),
            timeout_secs: 10,
        }
    }
}

impl CallbackConfig {
    /// Delivery timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Generative provider settings. Absence of an API key selects the
/// `Unavailable` capability at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    /// Gemini API key. Usually set via `STRAYLIGHT_GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// Gemini model name.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_owned(),
            timeout_secs: 8,
        }
    }
}

impl GenerativeConfig {
    /// Per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8080`.
    pub bind: String,
    /// API key expected in the `X-API-Key` header.
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_owned(),
            api_key: "default-api-key-change-me".to_owned(),
        }
    }
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file >
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only when a config file exists but cannot be
    /// read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: Config =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config file path using a custom env resolver (for
    /// testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("STRAYLIGHT_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Engagement.
        if let Some(v) = env("STRAYLIGHT_MAX_TURNS") {
            Self::parse_override(&mut self.engagement.max_turns, "STRAYLIGHT_MAX_TURNS", &v);
        }
        if let Some(v) = env("STRAYLIGHT_SESSION_TIMEOUT_SECS") {
            Self::parse_override(
                &mut self.engagement.session_timeout_secs,
                "STRAYLIGHT_SESSION_TIMEOUT_SECS",
                &v,
            );
        }
        if let Some(v) = env("STRAYLIGHT_MIN_TURNS_FOR_CALLBACK") {
            Self::parse_override(
                &mut self.engagement.min_turns_for_callback,
                "STRAYLIGHT_MIN_TURNS_FOR_CALLBACK",
                &v,
            );
        }

        // Callback.
        if let Some(v) = env("STRAYLIGHT_CALLBACK_URL") {
            self.callback.url = v;
        }
        if let Some(v) = env("STRAYLIGHT_CALLBACK_TIMEOUT_SECS") {
            Self::parse_override(
                &mut self.callback.timeout_secs,
                "STRAYLIGHT_CALLBACK_TIMEOUT_SECS",
                &v,
            );
        }

        // Generative (env var presence enables the provider).
        if let Some(key) = env("STRAYLIGHT_GEMINI_API_KEY") {
            self.generative.api_key = Some(key);
        }
        if let Some(v) = env("STRAYLIGHT_GEMINI_MODEL") {
            self.generative.model = v;
        }

        // Server.
        if let Some(v) = env("STRAYLIGHT_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env("STRAYLIGHT_API_KEY") {
            self.server.api_key = v;
        }
    }

    fn parse_override<T: std::str::FromStr>(slot: &mut T, var: &str, value: &str) {
        match value.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid env override"),
        }
    }
}
