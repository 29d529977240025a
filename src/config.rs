// Startup configuration.
//
// Values come from an optional `config.json` (the bot's historical format, with
// `token` and `connectionString` keys) and are then overridden by environment
// variables, which may in turn come from a `.env` file.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::inactivity::command_interpreter::DEFAULT_PREFIX;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_DATABASE_URL: &str = "data/inactivity.db";
/// `DATABASE_URL` value selecting the non-persistent store.
pub const MEMORY_DATABASE_URL: &str = "memory";

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
/// Lower bound for the sweep timer, so `0` can't turn it into a busy loop.
const MIN_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_GUILD_PAUSE_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

/// On-disk `config.json` layout.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    token: Option<String>,
    connection_string: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub database_url: String,
    pub command_prefix: String,
    pub sweep_interval: Duration,
    pub guild_pause: Duration,
    pub connect_timeout: Duration,
}

impl BotConfig {
    /// Load `config.json` (or the file named by `CONFIG_PATH`) and apply the
    /// process environment on top.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let file = read_file_config(Path::new(&path))?;
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let seconds = |key: &str, default: u64| {
            Duration::from_secs(
                non_empty(key)
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(default),
            )
        };

        let token = non_empty("DISCORD_TOKEN").or(file.token.filter(|t| !t.trim().is_empty()));
        let Some(token) = token else {
            bail!("Missing Discord token! Set DISCORD_TOKEN or add \"token\" to config.json.");
        };

        let database_url = non_empty("DATABASE_URL")
            .or(file.connection_string)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            token,
            database_url,
            command_prefix: non_empty("COMMAND_PREFIX")
                .map(|p| p.trim().to_string())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            sweep_interval: seconds("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)
                .max(Duration::from_secs(MIN_SWEEP_INTERVAL_SECS)),
            guild_pause: seconds("GUILD_PAUSE_SECS", DEFAULT_GUILD_PAUSE_SECS),
            connect_timeout: seconds("STORE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

fn read_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
