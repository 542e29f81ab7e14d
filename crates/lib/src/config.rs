//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.playbot/config.json`) and environment.
//! Slack tokens are usually supplied through the environment rather than the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::playground::Formatter;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Bot identity and logging.
    #[serde(default)]
    pub bot: BotConfig,

    /// Go Playground endpoints.
    #[serde(default)]
    pub playground: PlaygroundConfig,

    /// Reply correlation cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Slack API and tokens.
    #[serde(default)]
    pub slack: SlackConfig,
}

/// Bot identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Slack user name of the bot; messages must be addressed to a user with this name.
    #[serde(default)]
    pub name: String,

    /// Log every message at debug level.
    #[serde(default)]
    pub debug: bool,
}

/// Where snippets are formatted and compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaygroundConfig {
    /// Compile endpoint (form `body=<code>`, answers `{compile_errors, output}`).
    #[serde(default = "default_compile_url")]
    pub compile_url: String,

    /// Optional remote `/fmt` endpoint. When unset, the local goimports binary is used.
    #[serde(default)]
    pub format_url: Option<String>,

    /// goimports binary (default "goimports" on PATH).
    #[serde(default = "default_goimports")]
    pub goimports: String,
}

/// LRU capacity for original-message -> reply correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_cache_size")]
    pub size: usize,
}

/// Slack settings. Tokens are overridden by SLACK_BOT_TOKEN / SLACK_APP_TOKEN env.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (xoxb-...), used for users.info, chat.postMessage, chat.update.
    pub bot_token: Option<String>,
    /// App-level token (xapp-...) with connections:write, used to open the Socket Mode connection.
    pub app_token: Option<String>,
    /// Web API base (default https://slack.com/api). Useful for tests and proxies.
    pub api_base: Option<String>,
}

fn default_compile_url() -> String {
    "https://play.golang.org/compile".to_string()
}

fn default_goimports() -> String {
    "goimports".to_string()
}

fn default_cache_size() -> usize {
    1000
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            compile_url: default_compile_url(),
            format_url: None,
            goimports: default_goimports(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: default_cache_size(),
        }
    }
}

impl Config {
    /// Check the settings the relay cannot start without (tokens are checked separately).
    pub fn validate(&self) -> Result<()> {
        if self.bot.name.trim().is_empty() {
            anyhow::bail!("bot.name must be set to the bot's Slack user name");
        }
        if self.playground.compile_url.trim().is_empty() {
            anyhow::bail!("playground.compileUrl must not be empty");
        }
        if self.cache.size == 0 {
            anyhow::bail!("cache.size must be a positive integer");
        }
        Ok(())
    }

    /// Formatter selected by the playground settings.
    pub fn formatter(&self) -> Formatter {
        match self
            .playground
            .format_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            Some(url) => Formatter::Remote {
                url: url.to_string(),
            },
            None => Formatter::Goimports {
                binary: self.playground.goimports.clone(),
            },
        }
    }
}

fn env_token(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name).ok().and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
    })
}

fn config_token(token: Option<&String>) -> Option<String> {
    token.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN (or legacy SLACK_API_TOKEN) overrides config.
pub fn resolve_slack_bot_token(config: &Config) -> Option<String> {
    env_token(&["SLACK_BOT_TOKEN", "SLACK_API_TOKEN"])
        .or_else(|| config_token(config.slack.bot_token.as_ref()))
}

/// Resolve the Slack app-level token: env SLACK_APP_TOKEN overrides config.
pub fn resolve_slack_app_token(config: &Config) -> Option<String> {
    env_token(&["SLACK_APP_TOKEN"]).or_else(|| config_token(config.slack.app_token.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PLAYBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".playbot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, PLAYBOT_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
