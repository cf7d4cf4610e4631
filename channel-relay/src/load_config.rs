//! `load_config` module: loads the optional YAML run config and injects the required secrets
//! from the environment.
//!
//! The YAML file only carries non-secret tunables (`relay:`) and endpoint overrides
//! (`endpoints:`); every section and field is optional. Secrets are read from the process
//! environment (a `.env` file is honoured) and a missing or unparsable secret is a startup
//! error naming the variable.
//!
//! # Errors
//! All errors use `anyhow::Error` with context and are surfaced at the CLI boundary.
use anyhow::{anyhow, Context, Result};
use channel_relay_core::config::RelayConfig;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const TELEGRAM_API_ID: &str = "TELEGRAM_API_ID";
pub const TELEGRAM_API_HASH: &str = "TELEGRAM_API_HASH";
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const FB_PAGE_ID: &str = "FB_PAGE_ID";
pub const LONG_LIVED_USER_TOKEN: &str = "LONG_LIVED_USER_TOKEN";

/// Base URLs of the external services. Overridable so clients can target test servers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub telegram_base: String,
    pub gemini_base: String,
    pub gemini_model: String,
    pub graph_base: String,
    pub graph_version: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            telegram_base: "https://t.me".to_string(),
            gemini_base: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            graph_base: "https://graph.facebook.com".to_string(),
            graph_version: "v19.0".to_string(),
        }
    }
}

/// The five required secrets. `Debug` never prints their values.
#[derive(Clone)]
pub struct Secrets {
    pub telegram_api_id: i32,
    pub telegram_api_hash: String,
    pub gemini_api_key: String,
    pub fb_page_id: String,
    pub long_lived_user_token: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_api_id", &self.telegram_api_id)
            .field("telegram_api_hash", &"<redacted>")
            .field("gemini_api_key", &"<redacted>")
            .field("fb_page_id", &self.fb_page_id)
            .field("long_lived_user_token", &"<redacted>")
            .finish()
    }
}

fn required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => {
            error!(variable = key, "Required environment variable is empty");
            Err(anyhow!("{key} must not be empty"))
        }
        Err(e) => {
            error!(variable = key, error = ?e, "Required environment variable missing");
            Err(anyhow!("{key} must be set"))
        }
    }
}

impl Secrets {
    /// Reads all secrets from the environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let raw_id = required(TELEGRAM_API_ID)?;
        let telegram_api_id = raw_id
            .parse::<i32>()
            .with_context(|| format!("{TELEGRAM_API_ID} must be an integer, got {raw_id:?}"))?;

        let secrets = Self {
            telegram_api_id,
            telegram_api_hash: required(TELEGRAM_API_HASH)?,
            gemini_api_key: required(GEMINI_API_KEY)?,
            fb_page_id: required(FB_PAGE_ID)?,
            long_lived_user_token: required(LONG_LIVED_USER_TOKEN)?,
        };
        info!(
            telegram_api_id,
            fb_page_id = %secrets.fb_page_id,
            "Loaded secrets from environment"
        );
        Ok(secrets)
    }
}

#[derive(Debug)]
pub struct CliConfig {
    pub relay: RelayConfig,
    pub endpoints: Endpoints,
    pub secrets: Secrets,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    relay: RelayConfig,
    endpoints: Endpoints,
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Loads the run config: defaults, overridden by the YAML file when given, plus secrets
/// from the environment.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let file = match path {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };
    let secrets = Secrets::from_env()?;
    file.relay.trace_loaded();

    Ok(CliConfig {
        relay: file.relay,
        endpoints: file.endpoints,
        secrets,
    })
}
