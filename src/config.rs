//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Twitter OAuth client credentials (env vars take precedence)
//! - Target account the follow check runs against
//! - Server binding and CORS origin
//! - Reward amount and credential TTL

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub twitter: TwitterConfig,
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Frontend origin allowed to make credentialed requests.
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// OAuth2 app client id (TWITTER_CLIENT_ID env var takes precedence).
    pub client_id: String,
    /// Account id users must follow to qualify.
    pub target_user_id: String,
    /// Handle of the target account, used in user-facing messages.
    pub target_handle: String,
    /// Redirect URI registered with the OAuth app.
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Energy granted per successful claim.
    pub claim_energy: u32,
    /// Verification credential lifetime in minutes.
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Expired-record purge interval in seconds; 0 disables the sweep.
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    /// OAuth client id (env var takes precedence, required if config value is empty)
    pub fn twitter_client_id(&self) -> Option<String> {
        match std::env::var("TWITTER_CLIENT_ID") {
            Ok(id) if !id.is_empty() => Some(id),
            _ => {
                if self.twitter.client_id.is_empty() {
                    None
                } else {
                    Some(self.twitter.client_id.clone())
                }
            }
        }
    }

    /// OAuth client secret, environment-only.
    pub fn twitter_client_secret(&self) -> Option<String> {
        std::env::var("TWITTER_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.rewards.token_ttl_minutes)
    }
}
