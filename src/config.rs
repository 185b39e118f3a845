//! Service configuration: TOML structs, parsing, and validation.
//!
//! Built once at startup from defaults, an optional TOML file, and CLI/env
//! overrides applied by the `serve` command, then shared read-only with every handler
//! through `AppState`.
//!
//! ```toml
//! port = 7070
//! cors_allow_origins = ["https://counting.example.com"]
//! otp_ttl_minutes = 10
//! trust_client_book_quantity = false
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    /// `["*"]` allows any origin.
    pub cors_allow_origins: Vec<String>,
    /// HS256 secret for access tokens. Unset means development mode:
    /// tokens are decoded without signature verification.
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    pub leaderboard_default_limit: i64,
    pub leaderboard_max_limit: i64,
    /// Use the book quantity sent with a count instead of the catalog value.
    pub trust_client_book_quantity: bool,
    /// bcrypt work factor for new password hashes, 4..=31.
    pub password_hash_cost: u32,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 7070,
            cors_allow_origins: vec!["*".to_string()],
            jwt_secret: None,
            token_ttl_hours: 12,
            otp_ttl_minutes: 10,
            leaderboard_default_limit: 10,
            leaderboard_max_limit: 100,
            trust_client_book_quantity: false,
            password_hash_cost: bcrypt::DEFAULT_COST,
            request_timeout_secs: 30,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults, overlaid with the TOML file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => parse_toml_file(path),
            None => Ok(Config::default()),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allow_origins.iter().any(|o| o == "*")
    }

    /// Clamp a requested leaderboard size into `1..=leaderboard_max_limit`.
    pub fn leaderboard_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.leaderboard_default_limit)
            .clamp(1, self.leaderboard_max_limit)
    }
}

/// Parse a configuration from a TOML string.
pub fn parse_toml(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a configuration from a TOML file path.
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    parse_toml(&content)
}

/// Check limits and TTLs for logical consistency.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.token_ttl_hours <= 0 {
        anyhow::bail!("token_ttl_hours must be positive");
    }
    if config.otp_ttl_minutes <= 0 {
        anyhow::bail!("otp_ttl_minutes must be positive");
    }
    if config.leaderboard_default_limit <= 0 || config.leaderboard_max_limit <= 0 {
        anyhow::bail!("leaderboard limits must be positive");
    }
    if config.leaderboard_default_limit > config.leaderboard_max_limit {
        anyhow::bail!(
            "leaderboard_default_limit ({}) exceeds leaderboard_max_limit ({})",
            config.leaderboard_default_limit,
            config.leaderboard_max_limit
        );
    }
    if !(4..=31).contains(&config.password_hash_cost) {
        anyhow::bail!(
            "password_hash_cost must be between 4 and 31, got {}",
            config.password_hash_cost
        );
    }
    if config.request_timeout_secs == 0 {
        anyhow::bail!("request_timeout_secs must be positive");
    }
    if config.cors_allow_origins.is_empty() {
        anyhow::bail!("cors_allow_origins must list at least one origin (or \"*\")");
    }
    Ok(())
}
