//! # Bot Configuration Module
//!
//! This module defines the runtime configuration of the bot: deck sources,
//! cooldown policy, history storage and the Telegram token. Values are read
//! from the environment (optionally seeded from a `.env` file).

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::deck_loader::DeckSource;
use crate::session::UserKey;

// Constants for bot configuration
pub const DEFAULT_DECK_PATH: &str = "data/deck.json";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Deck loading configuration
#[derive(Debug, Clone)]
pub struct DeckConfig {
    /// Local catalog file, tried first
    pub path: PathBuf,
    /// Remote catalog, tried when the local file is missing or invalid
    pub url: Option<String>,
    /// Upper bound for the remote fetch in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DECK_PATH),
            url: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl DeckConfig {
    /// Primary source of the catalog
    pub fn primary_source(&self) -> DeckSource {
        DeckSource::File(self.path.clone())
    }

    /// Fallback source, if a URL is configured
    pub fn fallback_source(&self) -> Option<DeckSource> {
        self.url.as_ref().map(|url| DeckSource::Url {
            url: url.clone(),
            timeout: Duration::from_secs(self.fetch_timeout_secs),
        })
    }
}

/// Cooldown configuration between completed readings
#[derive(Debug, Clone)]
pub struct CooldownConfig {
    /// Minimum interval between two completed readings of one user
    pub window_secs: u64,
    /// Users never subject to the cooldown
    pub exempt_users: HashSet<UserKey>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_COOLDOWN_SECS,
            exempt_users: HashSet::new(),
        }
    }
}

/// Top-level configuration structure
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub deck: DeckConfig,
    pub cooldown: CooldownConfig,
    /// PostgreSQL URL for reading history; in-memory history when absent
    pub database_url: Option<String>,
    /// Number of readings listed by `/history`
    pub history_limit: usize,
}

impl BotConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        let mut deck = DeckConfig::default();
        if let Some(path) = get("DECK_PATH") {
            deck.path = PathBuf::from(path);
        }
        deck.url = get("DECK_URL");
        if let Some(secs) = get("DECK_FETCH_TIMEOUT_SECS") {
            deck.fetch_timeout_secs = secs
                .parse()
                .with_context(|| format!("Invalid DECK_FETCH_TIMEOUT_SECS: {secs}"))?;
        }

        let mut cooldown = CooldownConfig::default();
        if let Some(secs) = get("COOLDOWN_SECS") {
            cooldown.window_secs = secs
                .parse()
                .with_context(|| format!("Invalid COOLDOWN_SECS: {secs}"))?;
        }
        if let Some(list) = get("COOLDOWN_EXEMPT_USERS") {
            cooldown.exempt_users = parse_user_list(&list)?;
        }

        let history_limit = match get("HISTORY_LIMIT") {
            Some(limit) => limit
                .parse()
                .with_context(|| format!("Invalid HISTORY_LIMIT: {limit}"))?,
            None => DEFAULT_HISTORY_LIMIT,
        };

        Ok(Self {
            bot_token,
            deck,
            cooldown,
            database_url: get("DATABASE_URL"),
            history_limit,
        })
    }
}

/// Parse a comma-separated list of Telegram user ids
pub fn parse_user_list(list: &str) -> Result<HashSet<UserKey>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map(UserKey)
                .with_context(|| format!("Invalid user id in COOLDOWN_EXEMPT_USERS: {s}"))
        })
        .collect()
}
