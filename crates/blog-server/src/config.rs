use std::env;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    /// Upper bound on the draft lookup performed while rebuilding the search index.
    pub draft_fetch_timeout: Duration,
    pub default_locale: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: var("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            port: var("PORT", "1337")
                .parse()
                .context("PORT must be a valid port number")?,
            draft_fetch_timeout: Duration::from_millis(
                var("DRAFT_FETCH_TIMEOUT_MS", "2000")
                    .parse()
                    .context("DRAFT_FETCH_TIMEOUT_MS must be a number of milliseconds")?,
            ),
            default_locale: var("DEFAULT_LOCALE", "en"),
        })
    }
}
