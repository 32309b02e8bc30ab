//! Run configuration and the JSON cache dot-file.
//!
//! All pipeline state is passed explicitly: the orchestrator receives a
//! `RunConfig` at construction time instead of reading process-wide
//! singletons, which also makes it trivial to run several pipelines in one
//! test.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PRICE: u32 = 300;
pub const DEFAULT_CACHE_FILE: &str = ".roomwatch";
pub const LOGLEVEL_ENV: &str = "ROOMWATCH_LOGLEVEL";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for one end-to-end monitoring run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub loglevel: String,
    pub verbose: bool,
    pub debug: bool,
    pub info: bool,
    pub use_cache: bool,
    pub use_db: bool,
    /// 0 means monitor forever.
    pub max_attempts: u32,
    pub interval: Duration,
    pub max_price: u32,
    pub checkin: Option<NaiveDate>,
    pub checkout: Option<NaiveDate>,
    pub sms_enabled: bool,
    pub email_enabled: bool,
    /// Non-fatal configuration complaints, logged once at startup.
    pub warnings: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            verbose: false,
            debug: false,
            info: false,
            use_cache: false,
            use_db: true,
            max_attempts: 0,
            interval: Duration::from_secs(1),
            max_price: DEFAULT_MAX_PRICE,
            checkin: None,
            checkout: None,
            sms_enabled: false,
            email_enabled: false,
            warnings: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Fold in the log level from the environment when the CLI left it
    /// unset. Invalid values are ignored with a recorded warning instead of
    /// failing the run.
    pub fn apply_env(&mut self, explicit_loglevel: Option<&str>) {
        let candidate = match explicit_loglevel {
            Some(level) => Some(level.to_string()),
            None => std::env::var(LOGLEVEL_ENV).ok(),
        };
        if let Some(level) = candidate {
            let level = level.to_lowercase();
            if VALID_LEVELS.contains(&level.as_str()) {
                self.loglevel = level;
            } else {
                self.warnings.push(format!(
                    "ignoring {LOGLEVEL_ENV} with invalid value of {level}"
                ));
            }
        }
    }

    /// Fold cached values in; explicit configuration wins over the cache.
    pub fn apply_cache(&mut self, cache: &RunCache) {
        if self.checkin.is_none() {
            self.checkin = cache.event_start;
        }
        if self.checkout.is_none() {
            self.checkout = cache.event_end;
        }
        if let Some(price) = cache.max_price {
            self.max_price = price;
        }
        if let Some(sms) = cache.send_sms {
            self.sms_enabled = sms;
        }
        if let Some(email) = cache.send_email {
            self.email_enabled = email;
        }
    }

    pub fn unbounded(&self) -> bool {
        self.max_attempts == 0
    }
}

/// Small JSON dot-file carrying state between runs: discovered event dates,
/// price ceiling, and notification toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCache {
    pub event_start: Option<NaiveDate>,
    pub event_end: Option<NaiveDate>,
    pub max_price: Option<u32>,
    pub send_sms: Option<bool>,
    pub send_email: Option<bool>,
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    persist: bool,
}

impl RunCache {
    /// Load the cache file, tolerating a missing one.
    pub fn load(path: impl AsRef<Path>, persist: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut cache = match std::fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str::<RunCache>(&raw)
                .with_context(|| format!("malformed cache file {}", path.display()))?,
            _ => RunCache::default(),
        };
        cache.path = path;
        cache.persist = persist;
        Ok(cache)
    }

    pub fn set_event_window(&mut self, start: NaiveDate, end: NaiveDate) {
        self.event_start = Some(start);
        self.event_end = Some(end);
    }

    /// Write the cache back out, if caching is enabled.
    pub fn flush(&self) -> Result<()> {
        if !self.persist {
            return Ok(());
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing cache file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unbounded_with_price_ceiling() {
        let config = RunConfig::default();
        assert!(config.unbounded());
        assert_eq!(config.max_price, DEFAULT_MAX_PRICE);
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test]
    fn invalid_loglevel_is_ignored_with_warning() {
        let mut config = RunConfig::default();
        config.apply_env(Some("loud"));
        assert_eq!(config.loglevel, "info");
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn explicit_loglevel_wins() {
        let mut config = RunConfig::default();
        config.apply_env(Some("debug"));
        assert_eq!(config.loglevel, "debug");
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn cache_does_not_override_explicit_dates() {
        let mut config = RunConfig {
            checkin: NaiveDate::from_ymd_opt(2025, 8, 28),
            ..RunConfig::default()
        };
        let cache = RunCache {
            event_start: NaiveDate::from_ymd_opt(2025, 8, 29),
            event_end: NaiveDate::from_ymd_opt(2025, 9, 1),
            max_price: Some(250),
            ..RunCache::default()
        };
        config.apply_cache(&cache);
        assert_eq!(config.checkin, NaiveDate::from_ymd_opt(2025, 8, 28));
        assert_eq!(config.checkout, NaiveDate::from_ymd_opt(2025, 9, 1));
        assert_eq!(config.max_price, 250);
    }

    #[test]
    fn missing_cache_file_loads_as_default() {
        let cache = RunCache::load("/nonexistent/.roomwatch", false).unwrap();
        assert!(cache.event_start.is_none());
        assert!(cache.flush().is_ok());
    }
}
