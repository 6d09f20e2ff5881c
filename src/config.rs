use crate::api::odds_api::{DEFAULT_MARKETS, DEFAULT_REGIONS, ODDS_API_BASE_URL};
use crate::models::DEFAULT_ACTIVE_SPORTS;
use crate::scheduler::{TierPolicies, TierPolicy};
use anyhow::{bail, Context, Result};
use chrono::Duration;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime configuration, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    pub odds_api_key: String,
    pub odds_api_base_url: String,
    pub regions: String,
    pub markets: String,
    pub active_sports: Vec<String>,
    pub database_path: PathBuf,
    /// Max age of a sport's cache before the on-demand path re-fetches
    pub cache_duration: Duration,
    /// How long finished games are kept before the baseline tier purges them
    pub retention: Duration,
    pub http_timeout: std::time::Duration,
    pub bind_addr: String,
    pub tiers: TierPolicies,
}

impl Config {
    /// Load `.env` then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let odds_api_key = match get("ODDS_API_KEY") {
            Some(key) => key,
            None => bail!("ODDS_API_KEY not set in .env file"),
        };

        let active_sports = match get("ACTIVE_SPORTS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_ACTIVE_SPORTS.iter().map(|s| s.to_string()).collect(),
        };

        let defaults = TierPolicies::default();
        let tiers = TierPolicies {
            immediate: TierPolicy {
                max_age: minutes(&get, "IMMEDIATE_MAX_AGE_MINUTES", defaults.immediate.max_age)?,
                imminence_window: Some(hours(
                    &get,
                    "IMMEDIATE_WINDOW_HOURS",
                    defaults.immediate.imminence_window.unwrap_or_else(|| Duration::hours(3)),
                )?),
            },
            same_day: TierPolicy {
                max_age: minutes(&get, "SAME_DAY_MAX_AGE_MINUTES", defaults.same_day.max_age)?,
                imminence_window: Some(hours(
                    &get,
                    "SAME_DAY_WINDOW_HOURS",
                    defaults.same_day.imminence_window.unwrap_or_else(|| Duration::hours(24)),
                )?),
            },
            baseline: TierPolicy {
                max_age: minutes(&get, "BASELINE_MAX_AGE_MINUTES", defaults.baseline.max_age)?,
                imminence_window: None,
            },
        };

        Ok(Self {
            odds_api_key,
            odds_api_base_url: get("ODDS_API_BASE_URL")
                .unwrap_or_else(|| ODDS_API_BASE_URL.to_string()),
            regions: get("ODDS_REGIONS").unwrap_or_else(|| DEFAULT_REGIONS.to_string()),
            markets: get("ODDS_MARKETS").unwrap_or_else(|| DEFAULT_MARKETS.to_string()),
            active_sports,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cache/odds.db")),
            cache_duration: hours(&get, "CACHE_DURATION_HOURS", Duration::hours(2))?,
            retention: hours(&get, "RETENTION_HOURS", Duration::hours(48))?,
            http_timeout: std::time::Duration::from_secs(parse_or(
                &get,
                "HTTP_TIMEOUT_SECS",
                30u64,
            )?),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            tiers,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn hours<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default.num_hours())?;
    if value < 0 {
        bail!("{} must not be negative", key);
    }
    match Duration::try_hours(value) {
        Some(duration) => Ok(duration),
        None => bail!("{} is out of range: {}", key, value),
    }
}

fn minutes<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default.num_minutes())?;
    if value < 0 {
        bail!("{} must not be negative", key);
    }
    match Duration::try_minutes(value) {
        Some(duration) => Ok(duration),
        None => bail!("{} is out of range: {}", key, value),
    }
}
