use crate::error::{OddsError, Result};
use crate::models::Game;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
pub const DEFAULT_REGIONS: &str = "us";
pub const DEFAULT_MARKETS: &str = "h2h,spreads,totals";

/// Something that can hand back the current odds for a sport
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Fetch every listed game for `sport`. An empty list means "no games".
    async fn fetch_odds(&self, sport: &str) -> Result<Vec<Game>>;
}

/// Request quota reported by The Odds API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiUsage {
    pub remaining: Option<u64>,
    pub used: Option<u64>,
}

pub struct OddsApiClient {
    api_key: String,
    base_url: String,
    regions: String,
    markets: String,
    client: reqwest::Client,
}

impl OddsApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: ODDS_API_BASE_URL.to_string(),
            regions: DEFAULT_REGIONS.to_string(),
            markets: DEFAULT_MARKETS.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_regions(mut self, regions: impl Into<String>) -> Self {
        self.regions = regions.into();
        self
    }

    pub fn with_markets(mut self, markets: impl Into<String>) -> Self {
        self.markets = markets.into();
        self
    }

    /// Bound every upstream request to `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<ApiUsage> {
        let url = format!("{}/sports", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let usage = usage_from_headers(response.headers());
        debug!(?usage, "Odds API usage");
        Ok(usage)
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn fetch_odds(&self, sport: &str) -> Result<Vec<Game>> {
        let url = format!("{}/sports/{}/odds", self.base_url, sport);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", self.regions.as_str()),
                ("markets", self.markets.as_str()),
                ("oddsFormat", "decimal"),
            ])
            .send()
            .await?;

        let status = response.status();
        let usage = usage_from_headers(response.headers());
        debug!(sport, %status, remaining = ?usage.remaining, "Odds API responded");

        // Error payloads come back as JSON objects; they are read as "no games"
        let body: Value = response.json().await?;
        if !status.is_success() {
            warn!(sport, %status, body = %body, "Odds API returned an error payload");
        }

        parse_games(sport, body)
    }
}

/// Turn a raw Odds API body into validated games.
/// Anything that is not an array is treated as zero games.
pub fn parse_games(sport: &str, body: Value) -> Result<Vec<Game>> {
    let Value::Array(items) = body else {
        warn!(sport, "Odds API response was not a list of games");
        return Ok(Vec::new());
    };

    let mut games = Vec::with_capacity(items.len());
    for item in items {
        let mut game: Game = serde_json::from_value(item)
            .map_err(|e| OddsError::MalformedUpstreamPayload(format!("{}: {}", sport, e)))?;
        game.validate()?;
        if game.sport_key.is_empty() {
            game.sport_key = sport.to_string();
        }
        games.push(game);
    }

    Ok(games)
}

fn usage_from_headers(headers: &reqwest::header::HeaderMap) -> ApiUsage {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| v as u64)
    };

    ApiUsage {
        remaining: read("x-requests-remaining"),
        used: read("x-requests-used"),
    }
}
