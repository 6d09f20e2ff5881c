pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod utils;
pub mod web;

pub use api::*;
pub use error::OddsError;
pub use models::*;
pub use scheduler::{RefreshReport, RefreshScheduler, RefreshStatus, RefreshTier};
pub use store::CacheStore;
pub use utils::*;

use chrono::{DateTime, Duration, Utc};
use error::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use utils::value_analysis::{
    analyze_games, available_books, book_has_coverage, find_top_value_plays, GameValue, ValuePlay,
};

/// Everything a consumer needs to show one sport against one sportsbook
#[derive(Debug, Clone, Serialize)]
pub struct ValueReport {
    pub sport: String,
    pub sport_title: Option<String>,
    pub bookmaker: String,
    pub bookmaker_title: Option<String>,
    pub game_count: usize,
    /// False when the selected book prices none of the games
    pub book_has_coverage: bool,
    pub available_books: Vec<SportsbookInfo>,
    pub top_value_plays: Vec<ValuePlay>,
    pub games: Vec<GameValue>,
}

/// Read side of the cache: serves a sport's upcoming games, pulling from
/// upstream first when the sport's cache is older than `cache_duration`.
#[derive(Clone)]
pub struct OddsService {
    store: CacheStore,
    source: Arc<dyn OddsSource>,
    cache_duration: Duration,
}

impl OddsService {
    pub fn new(store: CacheStore, source: Arc<dyn OddsSource>, cache_duration: Duration) -> Self {
        Self {
            store,
            source,
            cache_duration,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn source(&self) -> Arc<dyn OddsSource> {
        Arc::clone(&self.source)
    }

    /// Upcoming games for `sport`, freshly fetched if the cache is stale
    pub async fn sport_odds(&self, sport: &str) -> Result<Vec<Game>> {
        self.sport_odds_at(sport, Utc::now()).await
    }

    pub async fn sport_odds_at(&self, sport: &str, now: DateTime<Utc>) -> Result<Vec<Game>> {
        let needs_fetch = match self.store.read_last_fetch(sport)? {
            Some(last_fetch) => now - last_fetch > self.cache_duration,
            None => true,
        };

        if needs_fetch {
            let stored =
                scheduler::fetch_and_store(&self.store, self.source.as_ref(), sport, now).await?;
            info!(sport, games = stored, "Fetched fresh odds");
        } else {
            debug!(sport, "Serving odds from cache");
        }

        let games = self
            .store
            .read_cached_games(sport)?
            .into_iter()
            .filter(|game| game.commence_time > now)
            .collect();

        Ok(games)
    }

    /// Rank `book`'s spreads for `sport` against the rest of the market
    pub async fn value_report(&self, sport: &str, book: &str, top_n: usize) -> Result<ValueReport> {
        self.value_report_at(sport, book, top_n, Utc::now()).await
    }

    pub async fn value_report_at(
        &self,
        sport: &str,
        book: &str,
        top_n: usize,
        now: DateTime<Utc>,
    ) -> Result<ValueReport> {
        let games = self.sport_odds_at(sport, now).await?;

        Ok(ValueReport {
            sport: sport.to_string(),
            sport_title: sport_title(sport).map(str::to_string),
            bookmaker: book.to_string(),
            bookmaker_title: sportsbook_title(book).map(str::to_string),
            game_count: games.len(),
            book_has_coverage: book_has_coverage(&games, book),
            available_books: available_books(&games),
            top_value_plays: find_top_value_plays(&games, book, top_n),
            games: analyze_games(&games, book),
        })
    }
}
