use crate::error::{OddsError, Result};
use crate::models::Game;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed cache of upstream odds.
///
/// `odds_cache` holds one row per (sport, game id) with the game's JSON payload;
/// `last_fetch` holds one row per sport with the time of the last successful pull.
/// Timestamps are stored as Unix milliseconds so they order numerically.
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct CacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl CacheStore {
    /// Open (or create) the cache database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OddsError::StoreFailure(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        Self::with_connection(conn)
    }

    /// Throwaway store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OddsError::StoreFailure("cache connection lock poisoned".to_string()))
    }

    /// Insert or replace the cached payload for (sport, game.id)
    pub fn upsert_game(&self, sport: &str, game: &Game, fetched_at: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_string(game)
            .map_err(|e| OddsError::StoreFailure(format!("encode game {}: {}", game.id, e)))?;

        self.lock()?.execute(
            "INSERT INTO odds_cache (sport_key, game_id, data, commence_time, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (sport_key, game_id)
             DO UPDATE SET data = excluded.data,
                           commence_time = excluded.commence_time,
                           fetched_at = excluded.fetched_at",
            params![
                sport,
                game.id,
                payload,
                game.commence_time.timestamp_millis(),
                fetched_at.timestamp_millis()
            ],
        )?;

        Ok(())
    }

    /// Record a successful upstream pull for `sport`
    pub fn touch_last_fetch(&self, sport: &str, fetched_at: DateTime<Utc>) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO last_fetch (sport_key, fetched_at)
             VALUES (?1, ?2)
             ON CONFLICT (sport_key)
             DO UPDATE SET fetched_at = excluded.fetched_at",
            params![sport, fetched_at.timestamp_millis()],
        )?;

        Ok(())
    }

    /// All cached games for `sport`, most recently fetched first
    pub fn read_cached_games(&self, sport: &str) -> Result<Vec<Game>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT game_id, data FROM odds_cache
             WHERE sport_key = ?1
             ORDER BY fetched_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![sport], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut games = Vec::new();
        for row in rows {
            let (game_id, data) = row?;
            let game: Game = serde_json::from_str(&data).map_err(|e| {
                OddsError::StoreFailure(format!("decode cached game {}: {}", game_id, e))
            })?;
            games.push(game);
        }

        Ok(games)
    }

    /// When `sport` was last pulled from upstream, if ever
    pub fn read_last_fetch(&self, sport: &str) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> = self
            .lock()?
            .query_row(
                "SELECT fetched_at FROM last_fetch WHERE sport_key = ?1",
                params![sport],
                |row| row.get(0),
            )
            .optional()?;

        Ok(millis.and_then(from_millis))
    }

    /// Whether any cached game for `sport` starts in `(from, to)`
    pub fn has_game_starting_between(
        &self,
        sport: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool> {
        let exists: bool = self.lock()?.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM odds_cache
                WHERE sport_key = ?1 AND commence_time > ?2 AND commence_time < ?3
             )",
            params![sport, from.timestamp_millis(), to.timestamp_millis()],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    /// Delete cached games that started before `cutoff`. Returns rows removed.
    pub fn purge_started_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.lock()?.execute(
            "DELETE FROM odds_cache WHERE commence_time < ?1",
            params![cutoff.timestamp_millis()],
        )?;

        debug!(removed, %cutoff, "Purged expired games from cache");
        Ok(removed)
    }

    /// Number of cached rows for `sport`
    pub fn count_games(&self, sport: &str) -> Result<usize> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM odds_cache WHERE sport_key = ?1",
            params![sport],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS odds_cache (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sport_key TEXT NOT NULL,
            game_id TEXT NOT NULL,
            data TEXT NOT NULL,
            commence_time INTEGER NOT NULL,
            fetched_at INTEGER NOT NULL,
            UNIQUE (sport_key, game_id)
        );

        CREATE INDEX IF NOT EXISTS idx_odds_sport_fetched ON odds_cache(sport_key, fetched_at);
        CREATE INDEX IF NOT EXISTS idx_odds_sport_commence ON odds_cache(sport_key, commence_time);

        CREATE TABLE IF NOT EXISTS last_fetch (
            sport_key TEXT PRIMARY KEY,
            fetched_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}
