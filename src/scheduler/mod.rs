//! Tiered refresh of the odds cache.
//!
//! Each tier is run by an external trigger (cron, CLI). For every configured
//! sport the tier decides whether the cache is stale, and if so pulls the
//! sport from upstream and writes it into the [`CacheStore`]. Sports are
//! processed one at a time; a failure for one sport is recorded in the
//! report and the run moves on.

use crate::api::OddsSource;
use crate::error::{OddsError, Result};
use crate::store::CacheStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Refresh priority, from most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTier {
    /// Sports with a game about to start
    Immediate,
    /// Sports with a game later today
    SameDay,
    /// Every sport, regardless of schedule
    Baseline,
}

impl RefreshTier {
    pub const ALL: [RefreshTier; 3] = [
        RefreshTier::Immediate,
        RefreshTier::SameDay,
        RefreshTier::Baseline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTier::Immediate => "immediate",
            RefreshTier::SameDay => "same_day",
            RefreshTier::Baseline => "baseline",
        }
    }
}

impl fmt::Display for RefreshTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshTier {
    type Err = OddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "immediate" | "high" => Ok(RefreshTier::Immediate),
            "same_day" | "medium" => Ok(RefreshTier::SameDay),
            "baseline" | "low" => Ok(RefreshTier::Baseline),
            _ => Err(OddsError::UnknownTier(s.to_string())),
        }
    }
}

/// How stale a sport may get under a tier, and whether the tier only
/// fetches sports with a game starting soon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub max_age: Duration,
    pub imminence_window: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicies {
    pub immediate: TierPolicy,
    pub same_day: TierPolicy,
    pub baseline: TierPolicy,
}

impl Default for TierPolicies {
    fn default() -> Self {
        Self {
            immediate: TierPolicy {
                max_age: Duration::minutes(30),
                imminence_window: Some(Duration::hours(3)),
            },
            same_day: TierPolicy {
                max_age: Duration::hours(2),
                imminence_window: Some(Duration::hours(24)),
            },
            baseline: TierPolicy {
                max_age: Duration::hours(6),
                imminence_window: None,
            },
        }
    }
}

impl TierPolicies {
    pub fn policy(&self, tier: RefreshTier) -> TierPolicy {
        match tier {
            RefreshTier::Immediate => self.immediate,
            RefreshTier::SameDay => self.same_day,
            RefreshTier::Baseline => self.baseline,
        }
    }
}

/// Whether a sport needs a fetch under a given tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh { reason: String },
    Stale,
}

/// Outcome of one sport within a tier run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum RefreshStatus {
    #[serde(rename = "success")]
    Success { games: usize },
    #[serde(rename = "no games")]
    NoGames,
    #[serde(rename = "skipped")]
    Skipped { reason: String },
    #[serde(rename = "error")]
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SportRefresh {
    pub sport: String,
    #[serde(flatten)]
    pub status: RefreshStatus,
}

/// Everything a trigger gets back from one tier run
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub message: String,
    pub tier: RefreshTier,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<SportRefresh>,
}

impl RefreshReport {
    pub fn count(&self, pred: impl Fn(&RefreshStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Pull a sport from upstream and write it into the cache.
///
/// Returns the number of games stored. An empty upstream list stores nothing
/// and leaves the sport's last-fetch time alone.
pub async fn fetch_and_store(
    store: &CacheStore,
    source: &dyn OddsSource,
    sport: &str,
    now: DateTime<Utc>,
) -> Result<usize> {
    let games = source.fetch_odds(sport).await?;
    if games.is_empty() {
        return Ok(0);
    }

    for game in &games {
        store.upsert_game(sport, game, now)?;
    }
    store.touch_last_fetch(sport, now)?;

    Ok(games.len())
}

pub struct RefreshScheduler {
    store: CacheStore,
    source: Arc<dyn OddsSource>,
    sports: Vec<String>,
    policies: TierPolicies,
    retention: Option<Duration>,
}

impl RefreshScheduler {
    pub fn new(
        store: CacheStore,
        source: Arc<dyn OddsSource>,
        sports: Vec<String>,
        policies: TierPolicies,
    ) -> Self {
        Self {
            store,
            source,
            sports,
            policies,
            retention: None,
        }
    }

    /// Purge games that started more than `retention` ago after each baseline run
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn sports(&self) -> &[String] {
        &self.sports
    }

    pub async fn run_tier(&self, tier: RefreshTier) -> RefreshReport {
        self.run_tier_at(tier, Utc::now()).await
    }

    /// Run one tier as if the clock read `now`
    pub async fn run_tier_at(&self, tier: RefreshTier, now: DateTime<Utc>) -> RefreshReport {
        let policy = self.policies.policy(tier);
        let mut results = Vec::with_capacity(self.sports.len());

        for sport in &self.sports {
            let status = self.refresh_sport(sport, policy, now).await;
            match &status {
                RefreshStatus::Success { games } => {
                    info!(%tier, sport = %sport, games, "Refreshed odds")
                }
                RefreshStatus::NoGames => info!(%tier, sport = %sport, "No games listed upstream"),
                RefreshStatus::Skipped { reason } => {
                    debug!(%tier, sport = %sport, reason = %reason, "Skipped refresh")
                }
                RefreshStatus::Error { error } => {
                    error!(%tier, sport = %sport, error = %error, "Refresh failed")
                }
            }
            results.push(SportRefresh {
                sport: sport.clone(),
                status,
            });
        }

        if tier == RefreshTier::Baseline {
            if let Some(retention) = self.retention {
                if let Err(e) = self.store.purge_started_before(now - retention) {
                    warn!(error = %e, "Failed to purge expired games");
                }
            }
        }

        RefreshReport {
            message: "Cron job completed".to_string(),
            tier,
            timestamp: Utc::now(),
            results,
        }
    }

    async fn refresh_sport(
        &self,
        sport: &str,
        policy: TierPolicy,
        now: DateTime<Utc>,
    ) -> RefreshStatus {
        match self.evaluate(sport, policy, now) {
            Ok(Staleness::Fresh { reason }) => return RefreshStatus::Skipped { reason },
            Ok(Staleness::Stale) => {}
            Err(e) => {
                return RefreshStatus::Error {
                    error: e.to_string(),
                }
            }
        }

        match fetch_and_store(&self.store, self.source.as_ref(), sport, now).await {
            Ok(0) => RefreshStatus::NoGames,
            Ok(games) => RefreshStatus::Success { games },
            Err(e) => RefreshStatus::Error {
                error: e.to_string(),
            },
        }
    }

    /// Decide whether `sport` needs a fetch under `policy`.
    /// A gated tier treats a sport with no cached games as having nothing imminent.
    pub fn evaluate(
        &self,
        sport: &str,
        policy: TierPolicy,
        now: DateTime<Utc>,
    ) -> Result<Staleness> {
        if let Some(window) = policy.imminence_window {
            if !self.store.has_game_starting_between(sport, now, now + window)? {
                return Ok(Staleness::Fresh {
                    reason: format!("no games starting within {}h", window.num_hours()),
                });
            }
        }

        if let Some(last_fetch) = self.store.read_last_fetch(sport)? {
            let age = now - last_fetch;
            if age <= policy.max_age {
                return Ok(Staleness::Fresh {
                    reason: format!("fetched {}m ago", age.num_minutes()),
                });
            }
        }

        Ok(Staleness::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Game;
    use crate::testing::ScriptedSource;

    const NBA: &str = "basketball_nba";
    const NHL: &str = "icehockey_nhl";

    fn game(id: &str, sport: &str, commence_time: DateTime<Utc>) -> Game {
        Game {
            id: id.to_string(),
            sport_key: sport.to_string(),
            sport_title: None,
            home_team: format!("{} Home", id),
            away_team: format!("{} Away", id),
            commence_time,
            bookmakers: vec![],
        }
    }

    fn scheduler(
        store: &CacheStore,
        source: Arc<ScriptedSource>,
        sports: &[&str],
    ) -> RefreshScheduler {
        RefreshScheduler::new(
            store.clone(),
            source,
            sports.iter().map(|s| s.to_string()).collect(),
            TierPolicies::default(),
        )
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("immediate".parse::<RefreshTier>().unwrap(), RefreshTier::Immediate);
        assert_eq!("same-day".parse::<RefreshTier>().unwrap(), RefreshTier::SameDay);
        assert_eq!("LOW".parse::<RefreshTier>().unwrap(), RefreshTier::Baseline);
        assert!(matches!("weekly".parse::<RefreshTier>(), Err(OddsError::UnknownTier(_))));
    }

    #[tokio::test]
    async fn test_immediate_tier_skips_distant_games() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .upsert_game(
                NBA,
                &game("g1", NBA, now + Duration::hours(5)),
                now - Duration::hours(4),
            )
            .unwrap();
        store.touch_last_fetch(NBA, now - Duration::hours(4)).unwrap();

        let source = Arc::new(ScriptedSource::new());
        source.set(NBA, vec![game("g1", NBA, now + Duration::hours(5))]);
        let report = scheduler(&store, source.clone(), &[NBA])
            .run_tier_at(RefreshTier::Immediate, now)
            .await;

        assert!(matches!(report.results[0].status, RefreshStatus::Skipped { .. }));
        assert_eq!(source.calls(NBA), 0);
    }

    #[tokio::test]
    async fn test_immediate_tier_fetches_imminent_games() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .upsert_game(
                NBA,
                &game("g1", NBA, now + Duration::hours(2)),
                now - Duration::hours(4),
            )
            .unwrap();
        store.touch_last_fetch(NBA, now - Duration::hours(4)).unwrap();

        let source = Arc::new(ScriptedSource::new());
        source.set(
            NBA,
            vec![
                game("g1", NBA, now + Duration::hours(2)),
                game("g2", NBA, now + Duration::hours(8)),
            ],
        );
        let report = scheduler(&store, source.clone(), &[NBA])
            .run_tier_at(RefreshTier::Immediate, now)
            .await;

        assert_eq!(report.results[0].status, RefreshStatus::Success { games: 2 });
        assert_eq!(source.calls(NBA), 1);
        assert_eq!(store.count_games(NBA).unwrap(), 2);
        assert_eq!(
            store.read_last_fetch(NBA).unwrap().map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_gated_tier_skips_sport_without_cache() {
        let store = CacheStore::open_in_memory().unwrap();
        let source = Arc::new(ScriptedSource::new());
        source.set(NBA, vec![game("g1", NBA, Utc::now() + Duration::hours(1))]);

        let sched = scheduler(&store, source.clone(), &[NBA]);
        let report = sched.run_tier(RefreshTier::SameDay).await;
        assert!(matches!(report.results[0].status, RefreshStatus::Skipped { .. }));
        assert_eq!(source.calls(NBA), 0);

        // The baseline tier seeds the cache
        let report = sched.run_tier(RefreshTier::Baseline).await;
        assert_eq!(report.results[0].status, RefreshStatus::Success { games: 1 });
        assert_eq!(source.calls(NBA), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_not_refetched() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .upsert_game(
                NBA,
                &game("g1", NBA, now + Duration::hours(1)),
                now - Duration::minutes(10),
            )
            .unwrap();
        store.touch_last_fetch(NBA, now - Duration::minutes(10)).unwrap();

        let source = Arc::new(ScriptedSource::new());
        let sched = scheduler(&store, source.clone(), &[NBA]);
        for tier in RefreshTier::ALL {
            let report = sched.run_tier_at(tier, now).await;
            assert!(matches!(report.results[0].status, RefreshStatus::Skipped { .. }), "{}", tier);
        }
        assert_eq!(source.calls(NBA), 0);
    }

    #[tokio::test]
    async fn test_one_failing_sport_does_not_block_others() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        let source = Arc::new(ScriptedSource::new());
        source.fail(NBA, "connection reset");
        source.set(NHL, vec![game("h1", NHL, now + Duration::hours(3))]);

        let report = scheduler(&store, source.clone(), &[NBA, "basketball_wnba", NHL])
            .run_tier_at(RefreshTier::Baseline, now)
            .await;

        assert_eq!(report.results.len(), 3);
        assert!(matches!(report.results[0].status, RefreshStatus::Error { .. }));
        assert_eq!(report.results[1].status, RefreshStatus::NoGames);
        assert_eq!(report.results[2].status, RefreshStatus::Success { games: 1 });
        assert_eq!(report.tier, RefreshTier::Baseline);

        // Neither the failure nor the empty sport counts as fetched
        assert_eq!(store.read_last_fetch(NBA).unwrap(), None);
        assert_eq!(store.read_last_fetch("basketball_wnba").unwrap(), None);
        assert!(store.read_last_fetch(NHL).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_recorded_per_sport() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        let source = Arc::new(ScriptedSource::new());
        source.fail_with(
            NBA,
            OddsError::MalformedUpstreamPayload("game 0: missing field `home_team`".to_string()),
        );
        source.set(NHL, vec![game("h1", NHL, now + Duration::hours(3))]);

        let report = scheduler(&store, source.clone(), &[NBA, NHL])
            .run_tier_at(RefreshTier::Baseline, now)
            .await;

        match &report.results[0].status {
            RefreshStatus::Error { error } => assert!(error.contains("malformed upstream payload")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(report.results[1].status, RefreshStatus::Success { games: 1 });
        assert_eq!(store.read_last_fetch(NBA).unwrap(), None);
        assert_eq!(store.count_games(NBA).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_recorded_per_sport() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        // A last-fetch value that cannot be read back as a timestamp
        store
            .execute_raw(
                "INSERT INTO last_fetch (sport_key, fetched_at)
                 VALUES ('basketball_nba', 'soon')",
            )
            .unwrap();

        let source = Arc::new(ScriptedSource::new());
        source.set(NBA, vec![game("g1", NBA, now + Duration::hours(3))]);
        source.set(NHL, vec![game("h1", NHL, now + Duration::hours(3))]);

        let report = scheduler(&store, source.clone(), &[NBA, NHL])
            .run_tier_at(RefreshTier::Baseline, now)
            .await;

        match &report.results[0].status {
            RefreshStatus::Error { error } => assert!(error.contains("cache store failure")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(source.calls(NBA), 0);
        assert_eq!(report.results[1].status, RefreshStatus::Success { games: 1 });
    }

    #[tokio::test]
    async fn test_baseline_purges_expired_games() {
        let store = CacheStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .upsert_game(
                NBA,
                &game("old", NBA, now - Duration::days(5)),
                now - Duration::days(5),
            )
            .unwrap();

        let source = Arc::new(ScriptedSource::new());
        source.set(NBA, vec![game("new", NBA, now + Duration::hours(3))]);
        let sched = scheduler(&store, source, &[NBA]).with_retention(Duration::hours(48));
        sched.run_tier_at(RefreshTier::Baseline, now).await;

        let ids: Vec<String> = store
            .read_cached_games(NBA)
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[test]
    fn test_report_serialization() {
        let report = RefreshReport {
            message: "Cron job completed".to_string(),
            tier: RefreshTier::SameDay,
            timestamp: Utc::now(),
            results: vec![
                SportRefresh {
                    sport: NBA.to_string(),
                    status: RefreshStatus::Success { games: 4 },
                },
                SportRefresh {
                    sport: NHL.to_string(),
                    status: RefreshStatus::NoGames,
                },
            ],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tier"], "same_day");
        assert_eq!(json["results"][0]["status"], "success");
        assert_eq!(json["results"][0]["games"], 4);
        assert_eq!(json["results"][1]["status"], "no games");
        assert_eq!(report.count(|s| matches!(s, RefreshStatus::Success { .. })), 1);
    }
}
