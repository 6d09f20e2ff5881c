use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OddsError, Result};

/// Market key for point-spread lines
pub const SPREADS_MARKET: &str = "spreads";

/// Sportsbook whose lines are compared against the market by default
pub const DEFAULT_SPORTSBOOK: &str = "fanduel";

/// A game as returned by The Odds API and stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    #[serde(default)]
    pub sport_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport_title: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

/// One sportsbook's markets for a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub markets: Vec<Market>,
}

/// A market (h2h, spreads, totals) offered by a bookmaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

/// A priced outcome. `point` is only present for line-based markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub price: f64, // Decimal odds (e.g., 1.91)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

impl Game {
    /// Find a bookmaker by its key (e.g., "fanduel")
    pub fn bookmaker(&self, key: &str) -> Option<&Bookmaker> {
        self.bookmakers.iter().find(|b| b.key == key)
    }

    /// The other side of the game for `team`
    pub fn opponent_of(&self, team: &str) -> &str {
        if team == self.home_team {
            &self.away_team
        } else {
            &self.home_team
        }
    }

    /// Check the payload is usable before it goes into the cache
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(OddsError::MalformedUpstreamPayload(
                "game is missing an id".to_string(),
            ));
        }
        if self.home_team.trim().is_empty() || self.away_team.trim().is_empty() {
            return Err(OddsError::MalformedUpstreamPayload(format!(
                "game {} is missing a team name",
                self.id
            )));
        }

        for bookmaker in &self.bookmakers {
            for market in &bookmaker.markets {
                for outcome in &market.outcomes {
                    if !outcome.price.is_finite() || outcome.price <= 1.0 {
                        return Err(OddsError::MalformedUpstreamPayload(format!(
                            "game {} has invalid price {} for {} on {} {}",
                            self.id, outcome.price, outcome.name, bookmaker.key, market.key
                        )));
                    }
                    if outcome.point.is_some_and(|p| !p.is_finite()) {
                        return Err(OddsError::MalformedUpstreamPayload(format!(
                            "game {} has a non-finite point for {}",
                            self.id, outcome.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

impl Bookmaker {
    pub fn market(&self, key: &str) -> Option<&Market> {
        self.markets.iter().find(|m| m.key == key)
    }

    /// The spread outcome for `team`, if this book prices one with a line
    pub fn spread_for(&self, team: &str) -> Option<&Outcome> {
        self.market(SPREADS_MARKET)?
            .outcomes
            .iter()
            .find(|o| o.name == team)
            .filter(|o| o.point.is_some())
    }
}

/// A sport the odds provider knows about
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SportInfo {
    pub key: &'static str,
    pub title: &'static str,
}

impl SportInfo {
    const fn new(key: &'static str, title: &'static str) -> Self {
        Self { key, title }
    }
}

pub const SPORTS: &[SportInfo] = &[
    SportInfo::new("basketball_nba", "NBA"),
    SportInfo::new("basketball_ncaab", "NCAA Men's Basketball"),
    SportInfo::new("basketball_wncaab", "NCAA Women's Basketball"),
    SportInfo::new("basketball_wnba", "WNBA"),
    SportInfo::new("americanfootball_nfl", "NFL"),
    SportInfo::new("americanfootball_ncaaf", "NCAA Football"),
    SportInfo::new("baseball_mlb", "MLB"),
    SportInfo::new("icehockey_nhl", "NHL"),
];

/// Sports refreshed when none are configured
pub const DEFAULT_ACTIVE_SPORTS: &[&str] = &[
    "basketball_nba",
    "basketball_ncaab",
    "basketball_wncaab",
    "icehockey_nhl",
];

pub fn sport_title(key: &str) -> Option<&'static str> {
    SPORTS.iter().find(|s| s.key == key).map(|s| s.title)
}

/// A sportsbook a user can compare against the market
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SportsbookInfo {
    pub key: &'static str,
    pub title: &'static str,
}

impl SportsbookInfo {
    const fn new(key: &'static str, title: &'static str) -> Self {
        Self { key, title }
    }
}

pub const SPORTSBOOKS: &[SportsbookInfo] = &[
    SportsbookInfo::new("fanduel", "FanDuel"),
    SportsbookInfo::new("draftkings", "DraftKings"),
    SportsbookInfo::new("betmgm", "BetMGM"),
    SportsbookInfo::new("williamhill_us", "Caesars"),
    SportsbookInfo::new("betrivers", "BetRivers"),
    SportsbookInfo::new("fanatics", "Fanatics"),
    SportsbookInfo::new("mybookieag", "MyBookie.ag"),
    SportsbookInfo::new("lowvig", "LowVig.ag"),
    SportsbookInfo::new("betonlineag", "BetOnline.ag"),
    SportsbookInfo::new("betus", "BetUS"),
    SportsbookInfo::new("bovada", "Bovada"),
];

pub fn sportsbook_title(key: &str) -> Option<&'static str> {
    SPORTSBOOKS.iter().find(|b| b.key == key).map(|b| b.title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_game() -> Game {
        serde_json::from_str(
            r#"{
                "id": "abc123",
                "sport_key": "basketball_nba",
                "sport_title": "NBA",
                "commence_time": "2026-10-20T00:00:00Z",
                "home_team": "Boston Celtics",
                "away_team": "New York Knicks",
                "bookmakers": [{
                    "key": "fanduel",
                    "title": "FanDuel",
                    "last_update": "2026-10-19T12:00:00Z",
                    "markets": [
                        {"key": "h2h", "outcomes": [
                            {"name": "Boston Celtics", "price": 1.5},
                            {"name": "New York Knicks", "price": 2.6}
                        ]},
                        {"key": "spreads", "outcomes": [
                            {"name": "Boston Celtics", "price": 1.91, "point": -5.5},
                            {"name": "New York Knicks", "price": 1.91, "point": 5.5}
                        ]}
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_upstream_game() {
        let game = sample_game();
        assert_eq!(game.bookmakers.len(), 1);
        let book = game.bookmaker("fanduel").unwrap();
        assert!(book.market("h2h").unwrap().outcomes[0].point.is_none());
        let spread = book.spread_for("Boston Celtics").unwrap();
        assert_eq!(spread.point, Some(-5.5));
        assert!(game.validate().is_ok());
    }

    #[test]
    fn test_missing_point_is_not_a_spread() {
        let mut game = sample_game();
        game.bookmakers[0].markets[1].outcomes[0].point = None;
        assert!(game.bookmakers[0].spread_for("Boston Celtics").is_none());
    }

    #[test]
    fn test_validate_rejects_bad_price() {
        let mut game = sample_game();
        game.bookmakers[0].markets[0].outcomes[0].price = 1.0;
        assert!(matches!(
            game.validate(),
            Err(OddsError::MalformedUpstreamPayload(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_team() {
        let mut game = sample_game();
        game.away_team = " ".to_string();
        assert!(game.validate().is_err());
    }

    #[test]
    fn test_opponent_and_catalogs() {
        let game = sample_game();
        assert_eq!(game.opponent_of("Boston Celtics"), "New York Knicks");
        assert_eq!(game.opponent_of("New York Knicks"), "Boston Celtics");
        assert_eq!(sport_title("icehockey_nhl"), Some("NHL"));
        assert_eq!(sportsbook_title("williamhill_us"), Some("Caesars"));
        assert_eq!(sportsbook_title("unknown"), None);
    }
}
