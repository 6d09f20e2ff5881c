use crate::models::{Game, SportsbookInfo, SPORTSBOOKS};
use crate::utils::odds::{decimal_to_american, juice_adjusted_spread};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// How many value plays the ranking keeps
pub const TOP_VALUE_PLAYS: usize = 10;

/// Differentials beyond +/- this many points are called out as good or poor value
pub const VALUE_BAND_THRESHOLD: f64 = 0.15;

/// Display banding for a value differential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueBand {
    Favorable,
    Neutral,
    Unfavorable,
}

impl ValueBand {
    pub fn from_diff(value_diff: f64) -> Self {
        if value_diff > VALUE_BAND_THRESHOLD {
            ValueBand::Favorable
        } else if value_diff < -VALUE_BAND_THRESHOLD {
            ValueBand::Unfavorable
        } else {
            ValueBand::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValueBand::Favorable => "GOOD VALUE",
            ValueBand::Neutral => "",
            ValueBand::Unfavorable => "Poor value",
        }
    }
}

/// The selected book's spread for one team
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSpread {
    pub spread: f64,
    pub price: f64,
    pub american_odds: i32,
    pub adjusted_spread: f64,
}

/// A team whose line at the selected book differs from the market average
#[derive(Debug, Clone, Serialize)]
pub struct ValuePlay {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    pub team: String,
    pub opponent: String,
    pub bookmaker: String,
    pub spread: f64,
    pub price: f64,
    pub american_odds: i32,
    pub adjusted_spread: f64,
    pub market_average: f64,
    pub value_diff: f64,
    pub band: ValueBand,
}

impl ValuePlay {
    /// Format the value play as a readable string
    pub fn format(&self) -> String {
        let label = self.band.label();
        format!(
            "{} vs {} | Line: {:+.1} ({:+}) on {} | Market Avg: {:+.1} | Value: {:+.2} pts{}{}",
            self.team,
            self.opponent,
            self.spread,
            self.american_odds,
            self.bookmaker,
            self.market_average,
            self.value_diff,
            if label.is_empty() { "" } else { " | " },
            label
        )
    }
}

/// Both teams' numbers for one game, as seen from the selected book
#[derive(Debug, Clone, Serialize)]
pub struct GameValue {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    pub home: TeamValue,
    pub away: TeamValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamValue {
    pub team: String,
    pub book: Option<BookSpread>,
    pub market_average: Option<f64>,
    pub value_diff: Option<f64>,
    pub band: Option<ValueBand>,
}

/// Spread data for `team` at `book_key`, or `None` if that book has no usable line
pub fn book_spread_data(game: &Game, team: &str, book_key: &str) -> Option<BookSpread> {
    let outcome = game.bookmaker(book_key)?.spread_for(team)?;
    let spread = outcome.point?;

    Some(BookSpread {
        spread,
        price: outcome.price,
        american_odds: decimal_to_american(outcome.price)?,
        adjusted_spread: juice_adjusted_spread(spread, outcome.price)?,
    })
}

/// Average juice-adjusted spread for `team` across every book except `excluded_book`
pub fn market_consensus(game: &Game, team: &str, excluded_book: &str) -> Option<f64> {
    let adjusted_spreads: Vec<f64> = game
        .bookmakers
        .iter()
        .filter(|book| book.key != excluded_book)
        .filter_map(|book| {
            let outcome = book.spread_for(team)?;
            juice_adjusted_spread(outcome.point?, outcome.price)
        })
        .collect();

    if adjusted_spreads.is_empty() {
        return None;
    }

    Some(adjusted_spreads.iter().sum::<f64>() / adjusted_spreads.len() as f64)
}

fn team_value(game: &Game, team: &str, book_key: &str) -> TeamValue {
    let book = book_spread_data(game, team, book_key);
    let market_average = market_consensus(game, team, book_key);
    let value_diff = match (&book, market_average) {
        (Some(book), Some(avg)) => Some(book.adjusted_spread - avg),
        _ => None,
    };

    TeamValue {
        team: team.to_string(),
        book,
        market_average,
        value_diff,
        band: value_diff.map(ValueBand::from_diff),
    }
}

fn value_play(game: &Game, team_value: TeamValue, book_key: &str) -> Option<ValuePlay> {
    let book = team_value.book?;
    let market_average = team_value.market_average?;
    let value_diff = team_value.value_diff?;

    Some(ValuePlay {
        game_id: game.id.clone(),
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        commence_time: game.commence_time,
        opponent: game.opponent_of(&team_value.team).to_string(),
        team: team_value.team,
        bookmaker: book_key.to_string(),
        spread: book.spread,
        price: book.price,
        american_odds: book.american_odds,
        adjusted_spread: book.adjusted_spread,
        market_average,
        value_diff,
        band: ValueBand::from_diff(value_diff),
    })
}

/// Per-game breakdown of the selected book against the market, in game order
pub fn analyze_games(games: &[Game], book_key: &str) -> Vec<GameValue> {
    games
        .iter()
        .map(|game| GameValue {
            game_id: game.id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            commence_time: game.commence_time,
            home: team_value(game, &game.home_team, book_key),
            away: team_value(game, &game.away_team, book_key),
        })
        .collect()
}

/// Rank every team's value differential at `book_key` and keep the best `top_n`.
/// Equal differentials keep scan order: game order, home before away.
pub fn find_top_value_plays(games: &[Game], book_key: &str, top_n: usize) -> Vec<ValuePlay> {
    let mut plays: Vec<ValuePlay> = games
        .iter()
        .flat_map(|game| {
            [&game.home_team, &game.away_team]
                .into_iter()
                .filter_map(move |team| {
                    value_play(game, team_value(game, team, book_key), book_key)
                })
        })
        .collect();

    rank_value_plays(&mut plays, top_n);
    plays
}

/// Stable sort by differential (descending), then truncate
pub fn rank_value_plays(plays: &mut Vec<ValuePlay>, top_n: usize) {
    plays.sort_by(|a, b| {
        b.value_diff
            .partial_cmp(&a.value_diff)
            .unwrap_or(Ordering::Equal)
    });
    plays.truncate(top_n);
}

/// Whether `book_key` prices any of `games`
pub fn book_has_coverage(games: &[Game], book_key: &str) -> bool {
    games.iter().any(|game| game.bookmaker(book_key).is_some())
}

/// Known sportsbooks that price at least one of `games`, in catalog order
pub fn available_books(games: &[Game]) -> Vec<SportsbookInfo> {
    SPORTSBOOKS
        .iter()
        .filter(|book| book_has_coverage(games, book.key))
        .copied()
        .collect()
}
