use crate::utils::value_analysis::ValuePlay;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ValuePlayRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "Home Team")]
    home_team: &'a str,
    #[serde(rename = "Away Team")]
    away_team: &'a str,
    #[serde(rename = "Bet Team")]
    team: &'a str,
    #[serde(rename = "Bookmaker")]
    bookmaker: &'a str,
    #[serde(rename = "Spread")]
    spread: String,
    #[serde(rename = "Odds")]
    american_odds: i32,
    #[serde(rename = "Adjusted Spread")]
    adjusted_spread: String,
    #[serde(rename = "Market Avg")]
    market_average: String,
    #[serde(rename = "Value (pts)")]
    value_diff: String,
}

/// Save ranked value plays to CSV
pub fn save_value_plays_to_csv<P: AsRef<Path>>(plays: &[ValuePlay], filename: P) -> Result<()> {
    let path = filename.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create CSV directory")?;
        }
    }

    let mut writer = csv::Writer::from_path(path).context("Failed to create CSV file")?;

    for (i, play) in plays.iter().enumerate() {
        writer
            .serialize(ValuePlayRow {
                rank: i + 1,
                home_team: &play.home_team,
                away_team: &play.away_team,
                team: &play.team,
                bookmaker: &play.bookmaker,
                spread: format!("{:.1}", play.spread),
                american_odds: play.american_odds,
                adjusted_spread: format!("{:.2}", play.adjusted_spread),
                market_average: format!("{:.2}", play.market_average),
                value_diff: format!("{:.2}", play.value_diff),
            })
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}
