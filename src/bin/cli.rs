use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use odds_value::config::Config;
use odds_value::data::save_value_plays_to_csv;
use odds_value::models::{sport_title, DEFAULT_SPORTSBOOK};
use odds_value::value_analysis::TOP_VALUE_PLAYS;
use odds_value::{
    CacheStore, OddsApiClient, OddsService, RefreshScheduler, RefreshStatus, RefreshTier,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cli", about = "Sports odds cache and spread value finder")]
struct Cli {
    /// Override DATABASE_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one refresh tier over every active sport
    Refresh {
        /// immediate, same_day or baseline
        #[arg(long, default_value = "baseline")]
        tier: String,
    },
    /// Print upcoming games for a sport
    Odds {
        #[arg(long, default_value = "basketball_nba")]
        sport: String,
    },
    /// Rank a sportsbook's spreads against the market
    Value {
        #[arg(long, default_value = "basketball_nba")]
        sport: String,
        #[arg(long, default_value = DEFAULT_SPORTSBOOK)]
        book: String,
        #[arg(long, default_value_t = TOP_VALUE_PLAYS)]
        top: usize,
        /// Also write the ranking to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Delete cached games that started longer ago than RETENTION_HOURS
    Prune,
    /// Show remaining Odds API requests
    Usage,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let store = CacheStore::open(&config.database_path)
        .with_context(|| format!("Failed to open cache at {}", config.database_path.display()))?;
    let client = Arc::new(
        OddsApiClient::new(config.odds_api_key.clone())
            .with_base_url(config.odds_api_base_url.clone())
            .with_regions(config.regions.clone())
            .with_markets(config.markets.clone())
            .with_timeout(config.http_timeout)
            .context("Failed to build HTTP client")?,
    );

    match cli.command {
        Command::Refresh { tier } => {
            let tier: RefreshTier = tier.parse()?;
            let scheduler = RefreshScheduler::new(
                store,
                client,
                config.active_sports.clone(),
                config.tiers,
            )
            .with_retention(config.retention);

            let report = scheduler.run_tier(tier).await;
            println!("Refresh tier: {}\n", report.tier);
            for result in &report.results {
                match &result.status {
                    RefreshStatus::Success { games } => {
                        println!("  {} - {} games", result.sport, games)
                    }
                    RefreshStatus::NoGames => println!("  {} - no games", result.sport),
                    RefreshStatus::Skipped { reason } => {
                        println!("  {} - skipped ({})", result.sport, reason)
                    }
                    RefreshStatus::Error { error } => {
                        println!("  {} - ERROR: {}", result.sport, error)
                    }
                }
            }
            println!("\nCompleted at {}", report.timestamp.to_rfc3339());
        }
        Command::Odds { sport } => {
            let service = OddsService::new(store, client, config.cache_duration);
            let games = service
                .sport_odds(&sport)
                .await
                .with_context(|| format!("Failed to load odds for {}", sport))?;

            println!(
                "{} ({} upcoming games)\n",
                sport_title(&sport).unwrap_or(sport.as_str()),
                games.len()
            );
            for game in &games {
                println!(
                    "{} @ {} | {} | {} books",
                    game.away_team,
                    game.home_team,
                    game.commence_time.format("%Y-%m-%d %H:%M UTC"),
                    game.bookmakers.len()
                );
            }
        }
        Command::Value { sport, book, top, csv } => {
            let service = OddsService::new(store, client, config.cache_duration);
            let report = service
                .value_report(&sport, &book, top)
                .await
                .with_context(|| format!("Failed to build value report for {}", sport))?;

            let book_title = report.bookmaker_title.clone().unwrap_or_else(|| book.clone());
            println!(
                "{} Spread Comparison - {}\n",
                report.sport_title.as_deref().unwrap_or(sport.as_str()),
                book_title
            );

            if report.game_count == 0 {
                println!("No games currently available.");
            } else if !report.book_has_coverage {
                println!("{} has no odds for these games. Try one of:", book_title);
                for available in &report.available_books {
                    println!("  {} ({})", available.title, available.key);
                }
            } else if report.top_value_plays.is_empty() {
                println!("No comparable spreads found.");
            } else {
                println!("Top {} Value Opportunities:\n", report.top_value_plays.len());
                for (i, play) in report.top_value_plays.iter().enumerate() {
                    println!("{}. {}", i + 1, play.format());
                }
            }

            if let Some(path) = csv {
                save_value_plays_to_csv(&report.top_value_plays, &path)?;
                println!("\nSaved value plays to {}", path.display());
            }
        }
        Command::Prune => {
            let cutoff = Utc::now() - config.retention;
            let removed = store.purge_started_before(cutoff)?;
            println!(
                "Removed {} cached games that started before {}",
                removed,
                cutoff.to_rfc3339()
            );
        }
        Command::Usage => {
            let usage = client.check_usage().await?;
            match usage.remaining {
                Some(remaining) => println!("API requests remaining: {}", remaining),
                None => println!("API requests remaining: unknown"),
            }
            if let Some(used) = usage.used {
                println!("API requests used: {}", used);
            }
        }
    }

    Ok(())
}
