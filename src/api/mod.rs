pub mod odds_api;

pub use odds_api::{ApiUsage, OddsApiClient, OddsSource};
