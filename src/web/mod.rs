use crate::error::OddsError;
use crate::models::{Game, DEFAULT_SPORTSBOOK, SPORTS, SPORTSBOOKS};
use crate::scheduler::{RefreshReport, RefreshScheduler, RefreshTier};
use crate::utils::value_analysis::TOP_VALUE_PLAYS;
use crate::{OddsService, ValueReport};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

const DEFAULT_SPORT: &str = "basketball_nba";

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: OddsService,
    pub scheduler: Arc<RefreshScheduler>,
}

#[derive(Debug, Deserialize)]
pub struct OddsQuery {
    sport: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValueQuery {
    sport: Option<String>,
    book: Option<String>,
    top: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CronQuery {
    tier: Option<String>,
}

/// Maps pipeline failures onto HTTP responses
pub struct ApiError(OddsError);

impl From<OddsError> for ApiError {
    fn from(err: OddsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OddsError::UpstreamUnavailable(_) | OddsError::MalformedUpstreamPayload(_) => {
                StatusCode::BAD_GATEWAY
            }
            OddsError::UnknownTier(_) => StatusCode::BAD_REQUEST,
            OddsError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn odds(
    State(state): State<AppState>,
    Query(query): Query<OddsQuery>,
) -> Result<Json<Vec<Game>>, ApiError> {
    let sport = query.sport.as_deref().unwrap_or(DEFAULT_SPORT);
    let games = state.service.sport_odds(sport).await?;
    Ok(Json(games))
}

async fn value(
    State(state): State<AppState>,
    Query(query): Query<ValueQuery>,
) -> Result<Json<ValueReport>, ApiError> {
    let sport = query.sport.as_deref().unwrap_or(DEFAULT_SPORT);
    let book = query.book.as_deref().unwrap_or(DEFAULT_SPORTSBOOK);
    let top = query.top.unwrap_or(TOP_VALUE_PLAYS);

    let report = state.service.value_report(sport, book, top).await?;
    Ok(Json(report))
}

async fn cron(
    State(state): State<AppState>,
    Query(query): Query<CronQuery>,
) -> Result<Json<RefreshReport>, ApiError> {
    let tier = match query.tier.as_deref() {
        Some(raw) => raw.parse::<RefreshTier>()?,
        None => RefreshTier::Baseline,
    };

    Ok(Json(state.scheduler.run_tier(tier).await))
}

async fn sports() -> impl IntoResponse {
    Json(SPORTS)
}

async fn sportsbooks() -> impl IntoResponse {
    Json(SPORTSBOOKS)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/odds", get(odds))
        .route("/api/value", get(value))
        .route("/api/cron", get(cron))
        .route("/api/sports", get(sports))
        .route("/api/sportsbooks", get(sportsbooks))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
