use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use osrs_tracker_core::aggregate::{
    self, ClanStats, LeaderboardMetric, LeaderboardPage, Timeframe,
};

use crate::AppState;

type RouteError = (StatusCode, String);

#[derive(serde::Deserialize)]
pub struct StatsParams {
    #[serde(default)]
    pub timeframe: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

fn parse_timeframe(raw: Option<&str>) -> Result<Timeframe, RouteError> {
    match raw {
        None => Ok(Timeframe::Week),
        Some(raw) => Timeframe::parse_str(raw).ok_or((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown timeframe: {raw}"),
        )),
    }
}

async fn require_clan(state: &AppState, clan_id: i64) -> Result<(), RouteError> {
    let db = state.db.lock().await;
    match db.get_clan(clan_id) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("no clan with id {clan_id}"))),
        Err(err) => Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(clan_id): Path<i64>,
    Query(params): Query<StatsParams>,
) -> Result<Json<ClanStats>, RouteError> {
    let timeframe = parse_timeframe(params.timeframe.as_deref())?;
    require_clan(&state, clan_id).await?;

    let db = state.db.lock().await;
    aggregate::clan_stats(&db, clan_id, timeframe, chrono::Utc::now())
        .map(Json)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Path(clan_id): Path<i64>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardPage>, RouteError> {
    let timeframe = parse_timeframe(params.timeframe.as_deref())?;
    let metric = match params.metric.as_deref() {
        None => LeaderboardMetric::Xp,
        Some(raw) => LeaderboardMetric::parse_str(raw).ok_or((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown metric: {raw}"),
        ))?,
    };
    require_clan(&state, clan_id).await?;

    let db = state.db.lock().await;
    aggregate::clan_leaderboard(
        &db,
        clan_id,
        timeframe,
        metric,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(10),
        chrono::Utc::now(),
    )
    .map(Json)
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}
