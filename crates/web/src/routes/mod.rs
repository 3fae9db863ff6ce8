use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Form, Json,
};
use std::sync::Arc;

use osrs_tracker_core::{AccountSpec, RequestedMode, SnapshotAgent};

use crate::AppState;

pub mod clans;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub accounts: u32,
    pub snapshots: u32,
    pub generated_at: String,
}

#[derive(serde::Deserialize)]
pub struct SnapshotForm {
    pub player: String,
    #[serde(default)]
    pub mode: Option<String>,
}

pub async fn index(State(state): State<Arc<AppState>>) -> IndexTemplate {
    let db = state.db.lock().await;
    let accounts = db.count_accounts().unwrap_or(0);
    let snapshots = db.count_snapshots().unwrap_or(0);

    IndexTemplate {
        title: "OSRS Tracker".to_string(),
        accounts,
        snapshots,
        generated_at: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
    }
}

pub async fn run_snapshot(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SnapshotForm>,
) -> impl IntoResponse {
    let player = form.player.trim().to_string();
    if player.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "empty player name").into_response();
    }

    let mode_raw = form.mode.as_deref().unwrap_or("auto");
    let Some(mode) = RequestedMode::parse_str(mode_raw) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown mode: {mode_raw}"),
        )
            .into_response();
    };

    tracing::info!(%player, %mode, "snapshot requested");

    let agent = SnapshotAgent::new(state.client.clone(), state.snapshot_dir.clone());
    let mut db = state.db.lock().await;
    let mut cache = state.mode_cache.lock().await;
    let outcomes = agent
        .run(&mut db, &mut cache, &[AccountSpec::new(player, mode)])
        .await;

    Json(outcomes).into_response()
}

pub async fn health() -> &'static str {
    "OK"
}
