use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use osrs_tracker_core::{Database, HiscoreClient, ModeCache};

mod routes;

pub struct AppState {
    pub db: Mutex<Database>,
    pub mode_cache: Mutex<ModeCache>,
    pub client: HiscoreClient,
    pub snapshot_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db = Database::open("data/analytics.db").expect("Failed to open database");
    let mode_cache = ModeCache::load("config/mode_cache.json");
    let client = HiscoreClient::new().expect("Failed to create hiscore client");

    let state = Arc::new(AppState {
        db: Mutex::new(db),
        mode_cache: Mutex::new(mode_cache),
        client,
        snapshot_dir: PathBuf::from("data/snapshots"),
    });

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/snapshots/run", post(routes::run_snapshot))
        .route("/clans/:id/stats", get(routes::clans::stats))
        .route("/clans/:id/leaderboard", get(routes::clans::leaderboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("Failed to bind 127.0.0.1:3000");

    tracing::info!("server running at http://localhost:3000");

    axum::serve(listener, app).await.expect("server error");
}
