mod authflow;
mod gateway;
mod http;
mod models;
mod notify;
mod orchestrator;

use authflow::DetachedBrowser;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use gateway::BackendClient;
use notify::{Notice, NoticeBoard};
use orchestrator::{Orchestrator, PublishOutcome, TokenActionOutcome};
use serde::Deserialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "bookstall.panel", "panel crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let notices = Arc::new(NoticeBoard::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(BackendClient::new()),
        notices.clone(),
        Arc::new(DetachedBrowser),
    ));

    // Initial activation probes the token store, the way the panel did
    // on mount.
    orchestrator.check_token_status().await;

    let state = AppState {
        orchestrator,
        notices,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(health))
        .nest(
            "/panel",
            Router::new()
                .route("/state", get(panel_state))
                .route("/publish", post(publish))
                .route("/token/check", post(token_check))
                .route("/token/action", post(token_action))
                .route("/notifications", get(notifications)),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "bookstall.panel", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
    notices: Arc<NoticeBoard>,
}

/// Liveness check.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "bookstall",
    }))
}

async fn panel_state(State(state): State<AppState>) -> Json<models::WorkflowSnapshot> {
    Json(state.orchestrator.snapshot().await)
}

#[derive(Debug, Deserialize)]
struct PublishRequest {
    #[serde(default)]
    pdf_url: String,
}

/// Run the PDF-to-listing publish sequence.
///
/// - Method: `POST`
/// - Path: `/panel/publish`
/// - Body: `{ "pdf_url": "<book page url>" }`
/// - Response: `PublishOutcome` (completed / rejected / failed)
async fn publish(
    State(state): State<AppState>,
    Json(payload): Json<PublishRequest>,
) -> Json<PublishOutcome> {
    Json(state.orchestrator.run_publish_sequence(&payload.pdf_url).await)
}

async fn token_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let has_token = state.orchestrator.check_token_status().await;
    Json(json!({ "has_token": has_token }))
}

async fn token_action(State(state): State<AppState>) -> Json<TokenActionOutcome> {
    Json(state.orchestrator.handle_token_action().await)
}

async fn notifications(State(state): State<AppState>) -> Json<Vec<Notice>> {
    Json(state.notices.drain())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
