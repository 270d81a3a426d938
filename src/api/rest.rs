// =============================================================================
// REST API Endpoints — Axum 0.8
// =============================================================================
//
// All endpoints live under `/api/v1/`. Public endpoints (health) require no
// authentication. All other endpoints require a valid Bearer token checked via
// the `Admin` extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::Admin;
use crate::app_state::AppState;
use crate::runtime_config::{ConfigUpdate, CONFIG_PATH};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/signals", get(signals))
        .route("/api/v1/trades", get(trades))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config", post(update_config))
        .route("/api/v1/control/start", post(control_start))
        .route("/api/v1/control/stop", post(control_stop))
        .route("/api/v1/control/reset-halt", post(control_reset_halt))
        // ── WebSocket (handled in the ws module, mounted here) ──────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    mode: String,
    state_version: u64,
    uptime_seconds: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        mode: state.current_mode().to_string(),
        state_version: state.current_state_version(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Full state snapshot (authenticated)
// =============================================================================

async fn full_state(_auth: Admin, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Signals (authenticated)
// =============================================================================

async fn signals(_auth: Admin, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let signal_map = state.signals.read().clone();
    Json(signal_map)
}

// =============================================================================
// Trades (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct TradesQuery {
    #[serde(default = "default_trade_limit")]
    limit: usize,
}

fn default_trade_limit() -> usize {
    50
}

async fn trades(
    _auth: Admin,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TradesQuery>,
) -> impl IntoResponse {
    let records = state.trade_history.read().recent(query.limit);
    Json(records)
}

// =============================================================================
// Config (authenticated)
// =============================================================================

async fn get_config(_auth: Admin, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.runtime_config.read().clone();
    Json(config)
}

/// Apply a partial config update. Only provided fields change; the result is
/// persisted to disk best-effort and the change list is echoed back.
async fn update_config(
    _auth: Admin,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    let (changes, config_clone) = {
        let mut config = state.runtime_config.write();
        let changes = config.apply_update(&update);
        (changes, config.clone())
    };

    if !changes.is_empty() {
        info!(changes = ?changes, "Runtime config updated via API");

        if let Err(e) = config_clone.save(CONFIG_PATH) {
            warn!(error = %e, "Failed to save runtime config to disk");
        }

        state.increment_version();
    }

    Json(serde_json::json!({
        "changes": changes,
        "config": config_clone,
    }))
}

// =============================================================================
// Control endpoints (authenticated)
// =============================================================================

#[derive(Serialize)]
struct ControlResponse {
    mode: String,
    message: String,
}

fn control_response(result: Result<crate::types::EngineMode, String>) -> impl IntoResponse {
    match result {
        Ok(mode) => Json(ControlResponse {
            mode: mode.to_string(),
            message: format!("Engine is now {mode}"),
        })
        .into_response(),
        Err(message) => (
            axum::http::StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response(),
    }
}

async fn control_start(_auth: Admin, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.start();
    if result.is_ok() {
        info!("Engine STARTED via API");
    }
    control_response(result)
}

async fn control_stop(_auth: Admin, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.stop();
    if result.is_ok() {
        info!("Engine STOPPED via API");
    }
    control_response(result)
}

async fn control_reset_halt(
    _auth: Admin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let result = state.reset_halt();
    if result.is_ok() {
        warn!("Drawdown halt RESET via API — peak re-anchored");
    }
    control_response(result)
}
