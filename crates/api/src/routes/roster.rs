//! Roster and liveness endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;

pub async fn roster(State(state): State<AppState>) -> Json<Value> {
    let roster = state.engine.roster();
    Json(json!({
        "agents": roster.agents,
        "orchestrator_id": roster.orchestrator_id,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
