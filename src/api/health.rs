use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::handover::VariancePolicy;
use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "Cash Handover Chain",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// tolerance is shown to clients so the UI can warn before a count gets disputed
pub async fn public_config(State(state): State<Arc<AppState>>) -> Json<VariancePolicy> {
    Json(*state.handover_service.policy())
}
