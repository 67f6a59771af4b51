//! Health check endpoint

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub num_classes: usize,
    pub model_loaded: bool,
    pub model_path: String,
}

/// GET /api/health
///
/// Startup is fatal on model-load failure, so a serving process always
/// reports the model as loaded.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        num_classes: state.pipeline.num_classes(),
        model_loaded: true,
        model_path: state.model_path.display().to_string(),
    })
}
