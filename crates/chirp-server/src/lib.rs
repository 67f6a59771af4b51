//! chirp-server library - HTTP boundary for the classification pipeline
//!
//! The pipeline (class index, taxonomy, loaded model) is built once at
//! startup and shared immutably across handlers; each request does
//! independent, stateless work against it.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chirp_core::Pipeline;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

pub mod api;
pub mod options;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Resolved weights path reported by the health endpoint
    pub model_path: PathBuf,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, model_path: PathBuf) -> Self {
        Self {
            pipeline,
            model_path,
        }
    }
}

/// Build the application router
///
/// API routes get permissive CORS and the upload size limit; when a static
/// directory is configured the SPA is served with an `index.html` fallback
/// so client-side routes resolve.
pub fn build_router(
    state: AppState,
    max_body_bytes: usize,
    static_dir: Option<PathBuf>,
) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/predict", post(api::predict))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive());

    let mut app = Router::new().merge(api).with_state(state);

    if let Some(dir) = static_dir {
        let spa = ServeDir::new(&dir).fallback(ServeFile::new(dir.join("index.html")));
        app = app.fallback_service(spa);
    }

    app
}
