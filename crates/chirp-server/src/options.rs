//! Server options from environment variables
//!
//! The pipeline config file covers the core; the serving surface (port,
//! upload limit, static UI) is environment-only, with core paths also
//! overridable per deployment.

use std::env;
use std::path::PathBuf;

use chirp_core::PipelineConfig;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_CONTENT_LENGTH: usize = 200 * 1024 * 1024;
const DEFAULT_STATIC_DIR: &str = "frontend/dist";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Serving-surface options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    pub max_body_bytes: usize,
    /// Static SPA directory, `None` when UI serving is disabled
    pub static_dir: Option<PathBuf>,
}

impl ServerOptions {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_body_bytes = env::var("MAX_CONTENT_LENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONTENT_LENGTH);

        let serve_ui = env::var("SERVE_UI").map_or(true, |v| v == "1");
        let static_dir = serve_ui.then(|| {
            PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.into()))
        });

        Self {
            port,
            max_body_bytes,
            static_dir,
        }
    }
}

/// Path to the pipeline config file
pub fn config_path() -> PathBuf {
    PathBuf::from(env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()))
}

/// Layer environment overrides over the file-loaded pipeline config
pub fn apply_env_overrides(config: &mut PipelineConfig) {
    if let Ok(v) = env::var("MODEL_PATH") {
        config.model_path = PathBuf::from(v);
    }
    if let Ok(v) = env::var("MODEL_URL") {
        if !v.is_empty() {
            config.model_url = Some(v);
        }
    }
    if let Ok(v) = env::var("TRAIN_CSV") {
        config.train_csv_path = PathBuf::from(v);
    }
    if let Ok(v) = env::var("TAXONOMY_CSV") {
        config.taxonomy_csv_path = PathBuf::from(v);
    }
}
