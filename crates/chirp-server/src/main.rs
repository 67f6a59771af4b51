//! chirp-server - HTTP server for the chirp species classifier
//!
//! Loads the classifier and its metadata once at startup, then serves
//! predictions over a small JSON API with optional static UI passthrough.

use std::sync::Arc;

use anyhow::{Context, Result};
use chirp_core::{
    config::load_config, ClassIndex, ModelManager, OrtScorer, Pipeline, TaxonomyStore,
};
use chirp_server::options::{apply_env_overrides, config_path, ServerOptions};
use chirp_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting chirp-server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&config_path());
    apply_env_overrides(&mut config);
    config.validate();

    let options = ServerOptions::from_env();

    // Model and metadata load once; per-request work never touches disk
    // state besides the staged upload.
    let class_index = ClassIndex::build(&config.train_csv_path, &config.taxonomy_csv_path);
    log::info!("Class index ready: {} classes", class_index.len());

    let taxonomy = TaxonomyStore::load(&config.taxonomy_csv_path);
    log::info!(
        "Taxonomy ready: {} records, {} metadata columns",
        taxonomy.len(),
        taxonomy.columns().len()
    );

    let manager = ModelManager::new()?;
    let model_path = manager
        .ensure_model(&config.model_path, config.model_url.as_deref())
        .context("Failed to locate model weights")?;

    let scorer = OrtScorer::load(
        &model_path,
        &config.input_name,
        class_index.len(),
        config.mismatch_policy,
    )
    .context("Failed to load model")?;

    let pipeline = Arc::new(Pipeline::new(
        config,
        class_index,
        taxonomy,
        Box::new(scorer),
    ));
    let state = AppState::new(pipeline, model_path);

    if let Some(dir) = &options.static_dir {
        log::info!("Serving static UI from {:?}", dir);
    }

    let app = build_router(state, options.max_body_bytes, options.static_dir.clone());

    let addr = format!("0.0.0.0:{}", options.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("chirp-server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("chirp-server shut down");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM so in-flight predictions finish before exit
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => log::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl-C, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}
