//! Prediction endpoint
//!
//! Accepts a multipart upload, stages it in a scoped temp file, runs the
//! pipeline on a blocking worker, and returns the ranked results. Client
//! mistakes are 400s with a one-line reason; pipeline failures are 500s
//! carrying the error and an empty result list.

use std::io::Write;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use chirp_core::predict::clamp_top_k;

use crate::AppState;

/// Default result count when the form omits `top_k`
const DEFAULT_TOP_K: &str = "5";

/// POST /api/predict
pub async fn predict(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file_bytes: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut top_k_raw: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(&format!("malformed multipart body: {}", e)),
        };

        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => file_bytes = Some(bytes),
                    Err(e) => return bad_request(&format!("failed to read upload: {}", e)),
                }
            }
            Some("top_k") => match field.text().await {
                Ok(text) => top_k_raw = Some(text),
                Err(e) => return bad_request(&format!("failed to read top_k: {}", e)),
            },
            _ => {}
        }
    }

    let bytes = match file_bytes {
        Some(bytes) => bytes,
        None => return bad_request("missing file"),
    };
    let name = file_name.unwrap_or_default();
    if bytes.is_empty() || name.is_empty() {
        return bad_request("empty upload");
    }

    let top_k = match parse_top_k(top_k_raw.as_deref()) {
        Some(k) => k,
        None => return bad_request("top_k must be an integer"),
    };

    // Stage the upload in a temp file that keeps the original extension, so
    // the decoder gets its container hint. The file is unlinked when the
    // handle drops, success or not.
    let temp = match tempfile::Builder::new()
        .prefix("chirp-upload-")
        .suffix(&temp_suffix(&name))
        .tempfile()
    {
        Ok(temp) => temp,
        Err(e) => return pipeline_error(&format!("failed to stage upload: {}", e)),
    };
    if let Err(e) = temp.as_file().write_all(&bytes) {
        return pipeline_error(&format!("failed to stage upload: {}", e));
    }

    log::info!(
        "predict: {} bytes from {:?}, top_k={}",
        bytes.len(),
        name,
        top_k
    );

    // Decode/FFT/inference are CPU-bound; keep them off the async runtime
    let pipeline = state.pipeline.clone();
    let result = tokio::task::spawn_blocking(move || {
        let output = pipeline.predict(temp.path(), top_k);
        drop(temp);
        output
    })
    .await;

    match result {
        Ok(Ok(output)) => Json(output).into_response(),
        Ok(Err(e)) => {
            log::warn!("predict failed: {}", e);
            pipeline_error(&e.to_string())
        }
        Err(e) => {
            log::error!("predict task panicked: {}", e);
            pipeline_error("internal error")
        }
    }
}

/// Parse the `top_k` form field: default 5, clamp into [1, 50], reject
/// anything that isn't an integer
fn parse_top_k(raw: Option<&str>) -> Option<usize> {
    let raw = raw.unwrap_or(DEFAULT_TOP_K);
    raw.trim().parse::<i64>().ok().map(clamp_top_k)
}

/// Temp-file suffix preserving the upload's extension, e.g. `.ogg`.
/// Extensionless uploads default to `.wav` so the decoder still gets a
/// container hint.
fn temp_suffix(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| String::from(".wav"))
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn pipeline_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message, "results": [] })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_k_defaults_to_five() {
        assert_eq!(parse_top_k(None), Some(5));
    }

    #[test]
    fn test_parse_top_k_clamps() {
        assert_eq!(parse_top_k(Some("0")), Some(1));
        assert_eq!(parse_top_k(Some("-7")), Some(1));
        assert_eq!(parse_top_k(Some("25")), Some(25));
        assert_eq!(parse_top_k(Some("500")), Some(50));
    }

    #[test]
    fn test_parse_top_k_rejects_non_integers() {
        assert_eq!(parse_top_k(Some("three")), None);
        assert_eq!(parse_top_k(Some("2.5")), None);
        assert_eq!(parse_top_k(Some("")), None);
    }

    #[test]
    fn test_parse_top_k_trims_whitespace() {
        assert_eq!(parse_top_k(Some(" 10 ")), Some(10));
    }

    #[test]
    fn test_temp_suffix() {
        assert_eq!(temp_suffix("clip.ogg"), ".ogg");
        assert_eq!(temp_suffix("nested.name.wav"), ".wav");
    }

    #[test]
    fn test_temp_suffix_defaults_to_wav() {
        assert_eq!(temp_suffix("noextension"), ".wav");
    }
}
