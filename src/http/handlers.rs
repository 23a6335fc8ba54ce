use super::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub language: String,
    /// Estimated duration in seconds, derived from upload size.
    pub duration: f64,
    pub timestamp: String,
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u64,
    #[serde(rename = "fileSize")]
    pub file_size: usize,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub status: String,
    pub model: String,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body shape of the upstream transcriptions endpoint.
#[derive(Debug, Deserialize)]
struct UpstreamTranscription {
    text: String,
}

struct AudioUpload {
    bytes: Vec<u8>,
    content_type: String,
    file_name: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /transcribe
/// Validate a multipart audio upload and forward it to the upstream speech
/// API. Validation failures never reach the upstream.
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let started = Instant::now();

    let mut upload: Option<AudioUpload> = None;
    let mut language = "es".to_string();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart request: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "Malformed multipart request");
            }
        };

        match field.name() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or("").to_string();
                let file_name = field.file_name().unwrap_or("audio.webm").to_string();
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) => {
                        warn!("failed to read audio upload: {}", e);
                        return error_response(StatusCode::BAD_REQUEST, "Failed to read audio file");
                    }
                };
                upload = Some(AudioUpload {
                    bytes,
                    content_type,
                    file_name,
                });
            }
            Some("language") => {
                if let Ok(text) = field.text().await {
                    if !text.is_empty() {
                        language = text;
                    }
                }
            }
            _ => {}
        }
    }

    let Some(upload) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No audio file provided");
    };

    if !upload.content_type.starts_with("audio/") {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid file type: {}", upload.content_type),
        );
    }
    if upload.bytes.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Audio file is empty");
    }
    if upload.bytes.len() > state.upstream.max_upload_bytes {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "Audio file too large: {} bytes (max {})",
                upload.bytes.len(),
                state.upstream.max_upload_bytes
            ),
        );
    }

    let api_key = match std::env::var(&state.upstream.api_key_env) {
        Ok(key) if !key.is_empty() => key,
        _ => {
            error!(
                "upstream credential missing ({} not set)",
                state.upstream.api_key_env
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Transcription service is not configured",
            );
        }
    };

    let file_size = upload.bytes.len();
    info!(
        "forwarding {} bytes ({}) to upstream, language: {}",
        file_size, upload.content_type, language
    );

    let part = match reqwest::multipart::Part::bytes(upload.bytes)
        .file_name(upload.file_name)
        .mime_str(&upload.content_type)
    {
        Ok(part) => part,
        Err(e) => {
            warn!("invalid upload content type: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid file content type");
        }
    };
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("model", state.upstream.model.clone())
        .text("language", language.clone())
        .text("response_format", "json")
        .text("temperature", state.upstream.temperature.to_string());

    let response = match state
        .client
        .post(&state.upstream.url)
        .bearer_auth(api_key)
        .multipart(form)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) if e.is_timeout() => {
            warn!("upstream request timed out");
            return error_response(StatusCode::REQUEST_TIMEOUT, "Transcription timed out");
        }
        Err(e) => {
            error!("upstream request failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reach transcription service",
            );
        }
    };

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("upstream rate limit hit");
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Transcription rate limit exceeded, try again shortly",
        );
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("upstream returned {}: {}", status, body);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Transcription failed");
    }

    let transcription: UpstreamTranscription = match response.json().await {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("malformed upstream response: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Malformed transcription response",
            );
        }
    };

    // Rough duration estimate from the upload size; good enough for the
    // caller's pacing display.
    let duration = file_size as f64 / 16000.0;

    (
        StatusCode::OK,
        Json(TranscribeResponse {
            text: transcription.text,
            language,
            duration,
            timestamp: Utc::now().to_rfc3339(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            file_size,
        }),
    )
        .into_response()
}

/// GET /transcribe
/// Capability probe: which formats and limits the forwarder accepts.
pub async fn transcribe_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    Json(CapabilitiesResponse {
        status: "ok".to_string(),
        model: state.upstream.model.clone(),
        supported_formats: vec![
            "audio/webm".to_string(),
            "audio/mp4".to_string(),
            "audio/ogg".to_string(),
            "audio/wav".to_string(),
            "audio/mpeg".to_string(),
        ],
        max_file_size_bytes: state.upstream.max_upload_bytes,
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
