use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::limiter::RequestLimiter;
use crate::error::TranscriptionError;
use crate::recorder::AudioSegment;

/// Where transcription executes. A configuration choice resolved before
/// each call; there is no automatic fallback between backends — selecting
/// `Local` while it is unreachable is a hard failure, so the pipeline never
/// silently incurs cloud costs or degrades accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    /// Hosted speech API behind the forwarder service.
    Cloud,
    /// Same-host GPU service, assumed already running.
    Local,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackend,
    /// Short language code sent with every request, e.g. "es".
    pub language: String,
    /// Cloud transcribe endpoint (the forwarder's `POST /transcribe`).
    pub cloud_url: String,
    /// Base URL of the local service.
    pub local_base_url: String,
    /// Use the raw-binary-body endpoint of the local service instead of
    /// multipart; lower overhead per segment.
    pub local_raw_body: bool,
    /// Segments smaller than this are discarded without a network call.
    pub min_segment_bytes: usize,
    /// Minimum interval between request starts.
    pub min_request_interval: Duration,
    /// Hard timeout on any in-flight request. A timed-out request frees
    /// the limiter the moment it returns.
    pub request_timeout: Duration,
    /// How often to probe local-service health while disconnected.
    pub probe_interval: Duration,
}

impl TranscriptionConfig {
    /// Defaults for a backend; the local GPU path is paced faster than the
    /// cloud path.
    pub fn for_backend(backend: TranscriptionBackend) -> Self {
        let min_request_interval = match backend {
            TranscriptionBackend::Cloud => Duration::from_secs(2),
            TranscriptionBackend::Local => Duration::from_secs(1),
        };
        Self {
            backend,
            language: "es".to_string(),
            cloud_url: "http://localhost:8080/transcribe".to_string(),
            local_base_url: "http://localhost:8889".to_string(),
            local_raw_body: true,
            min_segment_bytes: 1000,
            min_request_interval,
            request_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_secs(5),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self::for_backend(TranscriptionBackend::Cloud)
    }
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
    /// Local-service failures arrive as 2xx with an error field.
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Converts audio segments into text via exactly one backend.
pub struct TranscriptionClient {
    http: reqwest::Client,
    config: TranscriptionConfig,
    limiter: RequestLimiter,
    local_connected: Arc<AtomicBool>,
}

impl TranscriptionClient {
    pub fn new(config: TranscriptionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        info!(
            "transcription client ready (backend: {:?}, min interval: {:?})",
            config.backend, config.min_request_interval
        );

        Ok(Self {
            http,
            limiter: RequestLimiter::new(config.min_request_interval),
            local_connected: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    pub fn backend(&self) -> TranscriptionBackend {
        self.config.backend
    }

    /// Whether the local service answered its last health probe.
    pub fn is_local_connected(&self) -> bool {
        self.local_connected.load(Ordering::SeqCst)
    }

    /// Transcribe one segment.
    ///
    /// `Ok(None)` means the segment was dropped without a request:
    /// undersized, or refused by the rate limiter. `Ok(Some(text))` may
    /// carry an empty string, a valid outcome meaning no intelligible
    /// speech. The segment is consumed either way; there are no retries.
    pub async fn transcribe(
        &self,
        segment: AudioSegment,
    ) -> Result<Option<String>, TranscriptionError> {
        if segment.len() < self.config.min_segment_bytes {
            debug!(
                "segment too small ({} bytes < {}), skipping",
                segment.len(),
                self.config.min_segment_bytes
            );
            return Ok(None);
        }

        let Some(_permit) = self.limiter.try_begin() else {
            debug!("rate limited, dropping segment ({} bytes)", segment.len());
            return Ok(None);
        };

        // The permit is held across the call and released on return, so a
        // timed-out request frees the limiter immediately.
        let text = match self.config.backend {
            TranscriptionBackend::Cloud => self.transcribe_cloud(segment).await?,
            TranscriptionBackend::Local => self.transcribe_local(segment).await?,
        };
        Ok(Some(text))
    }

    /// Single health probe against the local service. Updates and returns
    /// the connectivity flag.
    pub async fn check_local_health(&self) -> bool {
        let url = format!("{}/health", self.config.local_base_url);
        let connected = match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("local service health probe failed: {}", e);
                false
            }
        };

        let was = self.local_connected.swap(connected, Ordering::SeqCst);
        if connected && !was {
            info!("local transcription service connected");
        }
        connected
    }

    /// Spawn the reconnect loop: probes on a fixed interval whenever not
    /// currently connected. The caller owns the handle and aborts it on
    /// teardown.
    pub fn spawn_connectivity_probe(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if !client.is_local_connected() {
                    client.check_local_health().await;
                }
                tokio::time::sleep(client.config.probe_interval).await;
            }
        })
    }

    async fn transcribe_cloud(
        &self,
        segment: AudioSegment,
    ) -> Result<String, TranscriptionError> {
        let file_name = format!("audio-{}.webm", chrono::Utc::now().timestamp_millis());
        let size = segment.len();
        let part = reqwest::multipart::Part::bytes(segment.bytes)
            .file_name(file_name)
            .mime_str(&segment.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("language", self.config.language.clone());

        debug!("sending {} bytes to cloud backend", size);
        let response = self
            .http
            .post(&self.config.cloud_url)
            .multipart(form)
            .send()
            .await?;

        Self::read_transcript(response).await
    }

    async fn transcribe_local(
        &self,
        segment: AudioSegment,
    ) -> Result<String, TranscriptionError> {
        if !self.is_local_connected() {
            return Err(TranscriptionError::BackendUnreachable);
        }

        let size = segment.len();
        let result = if self.config.local_raw_body {
            let url = format!("{}/transcribe-udp", self.config.local_base_url);
            debug!("sending {} bytes to local backend (raw body)", size);
            self.http
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(segment.bytes)
                .send()
                .await
        } else {
            let url = format!("{}/transcribe", self.config.local_base_url);
            let part = reqwest::multipart::Part::bytes(segment.bytes)
                .file_name("segment.webm")
                .mime_str(&segment.mime_type)?;
            let form = reqwest::multipart::Form::new()
                .part("audio", part)
                .text("language", self.config.language.clone());
            debug!("sending {} bytes to local backend (multipart)", size);
            self.http.post(&url).multipart(form).send().await
        };

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                // A transport failure means the service went away; force
                // the probe loop to re-establish connectivity.
                warn!("local backend unreachable: {}", e);
                self.local_connected.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        Self::read_transcript(response).await
    }

    async fn read_transcript(response: reqwest::Response) -> Result<String, TranscriptionError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(TranscriptionError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TranscribeResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::MalformedResponse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(TranscriptionError::Service(error));
        }
        Ok(parsed.text)
    }
}
