use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::segment::SegmentBuffer;
use crate::error::RecorderError;
use crate::media::{MediaRecorderEvent, MediaRecorderFactory, MediaStream};
use crate::session::{ProducerEvent, TranscriptSource};
use crate::transcribe::TranscriptionClient;

/// Tuning for segment accumulation and flushing.
#[derive(Debug, Clone)]
pub struct SegmentingRecorderConfig {
    /// Descending preference list probed against the host's capability
    /// check.
    pub preferred_mime_types: Vec<String>,
    /// Used when none of the preferred encodings is supported.
    pub fallback_mime_type: String,
    /// Cadence at which the host recorder emits encoded chunks.
    pub timeslice: Duration,
    /// Wall-clock flush cadence, independent of chunk arrival.
    pub flush_interval: Duration,
    /// Flush as soon as this many chunks have accumulated.
    pub max_chunks_per_segment: usize,
    /// The periodic flush skips segments smaller than this; they would not
    /// contain enough audio to be worth a request. The final flush on stop
    /// ignores it.
    pub min_auto_flush_bytes: usize,
}

impl Default for SegmentingRecorderConfig {
    fn default() -> Self {
        Self {
            preferred_mime_types: vec![
                "audio/webm;codecs=opus".to_string(),
                "audio/webm".to_string(),
                "audio/mp4".to_string(),
                "audio/ogg;codecs=opus".to_string(),
            ],
            fallback_mime_type: "audio/webm".to_string(),
            timeslice: Duration::from_secs(3),
            flush_interval: Duration::from_secs(8),
            max_chunks_per_segment: 5,
            min_auto_flush_bytes: 50_000,
        }
    }
}

/// Consumes a raw audio stream through a host recorder, accumulates its
/// encoded chunks into time-boxed segments, and hands complete segments to
/// the transcription client. Transcribed text is emitted as system-source
/// finals.
pub struct SegmentingRecorder {
    factory: Arc<dyn MediaRecorderFactory>,
    transcriber: Arc<TranscriptionClient>,
    config: SegmentingRecorderConfig,
    events: mpsc::Sender<ProducerEvent>,

    recording: Arc<AtomicBool>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SegmentingRecorder {
    pub fn new(
        factory: Arc<dyn MediaRecorderFactory>,
        transcriber: Arc<TranscriptionClient>,
        config: SegmentingRecorderConfig,
        events: mpsc::Sender<ProducerEvent>,
    ) -> Self {
        Self {
            factory,
            transcriber,
            config,
            events,
            recording: Arc::new(AtomicBool::new(false)),
            stop_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Best-supported encoding from the preference list, or the baseline
    /// fallback.
    pub fn select_mime_type(&self) -> String {
        for mime in &self.config.preferred_mime_types {
            if self.factory.is_type_supported(mime) {
                return mime.clone();
            }
        }
        self.config.fallback_mime_type.clone()
    }

    /// Start recording the given stream. No-op if already recording.
    pub async fn start(&self, stream: &MediaStream) -> Result<(), RecorderError> {
        if self.recording.swap(true, Ordering::SeqCst) {
            debug!("segmenting recorder already running");
            return Ok(());
        }

        let mime_type = self.select_mime_type();
        info!("recording with encoding {}", mime_type);

        let mut recorder = match self.factory.create(stream, &mime_type) {
            Ok(r) => r,
            Err(e) => {
                self.recording.store(false, Ordering::SeqCst);
                return Err(RecorderError(e.to_string()));
            }
        };
        let rx = match recorder.start(self.config.timeslice).await {
            Ok(rx) => rx,
            Err(e) => {
                self.recording.store(false, Ordering::SeqCst);
                return Err(RecorderError(e.to_string()));
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock().await = Some(stop_tx);

        let transcriber = Arc::clone(&self.transcriber);
        let config = self.config.clone();
        let events = self.events.clone();
        let recording = Arc::clone(&self.recording);

        let handle = tokio::spawn(async move {
            run_recorder(recorder, rx, stop_rx, transcriber, config, events.clone()).await;
            recording.store(false, Ordering::SeqCst);
            let _ = events.send(ProducerEvent::Stopped(TranscriptSource::System)).await;
        });
        *self.task.lock().await = Some(handle);

        Ok(())
    }

    /// Stop recording, flushing any remaining accumulated bytes first.
    /// Idempotent.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.stop_tx.lock().await.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("recorder task panicked: {}", e);
            }
        }
    }
}

async fn run_recorder(
    mut recorder: Box<dyn crate::media::MediaRecorder>,
    mut rx: mpsc::Receiver<MediaRecorderEvent>,
    mut stop_rx: watch::Receiver<bool>,
    transcriber: Arc<TranscriptionClient>,
    config: SegmentingRecorderConfig,
    events: mpsc::Sender<ProducerEvent>,
) {
    let mut buffer = SegmentBuffer::new();
    let mut flush_tick = tokio::time::interval_at(
        tokio::time::Instant::now() + config.flush_interval,
        config.flush_interval,
    );
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,

            event = rx.recv() => match event {
                None | Some(MediaRecorderEvent::Stopped) => break,

                Some(MediaRecorderEvent::Started) => {
                    let _ = events
                        .send(ProducerEvent::Started(TranscriptSource::System))
                        .await;
                }

                Some(MediaRecorderEvent::Chunk(chunk)) => {
                    if chunk.is_empty() {
                        warn!("empty chunk received");
                        continue;
                    }
                    debug!(
                        "chunk received: {} bytes ({} accumulated, {} chunks)",
                        chunk.len(),
                        buffer.total_bytes() + chunk.len(),
                        buffer.chunk_count() + 1
                    );
                    buffer.push(chunk);
                    if buffer.chunk_count() >= config.max_chunks_per_segment {
                        flush(&mut buffer, &transcriber, &events).await;
                    }
                }

                Some(MediaRecorderEvent::Error(msg)) => {
                    // Not self-recovered: surface and shut down; the
                    // caller must restart capture.
                    let _ = events
                        .send(ProducerEvent::Error {
                            source: TranscriptSource::System,
                            message: RecorderError(msg).to_string(),
                            fatal: true,
                        })
                        .await;
                    break;
                }
            },

            _ = flush_tick.tick() => {
                if buffer.total_bytes() >= config.min_auto_flush_bytes {
                    debug!(
                        "periodic flush: {} chunks, {} bytes",
                        buffer.chunk_count(),
                        buffer.total_bytes()
                    );
                    flush(&mut buffer, &transcriber, &events).await;
                }
            }
        }
    }

    // Ask the recorder to wind down, then collect whatever it buffered
    // before the final flush.
    if let Err(e) = recorder.stop().await {
        warn!("failed to stop media recorder: {}", e);
    }
    let drain = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = rx.recv().await {
            match event {
                MediaRecorderEvent::Chunk(chunk) => buffer.push(chunk),
                MediaRecorderEvent::Stopped => break,
                _ => {}
            }
        }
    });
    if drain.await.is_err() {
        warn!("timed out draining recorder events");
    }

    flush(&mut buffer, &transcriber, &events).await;
    info!("segmenting recorder stopped");
}

/// Hand the accumulated segment to the transcription client and clear the
/// accumulator. The segment is consumed whatever the outcome; a failed
/// segment is lost text, never retried from the same bytes.
async fn flush(
    buffer: &mut SegmentBuffer,
    transcriber: &TranscriptionClient,
    events: &mpsc::Sender<ProducerEvent>,
) {
    let Some(segment) = buffer.take() else {
        return;
    };

    debug!(
        "flushing segment: {} bytes from {} chunks",
        segment.len(),
        segment.chunk_count
    );

    match transcriber.transcribe(segment).await {
        Ok(Some(text)) if !text.trim().is_empty() => {
            let _ = events
                .send(ProducerEvent::Final {
                    source: TranscriptSource::System,
                    text,
                    confidence: None,
                })
                .await;
        }
        Ok(_) => debug!("segment produced no text (silence or dropped)"),
        Err(e) => {
            warn!("segment transcription failed: {}", e);
            let _ = events
                .send(ProducerEvent::Error {
                    source: TranscriptSource::System,
                    message: e.to_string(),
                    fatal: false,
                })
                .await;
        }
    }
}
