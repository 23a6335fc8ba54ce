use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::events::ProducerEvent;
use super::transcript::{TranscriptEntry, TranscriptLog, TranscriptSource};
use crate::capture::SystemAudioCapturer;
use crate::media::HostMedia;
use crate::recognizer::{RecognizerAdapter, RecognizerAdapterConfig};
use crate::recorder::{SegmentingRecorder, SegmentingRecorderConfig};
use crate::transcribe::{TranscriptionBackend, TranscriptionClient, TranscriptionConfig};

/// Which producers a session runs. Chosen before start and immutable for
/// the session's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelection {
    Microphone,
    System,
    Both,
}

impl SourceSelection {
    pub fn includes(self, source: TranscriptSource) -> bool {
        match (self, source) {
            (Self::Both, _) => true,
            (Self::Microphone, TranscriptSource::Microphone) => true,
            (Self::System, TranscriptSource::System) => true,
            _ => false,
        }
    }
}

/// Session lifecycle. Not freely settable: transitions happen in
/// `start`/`stop` and in the producer event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Configuration for a capture session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub recognizer: RecognizerAdapterConfig,
    pub recorder: SegmentingRecorderConfig,
    pub transcription: TranscriptionConfig,
}

/// Copy-out status snapshot for the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Pure projection: true iff any producer is running.
    pub is_recording: bool,
    pub active_producers: Vec<TranscriptSource>,
    pub selection: Option<SourceSelection>,
    pub started_at: Option<DateTime<Utc>>,
    pub entry_count: usize,
    pub audio_level: f32,
    /// Present only when the local backend is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_backend_connected: Option<bool>,
    pub last_error: Option<String>,
    pub advisory: Option<String>,
}

/// State shared between the coordinator's API surface and its event loop.
struct SessionShared {
    state: StdMutex<SessionState>,
    /// Producers this session launched and still expects to hear from.
    /// Populated for the whole selection before anything spawns, so a
    /// producer dying mid-start cannot make the set look empty while a
    /// sibling is still being brought up. The session auto-idles when the
    /// last launched producer stops.
    launched: StdMutex<HashSet<TranscriptSource>>,
    /// Producers that have reported `Started` and not yet `Stopped`.
    active_producers: StdMutex<HashSet<TranscriptSource>>,
    transcript: TranscriptLog,
    /// Per-source "currently transcribing" previews; overwritten on each
    /// interim update, cleared when the source finalizes or stops.
    interim: StdMutex<HashMap<TranscriptSource, String>>,
    last_error: StdMutex<Option<String>>,
    advisory: StdMutex<Option<AdvisoryState>>,
    started_at: StdMutex<Option<DateTime<Utc>>>,
    selection: StdMutex<Option<SourceSelection>>,
}

struct AdvisoryState {
    source: TranscriptSource,
    seq: u64,
    message: String,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            state: StdMutex::new(SessionState::Idle),
            launched: StdMutex::new(HashSet::new()),
            active_producers: StdMutex::new(HashSet::new()),
            transcript: TranscriptLog::new(),
            interim: StdMutex::new(HashMap::new()),
            last_error: StdMutex::new(None),
            advisory: StdMutex::new(None),
            started_at: StdMutex::new(None),
            selection: StdMutex::new(None),
        }
    }
}

/// Owns the producers and merges their output into one session.
pub struct SessionCoordinator {
    recognizer: Arc<RecognizerAdapter>,
    recorder: Arc<SegmentingRecorder>,
    capturer: Arc<SystemAudioCapturer>,
    transcriber: Arc<TranscriptionClient>,
    shared: Arc<SessionShared>,
    event_task: JoinHandle<()>,
    probe_task: Mutex<Option<JoinHandle<()>>>,
    // Keeps the event loop alive for the coordinator's lifetime; cloned
    // into every producer.
    _events_tx: mpsc::Sender<ProducerEvent>,
}

impl SessionCoordinator {
    pub fn new(media: HostMedia, config: SessionConfig) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::channel(64);

        let transcriber = Arc::new(
            TranscriptionClient::new(config.transcription.clone())
                .context("failed to create transcription client")?,
        );
        let capturer = Arc::new(SystemAudioCapturer::new(
            Arc::clone(&media.devices),
            Arc::clone(&media.graph),
        ));
        let recognizer = Arc::new(RecognizerAdapter::new(
            Arc::clone(&media.recognizer),
            config.recognizer.clone(),
            events_tx.clone(),
        ));
        let recorder = Arc::new(SegmentingRecorder::new(
            Arc::clone(&media.recorder_factory),
            Arc::clone(&transcriber),
            config.recorder.clone(),
            events_tx.clone(),
        ));

        let shared = Arc::new(SessionShared::new());
        let event_task = tokio::spawn(run_event_loop(events_rx, Arc::clone(&shared)));

        let probe_task = if config.transcription.backend == TranscriptionBackend::Local {
            Some(transcriber.spawn_connectivity_probe())
        } else {
            None
        };

        Ok(Self {
            recognizer,
            recorder,
            capturer,
            transcriber,
            shared,
            event_task,
            probe_task: Mutex::new(probe_task),
            _events_tx: events_tx,
        })
    }

    /// Start a session with the given source selection. No-op (with a
    /// warning) unless idle: the selection is immutable while recording.
    pub async fn start(&self, selection: SourceSelection) -> Result<()> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != SessionState::Idle {
                warn!("start ignored: session is {:?}", *state);
                return Ok(());
            }
            *state = SessionState::Starting;
        }

        info!("starting session (selection: {:?})", selection);
        {
            let mut launched = self.shared.launched.lock().unwrap();
            launched.clear();
            if selection.includes(TranscriptSource::Microphone) {
                launched.insert(TranscriptSource::Microphone);
            }
            if selection.includes(TranscriptSource::System) {
                launched.insert(TranscriptSource::System);
            }
        }
        *self.shared.selection.lock().unwrap() = Some(selection);
        *self.shared.started_at.lock().unwrap() = Some(Utc::now());
        *self.shared.last_error.lock().unwrap() = None;
        *self.shared.advisory.lock().unwrap() = None;

        let mut failures: Vec<String> = Vec::new();

        if selection.includes(TranscriptSource::Microphone) {
            if let Err(e) = self.recognizer.start().await {
                // A microphone failure must not stop system capture.
                error!("microphone producer failed to start: {}", e);
                failures.push(format!("[microphone] {e}"));
                self.shared
                    .launched
                    .lock()
                    .unwrap()
                    .remove(&TranscriptSource::Microphone);
            }
        }

        if selection.includes(TranscriptSource::System) {
            let launched = match self.capturer.start_capture().await {
                Ok(stream) => match self.recorder.start(&stream).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!("segmenting recorder failed to start: {}", e);
                        self.capturer.stop_capture();
                        failures.push(format!("[system] {e}"));
                        false
                    }
                },
                Err(e) => {
                    error!("system audio capture failed: {}", e);
                    failures.push(format!("[system] {e}"));
                    false
                }
            };
            if !launched {
                self.shared
                    .launched
                    .lock()
                    .unwrap()
                    .remove(&TranscriptSource::System);
            }
        }

        if !failures.is_empty() {
            *self.shared.last_error.lock().unwrap() = Some(failures.join("; "));
        }

        // An empty set here means every producer either failed to launch or
        // already died; no further Stopped event will arrive to idle us.
        if self.shared.launched.lock().unwrap().is_empty() {
            *self.shared.state.lock().unwrap() = SessionState::Idle;
            *self.shared.started_at.lock().unwrap() = None;
            *self.shared.selection.lock().unwrap() = None;
            anyhow::bail!("no producer could start: {}", failures.join("; "));
        }

        Ok(())
    }

    /// Stop the session: signal every producer to halt, flush buffered
    /// audio, release all media resources. Safe to call from any state,
    /// any number of times.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state == SessionState::Idle {
                return;
            }
            *state = SessionState::Stopping;
        }
        info!("stopping session");

        // Each producer gets its own guarded teardown; one failing must
        // not leak the others.
        self.recognizer.stop().await;
        self.recorder.stop().await;
        self.capturer.stop_capture();

        {
            let mut state = self.shared.state.lock().unwrap();
            *state = SessionState::Idle;
        }
        self.shared.launched.lock().unwrap().clear();
        self.shared.interim.lock().unwrap().clear();
        *self.shared.started_at.lock().unwrap() = None;
        *self.shared.selection.lock().unwrap() = None;
        info!("session stopped");
    }

    /// Drop the accumulated transcript and clear any surfaced status.
    pub fn reset(&self) {
        self.shared.transcript.clear();
        self.shared.interim.lock().unwrap().clear();
        *self.shared.last_error.lock().unwrap() = None;
        *self.shared.advisory.lock().unwrap() = None;
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock().unwrap()
    }

    /// True iff at least one producer is running. A read projection,
    /// never set directly.
    pub fn is_recording(&self) -> bool {
        !self.shared.active_producers.lock().unwrap().is_empty()
    }

    /// Timestamp-sorted snapshot of the transcript.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared.transcript.entries()
    }

    /// Per-source live previews of still-revisable text.
    pub fn interim_previews(&self) -> HashMap<TranscriptSource, String> {
        self.shared.interim.lock().unwrap().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().unwrap().clone()
    }

    pub fn audio_level(&self) -> f32 {
        self.capturer.audio_level()
    }

    pub fn status(&self) -> SessionStatus {
        let active: Vec<TranscriptSource> = self
            .shared
            .active_producers
            .lock()
            .unwrap()
            .iter()
            .copied()
            .collect();

        SessionStatus {
            state: self.state(),
            is_recording: !active.is_empty(),
            active_producers: active,
            selection: *self.shared.selection.lock().unwrap(),
            started_at: *self.shared.started_at.lock().unwrap(),
            entry_count: self.shared.transcript.len(),
            audio_level: self.capturer.audio_level(),
            local_backend_connected: match self.transcriber.backend() {
                TranscriptionBackend::Local => Some(self.transcriber.is_local_connected()),
                TranscriptionBackend::Cloud => None,
            },
            last_error: self.last_error(),
            advisory: self
                .shared
                .advisory
                .lock()
                .unwrap()
                .as_ref()
                .map(|a| a.message.clone()),
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.event_task.abort();
        if let Ok(mut probe) = self.probe_task.try_lock() {
            if let Some(handle) = probe.take() {
                handle.abort();
            }
        }
    }
}

/// Consumes tagged producer events and folds them into the shared session
/// state. Runs for the coordinator's lifetime.
async fn run_event_loop(mut rx: mpsc::Receiver<ProducerEvent>, shared: Arc<SessionShared>) {
    while let Some(event) = rx.recv().await {
        match event {
            ProducerEvent::Started(source) => {
                if shared.active_producers.lock().unwrap().insert(source) {
                    info!("producer started: {}", source);
                }
                let mut state = shared.state.lock().unwrap();
                if *state == SessionState::Starting {
                    *state = SessionState::Active;
                }
            }

            ProducerEvent::Final {
                source,
                text,
                confidence,
            } => {
                if let Some(entry) = TranscriptEntry::from_final_text(source, &text, confidence) {
                    info!("[{}] {}", source, entry.text);
                    shared.transcript.append(entry);
                }
                // Finalizing supersedes any live preview for the source.
                shared.interim.lock().unwrap().remove(&source);
            }

            ProducerEvent::Interim { source, text } => {
                shared.interim.lock().unwrap().insert(source, text);
            }

            ProducerEvent::Advisory {
                source,
                message,
                seq,
            } => {
                *shared.advisory.lock().unwrap() = Some(AdvisoryState {
                    source,
                    seq,
                    message,
                });
            }

            ProducerEvent::AdvisoryCleared { source, seq } => {
                // Only the timer belonging to the displayed advisory may
                // clear it; a newer advisory outlives older timers.
                let mut advisory = shared.advisory.lock().unwrap();
                if advisory
                    .as_ref()
                    .is_some_and(|a| a.source == source && a.seq == seq)
                {
                    *advisory = None;
                }
            }

            ProducerEvent::Error {
                source,
                message,
                fatal,
            } => {
                if fatal {
                    error!("producer {} failed: {}", source, message);
                } else {
                    warn!("producer {} error: {}", source, message);
                }
                *shared.last_error.lock().unwrap() = Some(format!("[{}] {}", source, message));
            }

            ProducerEvent::Stopped(source) => {
                shared.active_producers.lock().unwrap().remove(&source);
                shared.interim.lock().unwrap().remove(&source);
                info!("producer stopped: {}", source);

                // The session is over the moment its last launched producer
                // stops, whether or not anyone called stop(). This includes
                // a producer that dies before ever reporting Started, so a
                // failed launch cannot wedge the session in Starting.
                let none_left = {
                    let mut launched = shared.launched.lock().unwrap();
                    launched.remove(&source);
                    launched.is_empty()
                };
                if none_left {
                    let mut state = shared.state.lock().unwrap();
                    if matches!(*state, SessionState::Starting | SessionState::Active) {
                        *state = SessionState::Idle;
                        *shared.started_at.lock().unwrap() = None;
                        *shared.selection.lock().unwrap() = None;
                        info!("last producer stopped; session idle");
                    }
                }
            }
        }
    }
}
