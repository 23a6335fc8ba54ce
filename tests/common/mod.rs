// Scripted fakes for the host media boundary, shared across integration
// tests. Each fake is driven by a queue of pre-planned outcomes so tests
// control exactly what the "host" does at each step.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::{routing::post, Json, Router};
use tokio::sync::mpsc;

use meetscribe::{
    AudioConstraints, AudioGraph, HostMedia, MediaDevices, MediaRecorder, MediaRecorderEvent,
    MediaRecorderFactory, MediaRequestError, MediaStream, MediaTrack, MixGains, RecognizerEvent,
    RecognizerSettings, SpectrumAnalyser, SpeechRecognizer, TrackKind,
};

// ============================================================================
// Speech recognizer fake
// ============================================================================

/// One planned outcome for a recognizer start call.
pub enum ScriptedRun {
    /// The start call itself fails.
    FailStart(String),
    /// Start succeeds, the given events are delivered, then the stream
    /// stays open until `stop()` closes it.
    Run(Vec<RecognizerEvent>),
    /// Start succeeds, the given events are delivered, then the engine
    /// self-terminates (the stream closes on its own).
    RunThenEnd(Vec<RecognizerEvent>),
}

pub struct FakeRecognizer {
    supported: bool,
    script: Mutex<VecDeque<ScriptedRun>>,
    current: Mutex<Option<mpsc::Sender<RecognizerEvent>>>,
    starts: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new(script: Vec<ScriptedRun>) -> Self {
        Self {
            supported: true,
            script: Mutex::new(script.into()),
            current: Mutex::new(None),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        let mut fake = Self::new(Vec::new());
        fake.supported = false;
        fake
    }

    /// How many times `start` has been called.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Deliver an event on the currently open run, if any.
    pub fn inject(&self, event: RecognizerEvent) {
        if let Some(tx) = self.current.lock().unwrap().as_ref() {
            let _ = tx.try_send(event);
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for FakeRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn start(&self, _settings: &RecognizerSettings) -> Result<mpsc::Receiver<RecognizerEvent>> {
        self.starts.fetch_add(1, Ordering::SeqCst);

        let run = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            // Past the end of the script: a quiet run that stays open.
            .unwrap_or_else(|| ScriptedRun::Run(vec![RecognizerEvent::Started]));

        match run {
            ScriptedRun::FailStart(msg) => anyhow::bail!(msg),
            ScriptedRun::Run(events) => {
                let (tx, rx) = mpsc::channel(64);
                for event in events {
                    let _ = tx.try_send(event);
                }
                *self.current.lock().unwrap() = Some(tx);
                Ok(rx)
            }
            ScriptedRun::RunThenEnd(events) => {
                let (tx, rx) = mpsc::channel(64);
                for event in events {
                    let _ = tx.try_send(event);
                }
                drop(tx);
                Ok(rx)
            }
        }
    }

    async fn stop(&self) {
        // Dropping the sender closes the event stream, which the adapter
        // observes as the run ending.
        self.current.lock().unwrap().take();
    }
}

// ============================================================================
// Media devices fake
// ============================================================================

#[derive(Default)]
pub struct FakeDevices {
    pub supports_display: bool,
    display_results: Mutex<VecDeque<Result<MediaStream, MediaRequestError>>>,
    user_results: Mutex<VecDeque<Result<MediaStream, MediaRequestError>>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            supports_display: true,
            ..Default::default()
        }
    }

    pub fn without_display_support() -> Self {
        Self {
            supports_display: false,
            ..Default::default()
        }
    }

    pub fn push_display_result(&self, result: Result<MediaStream, MediaRequestError>) {
        self.display_results.lock().unwrap().push_back(result);
    }

    pub fn push_user_result(&self, result: Result<MediaStream, MediaRequestError>) {
        self.user_results.lock().unwrap().push_back(result);
    }
}

#[async_trait::async_trait]
impl MediaDevices for FakeDevices {
    fn supports_display_capture(&self) -> bool {
        self.supports_display
    }

    async fn request_user_media(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<MediaStream, MediaRequestError> {
        self.user_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(MediaRequestError::NotFound))
    }

    async fn request_display_media(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<MediaStream, MediaRequestError> {
        self.display_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(MediaRequestError::NotFound))
    }
}

/// A display-capture stream as the host returns it: one video track (the
/// picker requires it) plus one audio track when the user shared audio.
pub fn display_stream_with_audio() -> MediaStream {
    MediaStream::new(vec![
        MediaTrack::new(TrackKind::Video, "screen"),
        MediaTrack::new(TrackKind::Audio, "system-audio"),
    ])
}

pub fn display_stream_video_only() -> MediaStream {
    MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "screen")])
}

pub fn microphone_stream() -> MediaStream {
    MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "microphone")])
}

// ============================================================================
// Audio graph fake
// ============================================================================

pub struct FakeGraph {
    bins: Arc<Mutex<Vec<u8>>>,
    closes: AtomicUsize,
    last_gains: Mutex<Option<MixGains>>,
    fail_analyser: bool,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self {
            bins: Arc::new(Mutex::new(Vec::new())),
            closes: AtomicUsize::new(0),
            last_gains: Mutex::new(None),
            fail_analyser: false,
        }
    }

    pub fn without_analyser() -> Self {
        let mut graph = Self::new();
        graph.fail_analyser = true;
        graph
    }

    /// Set the frequency bins the analyser reports from now on.
    pub fn set_bins(&self, bins: Vec<u8>) {
        *self.bins.lock().unwrap() = bins;
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_mix_gains(&self) -> Option<MixGains> {
        *self.last_gains.lock().unwrap()
    }
}

struct FakeAnalyser {
    bins: Arc<Mutex<Vec<u8>>>,
}

impl SpectrumAnalyser for FakeAnalyser {
    fn frequency_data(&self) -> Vec<u8> {
        self.bins.lock().unwrap().clone()
    }
}

impl AudioGraph for FakeGraph {
    fn create_analyser(&self, _stream: &MediaStream) -> Result<Box<dyn SpectrumAnalyser>> {
        if self.fail_analyser {
            anyhow::bail!("analyser unavailable");
        }
        Ok(Box::new(FakeAnalyser {
            bins: Arc::clone(&self.bins),
        }))
    }

    fn mix(
        &self,
        microphone: &MediaStream,
        system: &MediaStream,
        gains: MixGains,
    ) -> Result<MediaStream> {
        *self.last_gains.lock().unwrap() = Some(gains);
        let mut tracks = microphone.audio_tracks();
        tracks.extend(system.audio_tracks());
        Ok(MediaStream::new(tracks))
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Media recorder fake
// ============================================================================

/// Factory whose recorders are remote-controlled by the test: after the
/// recorder starts, the test obtains a sender handle and feeds it events.
pub struct FakeRecorderFactory {
    handle: Arc<Mutex<Option<mpsc::Sender<MediaRecorderEvent>>>>,
    supported: Vec<String>,
    fail_create: bool,
    created_mime: Mutex<Option<String>>,
}

impl FakeRecorderFactory {
    pub fn new(supported: Vec<&str>) -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            supported: supported.into_iter().map(String::from).collect(),
            fail_create: false,
            created_mime: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        let mut factory = Self::new(vec!["audio/webm"]);
        factory.fail_create = true;
        factory
    }

    /// Sender for the running recorder's event stream. Panics if no
    /// recorder has started yet.
    pub fn recorder_events(&self) -> mpsc::Sender<MediaRecorderEvent> {
        self.handle
            .lock()
            .unwrap()
            .clone()
            .expect("no recorder running")
    }

    /// Mime type the last created recorder was bound to.
    pub fn created_mime(&self) -> Option<String> {
        self.created_mime.lock().unwrap().clone()
    }
}

impl MediaRecorderFactory for FakeRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn create(&self, _stream: &MediaStream, mime_type: &str) -> Result<Box<dyn MediaRecorder>> {
        if self.fail_create {
            anyhow::bail!("recorder construction failed");
        }
        *self.created_mime.lock().unwrap() = Some(mime_type.to_string());
        Ok(Box::new(FakeRecorder {
            handle: Arc::clone(&self.handle),
        }))
    }
}

struct FakeRecorder {
    handle: Arc<Mutex<Option<mpsc::Sender<MediaRecorderEvent>>>>,
}

#[async_trait::async_trait]
impl MediaRecorder for FakeRecorder {
    async fn start(&mut self, _timeslice: Duration) -> Result<mpsc::Receiver<MediaRecorderEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let _ = tx.try_send(MediaRecorderEvent::Started);
        *self.handle.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.handle.lock().unwrap().take() {
            let _ = tx.try_send(MediaRecorderEvent::Stopped);
        }
        Ok(())
    }
}

pub fn webm_chunk(size: usize) -> MediaRecorderEvent {
    MediaRecorderEvent::Chunk(meetscribe::EncodedChunk {
        data: vec![0xA5; size],
        mime_type: "audio/webm".to_string(),
    })
}

// ============================================================================
// Stub transcription endpoint
// ============================================================================

/// Spin up a loopback HTTP server that answers every POST with a fixed
/// transcript, standing in for the cloud endpoint. Returns the URL to
/// point the client at and a counter of requests received.
pub async fn spawn_stub_transcriber(text: &str) -> (String, Arc<AtomicUsize>) {
    let text = text.to_string();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_handler = Arc::clone(&hits);

    let app = Router::new().route(
        "/transcribe",
        post(move || {
            let text = text.clone();
            let hits = Arc::clone(&hits_handler);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(serde_json::json!({ "text": text }))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub transcriber");
    let addr = listener.local_addr().expect("stub transcriber addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/transcribe", addr), hits)
}

// ============================================================================
// Assembled host media bundle
// ============================================================================

pub struct FakeHost {
    pub devices: Arc<FakeDevices>,
    pub graph: Arc<FakeGraph>,
    pub factory: Arc<FakeRecorderFactory>,
    pub recognizer: Arc<FakeRecognizer>,
}

impl FakeHost {
    pub fn new(recognizer_script: Vec<ScriptedRun>) -> Self {
        Self {
            devices: Arc::new(FakeDevices::new()),
            graph: Arc::new(FakeGraph::new()),
            factory: Arc::new(FakeRecorderFactory::new(vec![
                "audio/webm;codecs=opus",
                "audio/webm",
            ])),
            recognizer: Arc::new(FakeRecognizer::new(recognizer_script)),
        }
    }

    pub fn media(&self) -> HostMedia {
        HostMedia {
            devices: self.devices.clone(),
            graph: self.graph.clone(),
            recorder_factory: self.factory.clone(),
            recognizer: self.recognizer.clone(),
        }
    }
}
