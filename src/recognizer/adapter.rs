use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{RecognizerError, RecognizerErrorKind};
use crate::media::{RecognizerEvent, RecognizerSettings, SpeechRecognizer};
use crate::session::{ProducerEvent, TranscriptSource};

/// Adapter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Not listening; auto-restart suppressed.
    Inactive,
    /// Engine run in progress.
    Active,
    /// Between engine runs, waiting out the restart delay.
    Restarting,
}

impl AdapterState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Active,
            2 => Self::Restarting,
            _ => Self::Inactive,
        }
    }
}

/// Tuning for the adapter's recovery behavior.
#[derive(Debug, Clone)]
pub struct RecognizerAdapterConfig {
    pub settings: RecognizerSettings,
    /// Delay before restarting after the engine self-terminates.
    pub restart_delay: Duration,
    /// Consecutive restart failures tolerated before giving up.
    pub max_restart_failures: u32,
    /// Force a stop/restart cycle after this long without finalized text
    /// (continuous mode only). Recovers engines that silently wedge.
    pub silence_timeout: Duration,
    /// How long a no-speech advisory stays visible before self-clearing.
    pub advisory_clear_after: Duration,
}

impl Default for RecognizerAdapterConfig {
    fn default() -> Self {
        Self {
            settings: RecognizerSettings::default(),
            restart_delay: Duration::from_millis(500),
            max_restart_failures: 3,
            silence_timeout: Duration::from_secs(30),
            advisory_clear_after: Duration::from_secs(3),
        }
    }
}

/// Why one engine run ended, decided by the event pump.
enum RunOutcome {
    /// Engine terminated on its own (or the event stream closed).
    Ended,
    /// No finalized text within the silence timeout.
    SilenceTimeout,
    /// Unrecoverable engine error.
    Fatal(RecognizerErrorKind),
}

/// Maintains a live binding to the streaming speech recognizer, normalizes
/// its event stream into tagged producer events, and keeps it running
/// despite the engine's tendency to self-terminate after any pause.
pub struct RecognizerAdapter {
    engine: Arc<dyn SpeechRecognizer>,
    config: RecognizerAdapterConfig,
    events: mpsc::Sender<ProducerEvent>,

    /// Logical activity: cleared by `stop()` to suppress auto-restart.
    active: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    /// Running accumulator of all finalized text this session.
    transcript: Arc<StdMutex<String>>,
    /// Monotonic id pairing each advisory with its own clear timer. Never
    /// reset, so a stale timer from an earlier run cannot collide.
    advisory_seq: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RecognizerAdapter {
    pub fn new(
        engine: Arc<dyn SpeechRecognizer>,
        config: RecognizerAdapterConfig,
        events: mpsc::Sender<ProducerEvent>,
    ) -> Self {
        Self {
            engine,
            config,
            events,
            active: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(AdapterState::Inactive as u8)),
            transcript: Arc::new(StdMutex::new(String::new())),
            advisory_seq: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Full finalized transcript accumulated since the last start.
    pub fn transcript(&self) -> String {
        self.transcript.lock().unwrap().clone()
    }

    /// Begin listening. No-op if already running. Fails with
    /// [`RecognizerError::Unsupported`] when the host has no recognizer.
    pub async fn start(&self) -> Result<(), RecognizerError> {
        if !self.engine.is_supported() {
            return Err(RecognizerError::Unsupported);
        }
        if self.active.swap(true, Ordering::SeqCst) {
            debug!("recognizer adapter already running");
            return Ok(());
        }

        self.transcript.lock().unwrap().clear();

        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let events = self.events.clone();
        let active = Arc::clone(&self.active);
        let state = Arc::clone(&self.state);
        let transcript = Arc::clone(&self.transcript);
        let advisory_seq = Arc::clone(&self.advisory_seq);

        let handle = tokio::spawn(async move {
            run_loop(engine, config, events.clone(), active, state, transcript, advisory_seq).await;
            let _ = events.send(ProducerEvent::Stopped(TranscriptSource::Microphone)).await;
        });

        *self.task.lock().await = Some(handle);
        info!("recognizer adapter started");
        Ok(())
    }

    /// Mark the adapter inactive (suppressing auto-restart), request the
    /// engine halt, and wait for the run loop to wind down. Idempotent.
    pub async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.engine.stop().await;

        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("recognizer task panicked: {}", e);
            }
        }
        self.state.store(AdapterState::Inactive as u8, Ordering::SeqCst);
        info!("recognizer adapter stopped");
    }
}

async fn run_loop(
    engine: Arc<dyn SpeechRecognizer>,
    config: RecognizerAdapterConfig,
    events: mpsc::Sender<ProducerEvent>,
    active: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    transcript: Arc<StdMutex<String>>,
    advisory_seq: Arc<AtomicU64>,
) {
    let mut restart_failures: u32 = 0;

    while active.load(Ordering::SeqCst) {
        let mut rx = match engine.start(&config.settings).await {
            Ok(rx) => rx,
            Err(err) => {
                restart_failures += 1;
                warn!(
                    "recognizer start failed ({}/{}): {}",
                    restart_failures, config.max_restart_failures, err
                );
                if restart_failures >= config.max_restart_failures {
                    fail(
                        &events,
                        &active,
                        RecognizerError::RestartLimitExceeded {
                            failures: restart_failures,
                        },
                    )
                    .await;
                    break;
                }
                state.store(AdapterState::Restarting as u8, Ordering::SeqCst);
                tokio::time::sleep(config.restart_delay).await;
                continue;
            }
        };

        state.store(AdapterState::Active as u8, Ordering::SeqCst);

        let outcome = pump_run(
            &mut rx,
            &config,
            &events,
            &active,
            &transcript,
            &advisory_seq,
            &mut restart_failures,
        )
        .await;

        match outcome {
            RunOutcome::Ended => {
                if active.load(Ordering::SeqCst) && config.settings.continuous {
                    debug!("recognizer ended; restarting in {:?}", config.restart_delay);
                    state.store(AdapterState::Restarting as u8, Ordering::SeqCst);
                    tokio::time::sleep(config.restart_delay).await;
                } else {
                    break;
                }
            }
            RunOutcome::SilenceTimeout => {
                warn!(
                    "no finalized text in {:?}; forcing recognizer restart",
                    config.silence_timeout
                );
                engine.stop().await;
                state.store(AdapterState::Restarting as u8, Ordering::SeqCst);
                tokio::time::sleep(config.restart_delay).await;
            }
            RunOutcome::Fatal(kind) => {
                engine.stop().await;
                fail(&events, &active, RecognizerError::Fatal(kind)).await;
                break;
            }
        }
    }

    active.store(false, Ordering::SeqCst);
    state.store(AdapterState::Inactive as u8, Ordering::SeqCst);
}

/// Pump one engine run until it terminates, classifying errors as the
/// adapter's contract requires.
async fn pump_run(
    rx: &mut mpsc::Receiver<RecognizerEvent>,
    config: &RecognizerAdapterConfig,
    events: &mpsc::Sender<ProducerEvent>,
    active: &Arc<AtomicBool>,
    transcript: &Arc<StdMutex<String>>,
    advisory_seq: &AtomicU64,
    restart_failures: &mut u32,
) -> RunOutcome {
    let mut silence_deadline = Instant::now() + config.silence_timeout;

    loop {
        let silence = tokio::time::sleep_until(silence_deadline);

        tokio::select! {
            event = rx.recv() => match event {
                None | Some(RecognizerEvent::Ended) => return RunOutcome::Ended,

                Some(RecognizerEvent::Started) => {
                    // A clean start clears the consecutive-failure count.
                    *restart_failures = 0;
                    let _ = events
                        .send(ProducerEvent::Started(TranscriptSource::Microphone))
                        .await;
                }

                Some(RecognizerEvent::Result(segments)) => {
                    let mut final_text = String::new();
                    let mut interim_text = String::new();
                    let mut confidence: Option<f32> = None;

                    for segment in segments {
                        if segment.is_final {
                            final_text.push_str(&segment.text);
                            confidence = match (confidence, segment.confidence) {
                                (Some(a), Some(b)) => Some(a.max(b)),
                                (a, b) => a.or(b),
                            };
                        } else {
                            interim_text.push_str(&segment.text);
                        }
                    }

                    if !final_text.trim().is_empty() {
                        {
                            let mut full = transcript.lock().unwrap();
                            full.push_str(&final_text);
                            full.push(' ');
                        }
                        let _ = events
                            .send(ProducerEvent::Final {
                                source: TranscriptSource::Microphone,
                                text: final_text,
                                confidence,
                            })
                            .await;
                        silence_deadline = Instant::now() + config.silence_timeout;
                    }

                    if !interim_text.is_empty() {
                        let _ = events
                            .send(ProducerEvent::Interim {
                                source: TranscriptSource::Microphone,
                                text: interim_text,
                            })
                            .await;
                    }
                }

                Some(RecognizerEvent::Error(kind)) => match kind {
                    RecognizerErrorKind::NoSpeech if config.settings.continuous => {
                        // Expected whenever system audio without speech is
                        // playing: advisory only, never counted against the
                        // retry ceiling.
                        debug!("no-speech in continuous mode; advisory only");
                        let seq = advisory_seq.fetch_add(1, Ordering::SeqCst) + 1;
                        let _ = events
                            .send(ProducerEvent::Advisory {
                                source: TranscriptSource::Microphone,
                                message: "Detecting audio but no clear speech yet".to_string(),
                                seq,
                            })
                            .await;
                        spawn_advisory_clear(
                            events.clone(),
                            active.clone(),
                            config.advisory_clear_after,
                            seq,
                        );
                    }
                    RecognizerErrorKind::NoSpeech => {
                        *restart_failures += 1;
                        if *restart_failures >= config.max_restart_failures {
                            return RunOutcome::Fatal(RecognizerErrorKind::NoSpeech);
                        }
                    }
                    RecognizerErrorKind::Aborted => {
                        // While logically active this implies an internal
                        // restart is in flight; otherwise there is nothing
                        // to do either way.
                        debug!("recognizer aborted (active: {})", active.load(Ordering::SeqCst));
                    }
                    other => return RunOutcome::Fatal(other),
                },
            },

            _ = silence, if config.settings.continuous => {
                return RunOutcome::SilenceTimeout;
            }
        }
    }
}

async fn fail(
    events: &mpsc::Sender<ProducerEvent>,
    active: &Arc<AtomicBool>,
    error: RecognizerError,
) {
    active.store(false, Ordering::SeqCst);
    let _ = events
        .send(ProducerEvent::Error {
            source: TranscriptSource::Microphone,
            message: error.to_string(),
            fatal: true,
        })
        .await;
}

fn spawn_advisory_clear(
    events: mpsc::Sender<ProducerEvent>,
    active: Arc<AtomicBool>,
    after: Duration,
    seq: u64,
) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if active.load(Ordering::SeqCst) {
            let _ = events
                .send(ProducerEvent::AdvisoryCleared {
                    source: TranscriptSource::Microphone,
                    seq,
                })
                .await;
        }
    });
}
