use anyhow::Result;
use tokio::sync::mpsc;

use crate::error::RecognizerErrorKind;

/// Settings applied to the recognizer engine on each start.
#[derive(Debug, Clone)]
pub struct RecognizerSettings {
    /// Keep recognizing indefinitely instead of stopping after one phrase.
    pub continuous: bool,
    /// Emit provisional (still-revisable) results.
    pub interim_results: bool,
    /// Recognition language tag, e.g. "es-ES".
    pub language: String,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: "es-ES".to_string(),
        }
    }
}

/// One recognized segment from a result event.
#[derive(Debug, Clone)]
pub struct RecognizedSegment {
    pub text: String,
    /// Finalized text will not be revised further; interim text is for
    /// live display only.
    pub is_final: bool,
    /// Engine confidence in [0,1], when the engine reports one.
    pub confidence: Option<f32>,
}

/// Normalized event stream from the recognition engine.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// The engine has begun listening.
    Started,
    /// A batch of recognized segments, final and interim mixed.
    Result(Vec<RecognizedSegment>),
    /// The engine reported an error. The engine may or may not also emit
    /// `Ended` afterwards; the adapter tolerates both.
    Error(RecognizerErrorKind),
    /// The engine terminated. In continuous mode this happens
    /// spontaneously after any pause and is not itself an error.
    Ended,
}

/// Streaming speech-to-text engine bound to the default microphone.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether a recognizer exists in this environment and the environment
    /// is a supported browser family.
    fn is_supported(&self) -> bool;

    /// Begin a recognition run. Each call produces a fresh event stream;
    /// the engine will eventually emit `Ended` on that stream. An `Err`
    /// here is a start/restart failure, counted by the adapter against its
    /// retry ceiling.
    async fn start(&self, settings: &RecognizerSettings) -> Result<mpsc::Receiver<RecognizerEvent>>;

    /// Request the current run halt. Idempotent; a no-op when not running.
    async fn stop(&self);
}
