//! Typed failure taxonomy for the capture/transcription pipeline.
//!
//! Producer-local transient conditions (no-speech, aborted-while-active,
//! undersized or rate-limited segments) are absorbed where they occur and
//! never appear here. Everything that changes whether a producer is running
//! is one of these types, so the session layer can route it to the UI
//! without tearing down unaffected producers.

use thiserror::Error;

/// System-audio acquisition failures.
///
/// Each variant is distinct so the caller can show source-specific
/// remediation text. None of these are auto-retried: they all require a
/// user action before another attempt can succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The host environment has no display-capture capability.
    #[error("display capture is not supported in this environment")]
    Unsupported,

    /// Capture stream was returned without any audio track: the user did
    /// not check the system-audio-sharing option in the picker.
    #[error("no system audio selected; the audio-sharing option must be checked in the picker")]
    AudioNotSelected,

    /// Permission for display capture was refused.
    #[error("permission denied for display capture")]
    PermissionDenied,

    /// The user dismissed the source picker.
    #[error("capture cancelled by the user")]
    UserCancelled,

    /// No capturable source, or an unclassified acquisition failure.
    #[error("failed to capture system audio: {0}")]
    CaptureFailed(String),
}

/// Error kinds reported by the underlying speech recognition engine.
///
/// Mirrors the engine's error vocabulary; the adapter decides which of
/// these are benign in continuous mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorKind {
    /// Audio was received but no speech was detected. Benign in continuous
    /// mode (system audio without speech is expected).
    NoSpeech,
    /// Recognition was aborted. Benign while an internal restart is in
    /// flight.
    Aborted,
    /// The microphone could not be captured.
    AudioCapture,
    /// Microphone permission denied.
    NotAllowed,
    /// Network failure inside the recognition service.
    Network,
    /// Requested language is not supported.
    LanguageNotSupported,
    /// The recognition service refused the request.
    ServiceNotAllowed,
    /// Anything the engine reports that we do not classify.
    Other(String),
}

impl std::fmt::Display for RecognizerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => write!(f, "no-speech"),
            Self::Aborted => write!(f, "aborted"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::Network => write!(f, "network"),
            Self::LanguageNotSupported => write!(f, "language-not-supported"),
            Self::ServiceNotAllowed => write!(f, "service-not-allowed"),
            Self::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Fatal recognizer-adapter failures. Any of these deactivates the
/// microphone producer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognizerError {
    /// No streaming recognizer exists in the host environment, or the
    /// environment is not a supported browser family.
    #[error("speech recognition is not supported in this environment")]
    Unsupported,

    /// Consecutive restart failures exceeded the retry ceiling.
    #[error("recognizer restart failed {failures} consecutive times")]
    RestartLimitExceeded { failures: u32 },

    /// The engine reported an error kind we do not recover from.
    #[error("recognizer error: {0}")]
    Fatal(RecognizerErrorKind),
}

/// The underlying media recorder raised an error. Not self-recovered; the
/// caller must restart capture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("recorder error: {0}")]
pub struct RecorderError(pub String);

/// Per-segment transcription failures. A failed segment is lost text, not a
/// session failure.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Selected backend is the local service and it is not reachable. Hard
    /// failure by design: no silent fallback to the cloud backend.
    #[error("local transcription service unreachable")]
    BackendUnreachable,

    /// Non-2xx response from the backend.
    #[error("transcription backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response whose body could not be interpreted.
    #[error("malformed transcription response: {0}")]
    MalformedResponse(String),

    /// The backend answered 2xx but reported a failure in the body.
    #[error("transcription service error: {0}")]
    Service(String),

    /// Transport-level failure (includes request timeout).
    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),
}
