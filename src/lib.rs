pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod recognizer;
pub mod recorder;
pub mod session;
pub mod transcribe;

pub use capture::SystemAudioCapturer;
pub use config::Config;
pub use error::{
    CaptureError, RecognizerError, RecognizerErrorKind, RecorderError, TranscriptionError,
};
pub use http::{create_router, AppState};
pub use media::{
    AudioConstraints, AudioGraph, EncodedChunk, HostMedia, MediaDevices, MediaRecorder,
    MediaRecorderEvent, MediaRecorderFactory, MediaRequestError, MediaStream, MediaTrack,
    MixGains, RecognizedSegment, RecognizerEvent, RecognizerSettings, SpectrumAnalyser,
    SpeechRecognizer, TrackKind,
};
pub use recognizer::{RecognizerAdapter, RecognizerAdapterConfig};
pub use recorder::{AudioSegment, SegmentingRecorder, SegmentingRecorderConfig};
pub use session::{
    ProducerEvent, SessionConfig, SessionCoordinator, SessionState, SessionStatus,
    SourceSelection, TranscriptEntry, TranscriptLog, TranscriptSource,
};
pub use transcribe::{TranscriptionBackend, TranscriptionClient, TranscriptionConfig};
