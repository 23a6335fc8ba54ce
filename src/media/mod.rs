//! Host media boundary.
//!
//! The pipeline consumes four capabilities it cannot provide itself: a
//! streaming speech recognizer bound to the default microphone, a
//! display/tab capture primitive that can include system audio, a chunked
//! media-encoding recorder, and a low-level audio graph for level metering
//! and stream mixing. This module defines the traits and value types for
//! those capabilities; the embedder injects implementations, and the
//! crate's tests inject scripted fakes.

mod devices;
mod graph;
mod recognizer;
mod recorder;
mod stream;

pub use devices::{AudioConstraints, MediaDevices, MediaRequestError};
pub use graph::{AudioGraph, MixGains, SpectrumAnalyser};
pub use recognizer::{RecognizedSegment, RecognizerEvent, RecognizerSettings, SpeechRecognizer};
pub use recorder::{EncodedChunk, MediaRecorder, MediaRecorderEvent, MediaRecorderFactory};
pub use stream::{MediaStream, MediaTrack, TrackKind};

use std::sync::Arc;

/// Bundle of host-provided media capabilities handed to the session layer.
#[derive(Clone)]
pub struct HostMedia {
    pub devices: Arc<dyn MediaDevices>,
    pub graph: Arc<dyn AudioGraph>,
    pub recorder_factory: Arc<dyn MediaRecorderFactory>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
}
