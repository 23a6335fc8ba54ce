use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use super::stream::MediaStream;

/// One encoded media fragment emitted by the recorder.
///
/// Fragment boundaries are container boundaries, not speech boundaries;
/// fragments from one recorder run concatenate into a valid stream.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Events from a running media recorder.
#[derive(Debug, Clone)]
pub enum MediaRecorderEvent {
    Started,
    Chunk(EncodedChunk),
    Stopped,
    Error(String),
}

/// Creates recorders and answers encoding capability probes.
pub trait MediaRecorderFactory: Send + Sync {
    /// Whether the host can encode the given mime type.
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Create a recorder bound to a stream and mime type. Fails if the
    /// stream has no live audio track.
    fn create(&self, stream: &MediaStream, mime_type: &str) -> Result<Box<dyn MediaRecorder>>;
}

/// Chunked media-encoding recorder bound to one stream.
#[async_trait::async_trait]
pub trait MediaRecorder: Send + Sync {
    /// Start recording, emitting one encoded chunk per `timeslice`.
    async fn start(&mut self, timeslice: Duration) -> Result<mpsc::Receiver<MediaRecorderEvent>>;

    /// Stop recording. The recorder emits any buffered chunk followed by
    /// `Stopped` on the event stream before it closes.
    async fn stop(&mut self) -> Result<()>;
}
