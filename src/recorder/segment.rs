use crate::media::EncodedChunk;

/// A complete encoded audio segment ready for transcription.
///
/// Transient: it exists between a buffer flush and the transcription call,
/// and is never requeued. A failed segment is dropped, not retried, so the
/// pipeline cannot grow without bound.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub chunk_count: usize,
}

impl AudioSegment {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Owned accumulator for encoded chunks.
///
/// `take()` atomically hands off the accumulated segment and clears the
/// buffer, so there is no window where a flushed segment could be flushed
/// again.
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    chunks: Vec<Vec<u8>>,
    mime_type: Option<String>,
    total_bytes: usize,
}

impl SegmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: EncodedChunk) {
        if chunk.is_empty() {
            return;
        }
        if self.mime_type.is_none() {
            self.mime_type = Some(chunk.mime_type.clone());
        }
        self.total_bytes += chunk.data.len();
        self.chunks.push(chunk.data);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate everything accumulated into one segment and clear the
    /// buffer. Returns `None` when nothing was accumulated, making an
    /// empty flush a no-op.
    pub fn take(&mut self) -> Option<AudioSegment> {
        if self.chunks.is_empty() {
            return None;
        }

        let chunk_count = self.chunks.len();
        let mut bytes = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks.drain(..) {
            bytes.extend_from_slice(&chunk);
        }
        self.total_bytes = 0;
        let mime_type = self.mime_type.take().unwrap_or_else(|| "audio/webm".to_string());

        Some(AudioSegment {
            bytes,
            mime_type,
            chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &[u8]) -> EncodedChunk {
        EncodedChunk {
            data: data.to_vec(),
            mime_type: "audio/webm".to_string(),
        }
    }

    #[test]
    fn test_take_concatenates_in_order() {
        let mut buffer = SegmentBuffer::new();
        buffer.push(chunk(&[1, 2]));
        buffer.push(chunk(&[3]));

        let segment = buffer.take().unwrap();
        assert_eq!(segment.bytes, vec![1, 2, 3]);
        assert_eq!(segment.chunk_count, 2);
        assert_eq!(segment.mime_type, "audio/webm");
    }

    #[test]
    fn test_take_clears_the_buffer() {
        let mut buffer = SegmentBuffer::new();
        buffer.push(chunk(&[1, 2, 3]));

        assert!(buffer.take().is_some());
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_bytes(), 0);
        assert!(buffer.take().is_none(), "second take must be a no-op");
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let mut buffer = SegmentBuffer::new();
        buffer.push(chunk(&[]));

        assert!(buffer.is_empty());
        assert!(buffer.take().is_none());
    }
}
