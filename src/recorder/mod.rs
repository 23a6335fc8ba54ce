//! Segmenting recorder
//!
//! Turns a live audio stream into discrete, independently transcribable
//! segments. Encoded chunk boundaries do not align with speech boundaries,
//! so chunks are accumulated and flushed either when enough of them pile up
//! or on a wall-clock cadence that bounds transcription latency even under
//! sparse audio.

mod pipeline;
mod segment;

pub use pipeline::{SegmentingRecorder, SegmentingRecorderConfig};
pub use segment::{AudioSegment, SegmentBuffer};
