//! Transcription client
//!
//! Converts one audio segment into text via exactly one backend: the
//! hosted cloud API or a locally running GPU service. Enforces request
//! pacing (one in-flight request, minimum inter-request interval, excess
//! segments dropped rather than queued) and filters segments too small to
//! contain useful audio.

mod client;
mod limiter;

pub use client::{TranscriptionBackend, TranscriptionClient, TranscriptionConfig};
pub use limiter::{RequestLimiter, RequestPermit};
