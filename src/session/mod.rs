//! Session coordination and transcript merging
//!
//! The single source of truth for "is the session recording". Owns the
//! producers implied by the source selection (recognizer adapter for the
//! microphone, capturer + segmenting recorder for system audio), merges
//! their finalized text into one ordered transcript, and exposes the
//! unified start/stop/reset surface the UI layer drives.

mod coordinator;
mod events;
mod transcript;

pub use coordinator::{
    SessionConfig, SessionCoordinator, SessionState, SessionStatus, SourceSelection,
};
pub use events::ProducerEvent;
pub use transcript::{TranscriptEntry, TranscriptLog, TranscriptSource};
