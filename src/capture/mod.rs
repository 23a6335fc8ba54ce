//! Display/system audio capture
//!
//! Obtains a capture stream scoped to system/tab audio and fails clearly
//! when the user does not opt in to audio sharing. Video is requested only
//! to surface the host's picker; its tracks are stopped the moment the
//! stream is validated.

mod display;

pub use display::SystemAudioCapturer;
