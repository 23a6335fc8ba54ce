use thiserror::Error;

use super::stream::MediaStream;

/// Audio processing constraints passed to acquisition calls.
#[derive(Debug, Clone)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: Option<u16>,
}

impl AudioConstraints {
    /// Microphone constraints: voice processing enabled.
    pub fn microphone() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: 44_100,
            channel_count: None,
        }
    }

    /// System-audio constraints: processing disabled so application audio
    /// passes through untouched.
    pub fn system_audio() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            sample_rate: 44_100,
            channel_count: Some(2),
        }
    }
}

/// Rejection reasons for media acquisition, in the host's vocabulary.
/// The capture layer maps these to the user-facing [`crate::CaptureError`]
/// taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaRequestError {
    #[error("permission denied")]
    NotAllowed,
    #[error("picker dismissed by the user")]
    Aborted,
    #[error("no capturable source found")]
    NotFound,
    #[error("capture not supported")]
    NotSupported,
    #[error("media request failed: {0}")]
    Other(String),
}

/// Media acquisition surface of the host.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether display capture exists in this environment at all.
    fn supports_display_capture(&self) -> bool;

    /// Request a microphone stream.
    async fn request_user_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<MediaStream, MediaRequestError>;

    /// Request a screen/window/tab capture stream. Video is always
    /// requested (the host's picker will not appear otherwise), audio per
    /// the constraints. The returned stream may or may not contain an audio
    /// track; callers must check.
    async fn request_display_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<MediaStream, MediaRequestError>;
}
