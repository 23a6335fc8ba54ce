use std::sync::Arc;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::media::{
    AudioConstraints, AudioGraph, MediaDevices, MediaRequestError, MediaStream, MixGains,
    SpectrumAnalyser,
};

#[derive(Default)]
struct CaptureInner {
    system: Option<MediaStream>,
    microphone: Option<MediaStream>,
    combined: Option<MediaStream>,
    analyser: Option<Box<dyn SpectrumAnalyser>>,
}

impl CaptureInner {
    fn is_capturing(&self) -> bool {
        self.system.is_some() || self.combined.is_some()
    }
}

/// Acquires system-audio capture streams and meters their level.
///
/// Holds every stream it acquires so `stop_capture` can release all of
/// them, whichever acquisition path produced them.
pub struct SystemAudioCapturer {
    devices: Arc<dyn MediaDevices>,
    graph: Arc<dyn AudioGraph>,
    inner: Mutex<CaptureInner>,
}

impl SystemAudioCapturer {
    pub fn new(devices: Arc<dyn MediaDevices>, graph: Arc<dyn AudioGraph>) -> Self {
        Self {
            devices,
            graph,
            inner: Mutex::new(CaptureInner::default()),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.inner.lock().unwrap().is_capturing()
    }

    /// Request a display capture carrying system audio.
    ///
    /// Video is requested because the host's picker will not appear
    /// without it, but only audio tracks are retained: if the returned
    /// stream has none, the user did not check the audio-sharing option
    /// and the attempt fails with [`CaptureError::AudioNotSelected`].
    pub async fn start_capture(&self) -> Result<MediaStream, CaptureError> {
        let stream = self.acquire_system_stream().await?;

        let audio = stream.audio_only();
        self.attach_analyser(&audio);
        self.inner.lock().unwrap().system = Some(audio.clone());

        info!(
            "system audio capture started ({} audio track(s))",
            audio.tracks().len()
        );
        Ok(audio)
    }

    /// Mix microphone and system audio into one stream through the host
    /// audio graph, system gain attenuated relative to the mic. Supports
    /// binding a single downstream recognizer to one stream; unused when
    /// the sources run as independent producers.
    pub async fn start_combined_capture(
        &self,
        gains: MixGains,
    ) -> Result<MediaStream, CaptureError> {
        let microphone = self
            .devices
            .request_user_media(&AudioConstraints::microphone())
            .await
            .map_err(map_request_error)?;

        let system = match self.acquire_system_stream().await {
            Ok(stream) => stream.audio_only(),
            Err(e) => {
                // The mic was already acquired; do not leak its tracks.
                microphone.stop_all_tracks();
                return Err(e);
            }
        };

        let combined = self
            .graph
            .mix(&microphone, &system, gains)
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        self.attach_analyser(&combined);
        {
            let mut inner = self.inner.lock().unwrap();
            inner.microphone = Some(microphone);
            inner.system = Some(system);
            inner.combined = Some(combined.clone());
        }

        info!("combined mic+system capture started");
        Ok(combined)
    }

    /// Stop every track across any mic/system/combined stream and release
    /// the audio graph. Idempotent; each resource gets its own guarded
    /// release so one failure cannot leak the rest.
    pub fn stop_capture(&self) {
        let taken = {
            let mut inner = self.inner.lock().unwrap();
            (
                inner.microphone.take(),
                inner.system.take(),
                inner.combined.take(),
                inner.analyser.take(),
            )
        };
        let (microphone, system, combined, _analyser) = taken;

        for stream in [microphone, system, combined].into_iter().flatten() {
            stream.stop_all_tracks();
        }

        if let Err(e) = self.graph.close() {
            warn!("failed to close audio graph: {}", e);
        }

        info!("capture stopped, all tracks released");
    }

    /// Normalized [0,1] average magnitude over the current analysis
    /// window. Returns 0 when not capturing.
    pub fn audio_level(&self) -> f32 {
        let inner = self.inner.lock().unwrap();
        let Some(analyser) = inner.analyser.as_ref() else {
            return 0.0;
        };

        let bins = analyser.frequency_data();
        if bins.is_empty() {
            return 0.0;
        }
        let sum: u32 = bins.iter().map(|&b| b as u32).sum();
        (sum as f32 / bins.len() as f32) / 255.0
    }

    async fn acquire_system_stream(&self) -> Result<MediaStream, CaptureError> {
        if !self.devices.supports_display_capture() {
            return Err(CaptureError::Unsupported);
        }

        let stream = self
            .devices
            .request_display_media(&AudioConstraints::system_audio())
            .await
            .map_err(map_request_error)?;

        let video_tracks = stream.video_tracks();

        if stream.audio_tracks().is_empty() {
            for track in &video_tracks {
                track.stop();
            }
            warn!("capture stream arrived without audio tracks");
            return Err(CaptureError::AudioNotSelected);
        }

        // Video exists only to surface the picker; drop it immediately.
        for track in &video_tracks {
            debug!("stopping video track {}", track.id());
            track.stop();
        }

        Ok(stream)
    }

    fn attach_analyser(&self, stream: &MediaStream) {
        match self.graph.create_analyser(stream) {
            Ok(analyser) => self.inner.lock().unwrap().analyser = Some(analyser),
            // A missing meter does not invalidate the capture itself.
            Err(e) => warn!("could not attach level analyser: {}", e),
        }
    }
}

fn map_request_error(err: MediaRequestError) -> CaptureError {
    match err {
        MediaRequestError::NotAllowed => CaptureError::PermissionDenied,
        MediaRequestError::Aborted => CaptureError::UserCancelled,
        MediaRequestError::NotFound => {
            CaptureError::CaptureFailed("no capturable source found".to_string())
        }
        MediaRequestError::NotSupported => CaptureError::Unsupported,
        MediaRequestError::Other(msg) => CaptureError::CaptureFailed(msg),
    }
}
