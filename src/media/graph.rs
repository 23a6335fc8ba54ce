use anyhow::Result;

use super::stream::MediaStream;

/// Gain applied to each input of the two-source mix.
///
/// System audio is attenuated relative to the microphone so the user's own
/// voice stays dominant in the combined stream.
#[derive(Debug, Clone, Copy)]
pub struct MixGains {
    pub microphone: f32,
    pub system: f32,
}

impl Default for MixGains {
    fn default() -> Self {
        Self {
            microphone: 1.0,
            system: 0.8,
        }
    }
}

/// Frequency-domain tap on a live stream, used for level metering.
pub trait SpectrumAnalyser: Send + Sync {
    /// Current byte-valued frequency bins (0..=255 per bin). Empty when no
    /// data has been analysed yet.
    fn frequency_data(&self) -> Vec<u8>;
}

/// Host audio-processing graph: level metering and optional stream mixing.
pub trait AudioGraph: Send + Sync {
    /// Attach an analyser to a stream.
    fn create_analyser(&self, stream: &MediaStream) -> Result<Box<dyn SpectrumAnalyser>>;

    /// Mix microphone and system streams into a single output stream
    /// through a two-input gain graph. Exists to support binding one
    /// downstream recognizer to one stream; the primary design keeps the
    /// sources as independent producers and never calls this.
    fn mix(
        &self,
        microphone: &MediaStream,
        system: &MediaStream,
        gains: MixGains,
    ) -> Result<MediaStream>;

    /// Release every node the graph acquired. Idempotent.
    fn close(&self) -> Result<()>;
}
