use super::transcript::TranscriptSource;

/// Events flowing from the producers (recognizer adapter, segmenting
/// recorder pipeline) into the session coordinator. One channel carries
/// both sources; every event is tagged.
#[derive(Debug, Clone)]
pub enum ProducerEvent {
    /// The producer has begun delivering audio/text.
    Started(TranscriptSource),

    /// Finalized text, safe to commit to the permanent transcript.
    Final {
        source: TranscriptSource,
        text: String,
        confidence: Option<f32>,
    },

    /// Provisional text for live display only; never merged into the log.
    Interim {
        source: TranscriptSource,
        text: String,
    },

    /// A transient, self-clearing advisory (e.g. no-speech while system
    /// audio plays). Not an error. `seq` pairs the advisory with its own
    /// clear event, so an earlier advisory's timer cannot wipe a newer one.
    Advisory {
        source: TranscriptSource,
        message: String,
        seq: u64,
    },

    /// Clears the advisory raised with the same `seq`. Ignored when a newer
    /// advisory has replaced it.
    AdvisoryCleared { source: TranscriptSource, seq: u64 },

    /// Something went wrong. `fatal` means the producer has deactivated
    /// itself (a `Stopped` event follows); non-fatal errors are lost-text
    /// conditions that leave the producer running.
    Error {
        source: TranscriptSource,
        message: String,
        fatal: bool,
    },

    /// The producer has fully halted and released its resources.
    Stopped(TranscriptSource),
}

impl ProducerEvent {
    pub fn source(&self) -> TranscriptSource {
        match self {
            Self::Started(source)
            | Self::AdvisoryCleared { source, .. }
            | Self::Stopped(source) => *source,
            Self::Final { source, .. }
            | Self::Interim { source, .. }
            | Self::Advisory { source, .. }
            | Self::Error { source, .. } => *source,
        }
    }
}
