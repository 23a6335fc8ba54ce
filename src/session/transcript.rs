use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Which producer a transcript entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    /// Streaming speech recognition on the microphone.
    Microphone,
    /// System audio captured via display share and transcribed in segments.
    System,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Microphone => write!(f, "microphone"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One finalized piece of transcript. Immutable once created; removed only
/// by an explicit session reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: uuid::Uuid,

    /// Non-empty, trimmed text.
    pub text: String,

    pub source: TranscriptSource,

    /// Capture-time timestamp. Monotonic per source; sources interleave.
    pub timestamp: DateTime<Utc>,

    /// Recognizer confidence in [0,1]; present only on microphone entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TranscriptEntry {
    /// Build an entry from finalized producer text. Returns `None` when the
    /// trimmed text is empty: silence never enters the transcript.
    pub fn from_final_text(
        source: TranscriptSource,
        text: &str,
        confidence: Option<f32>,
    ) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4(),
            text: text.to_string(),
            source,
            timestamp: Utc::now(),
            // Confidence only carries meaning for the streaming recognizer.
            confidence: match source {
                TranscriptSource::Microphone => confidence,
                TranscriptSource::System => None,
            },
        })
    }
}

/// Append-only transcript log owned by the session layer.
///
/// Entries are appended in arrival order; the read side always presents
/// them timestamp-sorted because the producers run on independent cadences
/// and can report out of order. All reads are copy-out, so producers never
/// hand the UI a mutable reference.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: TranscriptEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Snapshot of all entries, sorted by timestamp.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        let mut entries = self.entries.lock().unwrap().clone();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Drop every entry. Only the session's explicit reset calls this.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_rejects_empty_text() {
        assert!(TranscriptEntry::from_final_text(TranscriptSource::Microphone, "   ", None).is_none());
        assert!(TranscriptEntry::from_final_text(TranscriptSource::System, "", None).is_none());
    }

    #[test]
    fn test_entry_trims_text() {
        let entry =
            TranscriptEntry::from_final_text(TranscriptSource::Microphone, " hola mundo ", Some(0.9))
                .unwrap();
        assert_eq!(entry.text, "hola mundo");
        assert_eq!(entry.confidence, Some(0.9));
    }

    #[test]
    fn test_system_entries_carry_no_confidence() {
        let entry =
            TranscriptEntry::from_final_text(TranscriptSource::System, "texto", Some(0.5)).unwrap();
        assert_eq!(entry.confidence, None);
    }

    #[test]
    fn test_log_reads_sorted_by_timestamp() {
        let log = TranscriptLog::new();

        let mut first =
            TranscriptEntry::from_final_text(TranscriptSource::System, "segundo", None).unwrap();
        let mut second =
            TranscriptEntry::from_final_text(TranscriptSource::Microphone, "primero", None).unwrap();

        // Force out-of-order arrival: the later timestamp is appended first.
        first.timestamp = Utc::now() + chrono::Duration::seconds(5);
        second.timestamp = Utc::now();
        log.append(first);
        log.append(second);

        let entries = log.entries();
        assert_eq!(entries[0].text, "primero");
        assert_eq!(entries[1].text, "segundo");
    }
}
