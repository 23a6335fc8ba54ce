use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A live media track handle.
///
/// Cloneable; all clones share liveness state. `stop()` is idempotent and a
/// stopped track never becomes live again, which is what lets tests assert
/// that teardown leaked nothing.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

#[derive(Debug)]
struct TrackInner {
    id: String,
    label: String,
    kind: TrackKind,
    ended: AtomicBool,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: uuid::Uuid::new_v4().to_string(),
                label: label.into(),
                kind,
                ended: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    /// Whether the track is still delivering media.
    pub fn is_live(&self) -> bool {
        !self.inner.ended.load(Ordering::SeqCst)
    }

    /// Stop the track. Safe to call more than once.
    pub fn stop(&self) {
        self.inner.ended.store(true, Ordering::SeqCst);
    }
}

/// A set of media tracks returned by an acquisition call.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<MediaTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    /// A new stream handle holding only this stream's audio tracks.
    pub fn audio_only(&self) -> MediaStream {
        MediaStream::new(self.audio_tracks())
    }

    /// Stop every track in the stream.
    pub fn stop_all_tracks(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
