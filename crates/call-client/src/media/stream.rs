//! Media stream and track handles.
//!
//! A [`MediaStream`] is a cheap, cloneable handle. Clones share the same tracks,
//! so toggling or stopping a track through one clone is visible through every
//! other clone, including the copy a remote peer received.

use super::profile::FacingMode;
use common::types::{StreamId, TrackId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Whether a track still produces media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

/// Settings the capture device actually applied. Video only; audio tracks
/// report the default (all `None`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub facing_mode: Option<FacingMode>,
}

#[derive(Debug)]
struct TrackInner {
    id: TrackId,
    kind: TrackKind,
    label: String,
    settings: TrackSettings,
    enabled: AtomicBool,
    live: AtomicBool,
}

/// Handle to one audio or video track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create a live, enabled track.
    pub fn new(kind: TrackKind, label: impl Into<String>, settings: TrackSettings) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: TrackId::new(),
                kind,
                label: label.into(),
                settings,
                enabled: AtomicBool::new(true),
                live: AtomicBool::new(true),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> TrackId {
        self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    #[must_use]
    pub fn settings(&self) -> TrackSettings {
        self.inner.settings
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the track. A disabled track stays live but sends
    /// silence or black frames.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stop the track and release the underlying device. Irreversible.
    pub fn stop(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn ready_state(&self) -> TrackState {
        if self.inner.live.load(Ordering::SeqCst) {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }
}

#[derive(Debug)]
struct StreamInner {
    id: StreamId,
    tracks: Vec<MediaTrack>,
}

/// Handle to a set of tracks captured or received together.
#[derive(Debug, Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: StreamId::new(),
                tracks,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    #[must_use]
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.inner.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    /// First track of the given kind, if any.
    #[must_use]
    pub fn first_track(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks_of(kind).next()
    }

    /// Stop every track.
    pub fn stop_all(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }

    /// Whether any track is still live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.tracks()
            .iter()
            .any(|t| t.ready_state() == TrackState::Live)
    }

    /// Whether both handles refer to the same underlying stream.
    #[must_use]
    pub fn same_stream(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.inner.tracks.iter().filter(move |t| t.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_stream() -> MediaStream {
        MediaStream::new(vec![
            MediaTrack::new(TrackKind::Audio, "mic", TrackSettings::default()),
            MediaTrack::new(
                TrackKind::Video,
                "cam",
                TrackSettings {
                    width: Some(640),
                    height: Some(480),
                    frame_rate: Some(30),
                    facing_mode: Some(FacingMode::User),
                },
            ),
        ])
    }

    #[test]
    fn test_track_lookup_by_kind() {
        let stream = camera_stream();
        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(
            stream.first_track(TrackKind::Video).map(MediaTrack::label),
            Some("cam")
        );
    }

    #[test]
    fn test_clones_share_track_state() {
        let stream = camera_stream();
        let remote_view = stream.clone();

        if let Some(track) = stream.first_track(TrackKind::Audio) {
            track.set_enabled(false);
        }

        assert!(remote_view.same_stream(&stream));
        assert_eq!(remote_view.id(), stream.id());
        assert_eq!(
            remote_view.first_track(TrackKind::Audio).map(MediaTrack::enabled),
            Some(false)
        );
    }

    #[test]
    fn test_stop_all_ends_every_track() {
        let stream = camera_stream();
        assert!(stream.is_active());

        stream.stop_all();

        assert!(!stream.is_active());
        assert!(stream
            .tracks()
            .iter()
            .all(|t| t.ready_state() == TrackState::Ended));
    }

    #[test]
    fn test_distinct_streams_are_not_same() {
        assert!(!camera_stream().same_stream(&camera_stream()));
    }
}
