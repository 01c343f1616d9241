//! Synthetic capture device.

use crate::errors::CaptureError;
use crate::media::{
    CaptureConstraints, MediaCapture, MediaStream, MediaTrack, TrackKind, TrackSettings,
};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Capture device that grants every request immediately with tracks whose
/// settings equal the requested ideals.
#[derive(Debug, Default)]
pub struct SyntheticCapture {
    issued: Mutex<Vec<MediaStream>>,
}

impl SyntheticCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of issued streams that still have a live track.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.is_active())
            .count()
    }
}

#[async_trait::async_trait]
impl MediaCapture for SyntheticCapture {
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        let mut tracks = Vec::with_capacity(2);
        if constraints.audio {
            tracks.push(MediaTrack::new(
                TrackKind::Audio,
                "Synthetic Microphone",
                TrackSettings::default(),
            ));
        }
        tracks.push(MediaTrack::new(
            TrackKind::Video,
            "Synthetic Camera",
            TrackSettings {
                width: Some(constraints.video.width),
                height: Some(constraints.video.height),
                frame_rate: Some(constraints.video.frame_rate),
                facing_mode: Some(constraints.video.facing_mode),
            },
        ));

        let stream = MediaStream::new(tracks);
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        issued.retain(MediaStream::is_active);
        issued.push(stream.clone());

        debug!(
            target: "call.loopback",
            stream_id = %stream.id(),
            width = constraints.video.width,
            height = constraints.video.height,
            "Synthetic stream granted"
        );
        Ok(stream)
    }
}
