//! `DeviceStreamManager` - exclusive owner of the local camera/microphone stream.
//!
//! # Ownership
//!
//! At most one local stream is held at a time. Every acquisition stops the
//! held stream first so two device handles never coexist, and the manager
//! stops whatever it holds when it is dropped.
//!
//! # Quality changes
//!
//! [`DeviceStreamManager::change_quality`] is a full stop-then-restart of the
//! capture. Local capture is briefly interrupted while the new stream is
//! requested; tracks are never renegotiated in place.

use super::capture::MediaCapture;
use super::profile::{MediaQualityProfile, DEFAULT_PROFILE};
use super::stream::{MediaStream, TrackKind};
use crate::errors::CaptureError;
use crate::observability::metrics;

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Snapshot of the local media owned by a [`DeviceStreamManager`].
#[derive(Debug, Clone)]
pub struct LocalStreamState {
    stream: Option<MediaStream>,
    last_error: Option<CaptureError>,
    audio_enabled: bool,
    video_enabled: bool,
    active_profile: MediaQualityProfile,
}

impl LocalStreamState {
    fn new(active_profile: MediaQualityProfile) -> Self {
        Self {
            stream: None,
            last_error: None,
            audio_enabled: true,
            video_enabled: true,
            active_profile,
        }
    }

    #[must_use]
    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    #[must_use]
    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    #[must_use]
    pub fn active_profile(&self) -> MediaQualityProfile {
        self.active_profile
    }
}

/// Acquires, toggles and releases the local stream.
pub struct DeviceStreamManager {
    capture: Arc<dyn MediaCapture>,
    default_profile: MediaQualityProfile,
    state: LocalStreamState,
}

impl DeviceStreamManager {
    /// Create a manager that defaults to [`DEFAULT_PROFILE`].
    pub fn new(capture: Arc<dyn MediaCapture>) -> Self {
        Self::with_default_profile(capture, DEFAULT_PROFILE)
    }

    /// Create a manager with an explicit default profile.
    pub fn with_default_profile(
        capture: Arc<dyn MediaCapture>,
        default_profile: MediaQualityProfile,
    ) -> Self {
        Self {
            capture,
            default_profile,
            state: LocalStreamState::new(default_profile),
        }
    }

    #[must_use]
    pub fn state(&self) -> &LocalStreamState {
        &self.state
    }

    #[must_use]
    pub fn stream(&self) -> Option<&MediaStream> {
        self.state.stream.as_ref()
    }

    #[must_use]
    pub fn default_profile(&self) -> MediaQualityProfile {
        self.default_profile
    }

    /// Acquire a stream at the default profile.
    pub async fn acquire_default(&mut self) -> Option<MediaStream> {
        self.acquire(self.default_profile).await
    }

    /// Acquire a camera+microphone stream at `profile`.
    ///
    /// Any held stream is stopped before the request is made. On success the
    /// enabled flags follow the new tracks and the error is cleared. On failure
    /// only `last_error` changes and `None` is returned.
    #[instrument(skip_all, name = "call.media.acquire", fields(profile = profile.label))]
    pub async fn acquire(&mut self, profile: MediaQualityProfile) -> Option<MediaStream> {
        self.stop_held_stream();

        let constraints = profile.constraints();
        match self.capture.get_user_media(&constraints).await {
            Ok(stream) => {
                self.state.audio_enabled = stream
                    .first_track(TrackKind::Audio)
                    .is_some_and(|t| t.enabled());
                self.state.video_enabled = stream
                    .first_track(TrackKind::Video)
                    .is_some_and(|t| t.enabled());
                self.state.active_profile = profile;
                self.state.last_error = None;
                self.state.stream = Some(stream.clone());

                metrics::record_media_acquisition("success");
                info!(
                    target: "call.media",
                    stream_id = %stream.id(),
                    profile = profile.label,
                    tracks = stream.tracks().len(),
                    "Local stream acquired"
                );
                Some(stream)
            }
            Err(e) => {
                metrics::record_media_acquisition("error");
                warn!(
                    target: "call.media",
                    profile = profile.label,
                    error = %e,
                    "Local stream acquisition failed"
                );
                self.state.last_error = Some(e);
                None
            }
        }
    }

    /// Switch to another quality profile by re-acquiring the stream.
    ///
    /// This is a stop-then-restart: capture is interrupted until the new
    /// stream is granted, and a failure leaves no stream held.
    pub async fn change_quality(&mut self, profile: MediaQualityProfile) -> Option<MediaStream> {
        debug!(
            target: "call.media",
            from = self.state.active_profile.label,
            to = profile.label,
            "Changing capture quality"
        );
        self.acquire(profile).await
    }

    /// Flip the first audio track. Returns the resulting flag.
    pub fn toggle_audio(&mut self) -> bool {
        if let Some(enabled) = self.toggle_first(TrackKind::Audio) {
            self.state.audio_enabled = enabled;
        }
        self.state.audio_enabled
    }

    /// Flip the first video track. Returns the resulting flag.
    pub fn toggle_video(&mut self) -> bool {
        if let Some(enabled) = self.toggle_first(TrackKind::Video) {
            self.state.video_enabled = enabled;
        }
        self.state.video_enabled
    }

    /// Stop every track, drop the stream and reset flags. Idempotent.
    pub fn release(&mut self) {
        if self.stop_held_stream() {
            debug!(target: "call.media", "Local stream released");
        }
        self.state.last_error = None;
        self.state.audio_enabled = true;
        self.state.video_enabled = true;
    }

    fn toggle_first(&self, kind: TrackKind) -> Option<bool> {
        let track = self.state.stream.as_ref()?.first_track(kind)?;
        let enabled = !track.enabled();
        track.set_enabled(enabled);
        Some(enabled)
    }

    /// Returns true if a stream was held.
    fn stop_held_stream(&mut self) -> bool {
        match self.state.stream.take() {
            Some(stream) => {
                stream.stop_all();
                true
            }
            None => false,
        }
    }
}

impl Drop for DeviceStreamManager {
    fn drop(&mut self) {
        self.stop_held_stream();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::loopback::SyntheticCapture;
    use crate::media::profile::{CaptureConstraints, HD, LOW, QUALITY_PROFILES, SD};

    struct DenyingCapture;

    #[async_trait::async_trait]
    impl MediaCapture for DenyingCapture {
        async fn get_user_media(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<MediaStream, CaptureError> {
            Err(CaptureError::new("Permission denied"))
        }
    }

    fn manager() -> (DeviceStreamManager, Arc<SyntheticCapture>) {
        let capture = Arc::new(SyntheticCapture::new());
        (DeviceStreamManager::new(capture.clone()), capture)
    }

    #[tokio::test]
    async fn test_acquire_default_uses_default_profile() {
        let (mut devices, _capture) = manager();

        let stream = devices.acquire_default().await.expect("stream");

        assert_eq!(devices.state().active_profile(), HD);
        assert!(devices.state().audio_enabled());
        assert!(devices.state().video_enabled());
        assert!(devices.state().last_error().is_none());
        assert!(devices.stream().unwrap().same_stream(&stream));
    }

    #[tokio::test]
    async fn test_change_quality_matches_profile_settings() {
        let (mut devices, _capture) = manager();
        devices.acquire_default().await.expect("stream");

        for profile in QUALITY_PROFILES {
            let stream = devices.change_quality(profile).await.expect("stream");
            let settings = stream.first_track(TrackKind::Video).unwrap().settings();

            assert_eq!(settings.width, Some(profile.width));
            assert_eq!(settings.height, Some(profile.height));
            assert_eq!(settings.frame_rate, Some(profile.frame_rate));
            assert_eq!(devices.state().active_profile(), profile);
        }
    }

    #[tokio::test]
    async fn test_reacquire_stops_previous_stream() {
        let (mut devices, capture) = manager();
        let first = devices.acquire(HD).await.expect("stream");

        let second = devices.change_quality(LOW).await.expect("stream");

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(capture.active_streams(), 1);
    }

    #[tokio::test]
    async fn test_toggle_audio_pair_restores_flag() {
        let (mut devices, _capture) = manager();
        let stream = devices.acquire_default().await.expect("stream");

        assert!(!devices.toggle_audio());
        assert_eq!(
            stream.first_track(TrackKind::Audio).map(|t| t.enabled()),
            Some(false)
        );
        assert!(devices.toggle_audio());
        assert!(devices.state().audio_enabled());
    }

    #[tokio::test]
    async fn test_toggle_video_flips_track() {
        let (mut devices, _capture) = manager();
        let stream = devices.acquire_default().await.expect("stream");

        assert!(!devices.toggle_video());
        assert_eq!(
            stream.first_track(TrackKind::Video).map(|t| t.enabled()),
            Some(false)
        );
    }

    #[test]
    fn test_toggles_without_stream_are_noops() {
        let (mut devices, _capture) = manager();

        assert!(devices.toggle_audio());
        assert!(devices.toggle_video());
        assert!(devices.stream().is_none());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (mut devices, capture) = manager();
        let stream = devices.acquire(SD).await.expect("stream");
        devices.toggle_video();

        devices.release();
        let once = format!("{:?}", devices.state());
        devices.release();
        let twice = format!("{:?}", devices.state());

        assert_eq!(once, twice);
        assert!(!stream.is_active());
        assert!(devices.stream().is_none());
        assert!(devices.state().video_enabled());
        assert_eq!(capture.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_failed_acquire_sets_error_and_keeps_flags() {
        let mut devices = DeviceStreamManager::new(Arc::new(DenyingCapture));

        let result = devices.acquire(SD).await;

        assert!(result.is_none());
        assert_eq!(
            devices.state().last_error().map(CaptureError::message),
            Some("Permission denied")
        );
        assert_eq!(devices.state().active_profile(), HD);
        assert!(devices.state().audio_enabled());
    }

    #[tokio::test]
    async fn test_drop_stops_held_stream() {
        let (mut devices, capture) = manager();
        let stream = devices.acquire_default().await.expect("stream");

        drop(devices);

        assert!(!stream.is_active());
        assert_eq!(capture.active_streams(), 0);
    }
}
