//! What the rendering layer reads from a call session.

use super::status::ConnectionStatus;
use crate::errors::{CaptureError, SignalingError};
use crate::media::{LocalStreamState, MediaQualityProfile, MediaStream, DEFAULT_PROFILE};
use crate::peer::PeerSessionState;
use common::types::MeetingId;

/// Point-in-time view of a call session, published on every change.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    /// The dialed identifier; `None` when hosting.
    pub target: Option<MeetingId>,
    /// True until the first local stream request has been answered.
    pub acquiring: bool,
    pub local_stream: Option<MediaStream>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub active_profile: MediaQualityProfile,
    pub capture_error: Option<CaptureError>,
    pub local_id: Option<MeetingId>,
    pub peer_ready: bool,
    pub signaling_error: Option<SignalingError>,
    pub remote_stream: Option<MediaStream>,
    /// Set once the session has torn down.
    pub ended: bool,
}

impl SessionSnapshot {
    pub(crate) fn new(target: Option<MeetingId>, profile: MediaQualityProfile) -> Self {
        Self {
            status: ConnectionStatus::Initializing,
            target,
            acquiring: true,
            local_stream: None,
            audio_enabled: true,
            video_enabled: true,
            active_profile: profile,
            capture_error: None,
            local_id: None,
            peer_ready: false,
            signaling_error: None,
            remote_stream: None,
            ended: false,
        }
    }

    pub(crate) fn apply_local(&mut self, local: &LocalStreamState) {
        self.local_stream = local.stream().cloned();
        self.audio_enabled = local.audio_enabled();
        self.video_enabled = local.video_enabled();
        self.active_profile = local.active_profile();
        self.capture_error = local.last_error().cloned();
    }

    pub(crate) fn apply_peer(&mut self, peer: &PeerSessionState) {
        self.local_id = peer.local_id().cloned();
        self.peer_ready = peer.ready();
        self.signaling_error = peer.last_error().cloned();
    }

    /// True when a capture or signaling error blocks the call page.
    #[must_use]
    pub fn has_blocking_error(&self) -> bool {
        self.capture_error.is_some() || self.signaling_error.is_some()
    }

    /// True when hosting rather than joining.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.target.is_none()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new(None, DEFAULT_PROFILE)
    }
}
