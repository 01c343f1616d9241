//! View models: what the home page and the call page show.
//!
//! Pure derivations from session state. Rendering layers read these instead
//! of re-deriving the rules from raw state.

use crate::errors::CallError;
use crate::media::LocalStreamState;
use crate::routes::{invite_link, Route};
use crate::session::{ConnectionStatus, SessionSnapshot};
use serde::Serialize;
use url::Url;

/// Color of the status badge dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Success,
    Danger,
    /// Pulsing; the call is not settled yet.
    Pending,
}

impl From<ConnectionStatus> for BadgeTone {
    fn from(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Connected => BadgeTone::Success,
            ConnectionStatus::Disconnected => BadgeTone::Danger,
            ConnectionStatus::Initializing
            | ConnectionStatus::Waiting
            | ConnectionStatus::Connecting => BadgeTone::Pending,
        }
    }
}

/// How the remote video fills the page. A per-page display setting; it
/// does not touch the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFit {
    /// Fill the page, cropping the video.
    #[default]
    Cover,
    /// Show the whole video, letterboxed.
    Contain,
}

impl VideoFit {
    pub const ALL: [VideoFit; 2] = [VideoFit::Cover, VideoFit::Contain];

    /// Settings menu entry.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            VideoFit::Cover => "Full Screen (Cover)",
            VideoFit::Contain => "Fit Screen (Contain)",
        }
    }
}

/// Blocking error screen with a single way back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorScreen {
    pub title: &'static str,
    pub message: String,
    pub action_label: &'static str,
    pub action: Route,
}

/// The call itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallScreen {
    pub status: ConnectionStatus,
    pub status_label: &'static str,
    pub badge_tone: BadgeTone,
    /// Full-screen remote video instead of the placeholder.
    pub show_remote_video: bool,
    /// Placeholder text while there is no remote video.
    pub headline: Option<&'static str>,
    /// Shown only while hosting and waiting, once the identifier is known.
    pub invite_link: Option<String>,
    pub show_local_preview: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub quality_label: &'static str,
    pub quality_menu_enabled: bool,
    pub video_fit: VideoFit,
}

/// What the call page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "lowercase")]
pub enum CallPageView {
    Error(ErrorScreen),
    Call(CallScreen),
}

impl CallPageView {
    /// Derive the call page from a snapshot. `base_url` is where invite links
    /// point.
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot, base_url: &Url) -> Self {
        if let Some(message) = blocking_error_message(snapshot) {
            return CallPageView::Error(ErrorScreen {
                title: "An error occurred",
                message,
                action_label: "Go Back",
                action: Route::Home,
            });
        }

        let show_remote_video = snapshot.remote_stream.is_some();
        let headline = (!show_remote_video).then_some(match snapshot.status {
            ConnectionStatus::Waiting => "Waiting for someone to join...",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Initializing
            | ConnectionStatus::Connected
            | ConnectionStatus::Disconnected => "Initializing...",
        });

        let invite_link = match (&snapshot.status, &snapshot.local_id) {
            (ConnectionStatus::Waiting, Some(id)) if !show_remote_video => {
                Some(invite_link(base_url, id))
            }
            _ => None,
        };

        CallPageView::Call(CallScreen {
            status: snapshot.status,
            status_label: snapshot.status.label(),
            badge_tone: snapshot.status.into(),
            show_remote_video,
            headline,
            invite_link,
            show_local_preview: snapshot.local_stream.is_some(),
            audio_enabled: snapshot.audio_enabled,
            video_enabled: snapshot.video_enabled,
            quality_label: snapshot.active_profile.label,
            quality_menu_enabled: snapshot.local_stream.is_some(),
            video_fit: VideoFit::default(),
        })
    }

    /// Apply the page's display-mode setting. The error screen has no video
    /// and is returned unchanged.
    #[must_use]
    pub fn with_video_fit(self, fit: VideoFit) -> Self {
        match self {
            CallPageView::Call(screen) => CallPageView::Call(CallScreen {
                video_fit: fit,
                ..screen
            }),
            error @ CallPageView::Error(_) => error,
        }
    }
}

/// Capture errors are shown before signaling errors.
fn blocking_error_message(snapshot: &SessionSnapshot) -> Option<String> {
    if let Some(error) = &snapshot.capture_error {
        return Some(CallError::Capture(error.clone()).client_message());
    }
    snapshot
        .signaling_error
        .as_ref()
        .map(|error| CallError::Signaling(error.clone()).client_message())
}

/// Home page camera preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "preview", rename_all = "lowercase")]
pub enum PreviewState {
    /// Capture failed.
    Denied { message: &'static str },
    /// Still waiting on the capture device.
    Starting { message: &'static str },
    /// Preview running; the video element is hidden while the camera is off.
    Live { video_hidden: bool },
}

/// What the home page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeView {
    pub preview: PreviewState,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub quality_label: &'static str,
    /// Mic, camera and quality controls need a stream.
    pub controls_enabled: bool,
    pub create_enabled: bool,
    pub join_enabled: bool,
}

impl HomeView {
    /// Derive the home page from local media state and the code input.
    ///
    /// Create and join stay disabled only while the preview is still
    /// starting; a denied camera does not block navigation.
    #[must_use]
    pub fn from_local(local: &LocalStreamState, code_input: &str) -> Self {
        let has_stream = local.stream().is_some();
        let settled = has_stream || local.last_error().is_some();

        let preview = if local.last_error().is_some() {
            PreviewState::Denied {
                message: "Camera access denied. Please enable permissions to continue.",
            }
        } else if has_stream {
            PreviewState::Live {
                video_hidden: !local.video_enabled(),
            }
        } else {
            PreviewState::Starting {
                message: "Initializing camera...",
            }
        };

        Self {
            preview,
            audio_enabled: local.audio_enabled(),
            video_enabled: local.video_enabled(),
            quality_label: local.active_profile().label,
            controls_enabled: has_stream,
            create_enabled: settled,
            join_enabled: settled && !code_input.trim().is_empty(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::errors::{CaptureError, SignalingError};
    use crate::media::{MediaStream, MediaTrack, TrackKind, TrackSettings, SD};
    use common::types::MeetingId;

    fn base() -> Url {
        Url::parse("https://meet.example.com/").unwrap()
    }

    fn stream() -> MediaStream {
        MediaStream::new(vec![MediaTrack::new(
            TrackKind::Video,
            "cam",
            TrackSettings::default(),
        )])
    }

    fn call_screen(snapshot: &SessionSnapshot) -> CallScreen {
        match CallPageView::from_snapshot(snapshot, &base()) {
            CallPageView::Call(screen) => screen,
            CallPageView::Error(e) => panic!("unexpected error screen: {e:?}"),
        }
    }

    #[test]
    fn test_capture_error_preferred_on_error_screen() {
        let snapshot = SessionSnapshot {
            capture_error: Some(CaptureError::new("Permission denied")),
            signaling_error: Some(SignalingError::Network("down".to_string())),
            ..SessionSnapshot::default()
        };

        match CallPageView::from_snapshot(&snapshot, &base()) {
            CallPageView::Error(screen) => {
                assert_eq!(screen.message, "Permission denied");
                assert_eq!(screen.action, Route::Home);
            }
            CallPageView::Call(_) => panic!("expected error screen"),
        }
    }

    #[test]
    fn test_signaling_error_blocks_call_page() {
        let snapshot = SessionSnapshot {
            signaling_error: Some(SignalingError::PeerUnavailable("abc".to_string())),
            ..SessionSnapshot::default()
        };

        let view = CallPageView::from_snapshot(&snapshot, &base());
        assert!(matches!(
            view,
            CallPageView::Error(ErrorScreen { ref message, .. }) if message.contains("abc")
        ));
    }

    #[test]
    fn test_waiting_host_shows_invite_link() {
        let snapshot = SessionSnapshot {
            status: ConnectionStatus::Waiting,
            local_id: Some(MeetingId::new("host-1")),
            local_stream: Some(stream()),
            ..SessionSnapshot::default()
        };

        let screen = call_screen(&snapshot);
        assert_eq!(screen.headline, Some("Waiting for someone to join..."));
        assert_eq!(
            screen.invite_link.as_deref(),
            Some("https://meet.example.com/call/host-1")
        );
        assert_eq!(screen.badge_tone, BadgeTone::Pending);
        assert!(screen.quality_menu_enabled);
    }

    #[test]
    fn test_invite_link_hidden_outside_waiting() {
        let snapshot = SessionSnapshot {
            status: ConnectionStatus::Connecting,
            local_id: Some(MeetingId::new("host-1")),
            ..SessionSnapshot::default()
        };

        let screen = call_screen(&snapshot);
        assert_eq!(screen.headline, Some("Connecting..."));
        assert!(screen.invite_link.is_none());
        assert!(!screen.quality_menu_enabled);
    }

    #[test]
    fn test_connected_shows_remote_video() {
        let snapshot = SessionSnapshot {
            status: ConnectionStatus::Connected,
            remote_stream: Some(stream()),
            local_stream: Some(stream()),
            ..SessionSnapshot::default()
        };

        let screen = call_screen(&snapshot);
        assert!(screen.show_remote_video);
        assert!(screen.headline.is_none());
        assert_eq!(screen.status_label, "Connected");
        assert_eq!(screen.badge_tone, BadgeTone::Success);
    }

    #[test]
    fn test_disconnected_badge_is_danger() {
        let snapshot = SessionSnapshot {
            status: ConnectionStatus::Disconnected,
            ..SessionSnapshot::default()
        };
        assert_eq!(call_screen(&snapshot).badge_tone, BadgeTone::Danger);
    }

    #[test]
    fn test_video_fit_defaults_to_cover_and_is_overridable() {
        let snapshot = SessionSnapshot {
            status: ConnectionStatus::Connected,
            remote_stream: Some(stream()),
            ..SessionSnapshot::default()
        };
        assert_eq!(call_screen(&snapshot).video_fit, VideoFit::Cover);

        let view =
            CallPageView::from_snapshot(&snapshot, &base()).with_video_fit(VideoFit::Contain);
        match view {
            CallPageView::Call(screen) => {
                assert_eq!(screen.video_fit, VideoFit::Contain);
                assert!(screen.show_remote_video);
            }
            CallPageView::Error(e) => panic!("unexpected error screen: {e:?}"),
        }
        assert_eq!(VideoFit::Contain.label(), "Fit Screen (Contain)");
    }

    #[test]
    fn test_video_fit_leaves_error_screen_alone() {
        let snapshot = SessionSnapshot {
            capture_error: Some(CaptureError::new("Permission denied")),
            ..SessionSnapshot::default()
        };
        let view = CallPageView::from_snapshot(&snapshot, &base());
        assert_eq!(view.clone().with_video_fit(VideoFit::Contain), view);
    }

    #[test]
    fn test_call_view_serializes_with_screen_tag() {
        let snapshot = SessionSnapshot {
            active_profile: SD,
            ..SessionSnapshot::default()
        };
        let json = serde_json::to_value(CallPageView::from_snapshot(&snapshot, &base())).unwrap();
        assert_eq!(json["screen"], "call");
        assert_eq!(json["status"], "initializing");
        assert_eq!(json["quality_label"], "SD");
        assert_eq!(json["video_fit"], "cover");
    }
}
