//! Home page model: camera preview plus create/join navigation.

use crate::media::{DeviceStreamManager, MediaCapture, MediaQualityProfile};
use crate::meeting_code::ResolveError;
use crate::routes::{self, Route};
use crate::view::HomeView;

use std::sync::Arc;
use tracing::info;

/// Owns the preview stream shown before a call. Dropping the page stops the
/// preview.
pub struct HomePage {
    devices: DeviceStreamManager,
}

impl HomePage {
    pub fn new(capture: Arc<dyn MediaCapture>, default_profile: MediaQualityProfile) -> Self {
        Self {
            devices: DeviceStreamManager::with_default_profile(capture, default_profile),
        }
    }

    /// Start the preview at the default profile.
    pub async fn initialize(&mut self) {
        self.devices.acquire_default().await;
    }

    #[must_use]
    pub fn view(&self, code_input: &str) -> HomeView {
        HomeView::from_local(self.devices.state(), code_input)
    }

    pub fn toggle_audio(&mut self) -> bool {
        self.devices.toggle_audio()
    }

    pub fn toggle_video(&mut self) -> bool {
        self.devices.toggle_video()
    }

    pub async fn change_quality(&mut self, profile: MediaQualityProfile) {
        self.devices.change_quality(profile).await;
    }

    /// Host a new call. The preview is released so the call page can take
    /// the devices.
    pub fn create_meeting(&mut self) -> Route {
        self.devices.release();
        info!(target: "call.home", "Creating meeting");
        Route::host()
    }

    /// Join the meeting named by `code_input`.
    ///
    /// # Errors
    ///
    /// Blank or tokenless input; the preview keeps running.
    pub fn join_meeting(&mut self, code_input: &str) -> Result<Route, ResolveError> {
        let route = routes::join_route(code_input)?;
        self.devices.release();
        info!(target: "call.home", route = %route, "Joining meeting");
        Ok(route)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::errors::CaptureError;
    use crate::loopback::SyntheticCapture;
    use crate::media::{CaptureConstraints, MediaStream, HD, LOW};
    use crate::view::PreviewState;
    use common::types::MeetingId;

    struct DenyingCapture;

    #[async_trait::async_trait]
    impl MediaCapture for DenyingCapture {
        async fn get_user_media(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<MediaStream, CaptureError> {
            Err(CaptureError::new("NotAllowedError"))
        }
    }

    #[test]
    fn test_buttons_disabled_while_starting() {
        let page = HomePage::new(Arc::new(SyntheticCapture::new()), HD);
        let view = page.view("abc");

        assert!(matches!(view.preview, PreviewState::Starting { .. }));
        assert!(!view.create_enabled);
        assert!(!view.join_enabled);
        assert!(!view.controls_enabled);
    }

    #[tokio::test]
    async fn test_live_preview_enables_actions() {
        let mut page = HomePage::new(Arc::new(SyntheticCapture::new()), HD);
        page.initialize().await;

        let view = page.view("");
        assert_eq!(view.preview, PreviewState::Live { video_hidden: false });
        assert!(view.create_enabled);
        assert!(!view.join_enabled);
        assert!(page.view("abc").join_enabled);
    }

    #[tokio::test]
    async fn test_denied_camera_still_allows_navigation() {
        let mut page = HomePage::new(Arc::new(DenyingCapture), HD);
        page.initialize().await;

        let view = page.view(" code ");
        assert!(matches!(view.preview, PreviewState::Denied { .. }));
        assert!(view.create_enabled);
        assert!(view.join_enabled);
        assert!(!view.controls_enabled);
    }

    #[tokio::test]
    async fn test_camera_off_hides_preview_video() {
        let mut page = HomePage::new(Arc::new(SyntheticCapture::new()), HD);
        page.initialize().await;

        assert!(!page.toggle_video());
        assert_eq!(
            page.view("").preview,
            PreviewState::Live { video_hidden: true }
        );
    }

    #[tokio::test]
    async fn test_quality_label_follows_change() {
        let mut page = HomePage::new(Arc::new(SyntheticCapture::new()), HD);
        page.initialize().await;

        page.change_quality(LOW).await;
        assert_eq!(page.view("").quality_label, "Low");
    }

    #[tokio::test]
    async fn test_join_releases_preview_and_routes() {
        let capture = Arc::new(SyntheticCapture::new());
        let mut page = HomePage::new(capture.clone(), HD);
        page.initialize().await;

        let route = page
            .join_meeting("https://meet.example.com/call/abc123")
            .unwrap();

        assert_eq!(route, Route::join(MeetingId::new("abc123")));
        assert_eq!(capture.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_blank_join_keeps_preview() {
        let capture = Arc::new(SyntheticCapture::new());
        let mut page = HomePage::new(capture.clone(), HD);
        page.initialize().await;

        assert_eq!(page.join_meeting("   "), Err(ResolveError::Empty));
        assert_eq!(capture.active_streams(), 1);
    }

    #[test]
    fn test_create_routes_to_host() {
        let mut page = HomePage::new(Arc::new(SyntheticCapture::new()), HD);
        assert_eq!(page.create_meeting(), Route::host());
    }
}
