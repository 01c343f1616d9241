//! Mock capture device.
//!
//! By default every request is granted at once with tracks whose settings
//! equal the requested ideals. The builder scripts denials and a permission
//! prompt that holds requests until the test answers it.
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::MockCapture;
//!
//! let capture = MockCapture::builder()
//!     .deny_after(1, "Device in use")
//!     .build();
//! ```

use call_client::errors::CaptureError;
use call_client::media::{
    CaptureConstraints, MediaCapture, MediaStream, MediaTrack, TrackKind, TrackSettings,
};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Answer to a pending permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permission {
    Pending,
    Granted,
    Denied,
}

#[derive(Debug)]
struct Script {
    deny_message: Option<String>,
    deny_after: Option<(usize, String)>,
    deny_first: Option<(usize, String)>,
    with_audio: bool,
}

#[derive(Debug, Default)]
struct Record {
    requests: Vec<CaptureConstraints>,
    answered: usize,
    issued: Vec<MediaStream>,
}

#[derive(Debug)]
struct Inner {
    script: Script,
    prompt: Option<watch::Sender<Permission>>,
    record: Mutex<Record>,
}

/// Scriptable capture device. Clones share state, so a test can keep one
/// clone while the code under test owns another.
#[derive(Debug, Clone)]
pub struct MockCapture {
    inner: Arc<Inner>,
}

impl MockCapture {
    /// Create a new MockCapture builder.
    #[must_use]
    pub fn builder() -> MockCaptureBuilder {
        MockCaptureBuilder::default()
    }

    /// Capture device that grants everything.
    #[must_use]
    pub fn granting() -> Self {
        Self::builder().build()
    }

    /// Capture device that denies everything with `message`.
    #[must_use]
    pub fn denying(message: &str) -> Self {
        Self::builder().deny(message).build()
    }

    /// Answer the permission prompt with a grant. Pending and future
    /// requests proceed.
    ///
    /// # Panics
    ///
    /// Panics if the mock was built without a permission prompt.
    pub fn grant_permission(&self) {
        self.prompt().send_replace(Permission::Granted);
    }

    /// Answer the permission prompt with a denial.
    ///
    /// # Panics
    ///
    /// Panics if the mock was built without a permission prompt.
    pub fn deny_permission(&self) {
        self.prompt().send_replace(Permission::Denied);
    }

    /// Number of requests made, answered or not.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.record().requests.len()
    }

    /// Requests still waiting on the permission prompt.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        let record = self.record();
        record.requests.len() - record.answered
    }

    /// Constraints of every request, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CaptureConstraints> {
        self.record().requests.clone()
    }

    /// Every stream granted so far.
    #[must_use]
    pub fn issued_streams(&self) -> Vec<MediaStream> {
        self.record().issued.clone()
    }

    /// Granted streams that still have a live track.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.record()
            .issued
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    /// Wait until `count` requests have been made.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }

    fn prompt(&self) -> &watch::Sender<Permission> {
        self.inner
            .prompt
            .as_ref()
            .expect("MockCapture built without a permission prompt")
    }

    fn record(&self) -> std::sync::MutexGuard<'_, Record> {
        self.inner.record.lock().expect("record lock poisoned")
    }

    fn grant(&self, constraints: &CaptureConstraints) -> Result<MediaStream, CaptureError> {
        let mut record = self.record();
        record.answered += 1;
        let attempt = record.answered;

        if let Some(message) = &self.inner.script.deny_message {
            return Err(CaptureError::new(message.clone()));
        }
        if let Some((allowed, message)) = &self.inner.script.deny_after {
            if attempt > *allowed {
                return Err(CaptureError::new(message.clone()));
            }
        }
        if let Some((denied, message)) = &self.inner.script.deny_first {
            if attempt <= *denied {
                return Err(CaptureError::new(message.clone()));
            }
        }

        let mut tracks = Vec::new();
        if constraints.audio && self.inner.script.with_audio {
            tracks.push(MediaTrack::new(
                TrackKind::Audio,
                "Mock Microphone",
                TrackSettings::default(),
            ));
        }
        tracks.push(MediaTrack::new(
            TrackKind::Video,
            "Mock Camera",
            TrackSettings {
                width: Some(constraints.video.width),
                height: Some(constraints.video.height),
                frame_rate: Some(constraints.video.frame_rate),
                facing_mode: Some(constraints.video.facing_mode),
            },
        ));

        let stream = MediaStream::new(tracks);
        record.issued.push(stream.clone());
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl MediaCapture for MockCapture {
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.record().requests.push(*constraints);

        if let Some(prompt) = &self.inner.prompt {
            let mut answer = prompt.subscribe();
            let permission = *answer
                .wait_for(|p| *p != Permission::Pending)
                .await
                .expect("prompt sender lives in the mock");
            if permission == Permission::Denied {
                self.record().answered += 1;
                return Err(CaptureError::new("Permission denied"));
            }
        }

        self.grant(constraints)
    }
}

/// Builder for MockCapture configuration.
#[derive(Debug)]
pub struct MockCaptureBuilder {
    deny_message: Option<String>,
    deny_after: Option<(usize, String)>,
    deny_first: Option<(usize, String)>,
    with_audio: bool,
    prompt: bool,
}

impl Default for MockCaptureBuilder {
    fn default() -> Self {
        Self {
            deny_message: None,
            deny_after: None,
            deny_first: None,
            with_audio: true,
            prompt: false,
        }
    }
}

impl MockCaptureBuilder {
    /// Deny every request with `message`.
    #[must_use]
    pub fn deny(mut self, message: &str) -> Self {
        self.deny_message = Some(message.to_string());
        self
    }

    /// Grant the first `granted` requests, deny the rest with `message`.
    #[must_use]
    pub fn deny_after(mut self, granted: usize, message: &str) -> Self {
        self.deny_after = Some((granted, message.to_string()));
        self
    }

    /// Deny the first `denied` requests with `message`, grant the rest.
    #[must_use]
    pub fn deny_first(mut self, denied: usize, message: &str) -> Self {
        self.deny_first = Some((denied, message.to_string()));
        self
    }

    /// Grant streams with a video track only.
    #[must_use]
    pub fn without_audio(mut self) -> Self {
        self.with_audio = false;
        self
    }

    /// Hold every request until the test calls `grant_permission` or
    /// `deny_permission`.
    #[must_use]
    pub fn with_permission_prompt(mut self) -> Self {
        self.prompt = true;
        self
    }

    /// Build the MockCapture.
    #[must_use]
    pub fn build(self) -> MockCapture {
        MockCapture {
            inner: Arc::new(Inner {
                script: Script {
                    deny_message: self.deny_message,
                    deny_after: self.deny_after,
                    deny_first: self.deny_first,
                    with_audio: self.with_audio,
                },
                prompt: self
                    .prompt
                    .then(|| watch::channel(Permission::Pending).0),
                record: Mutex::new(Record::default()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_client::media::{HD, LOW};

    #[tokio::test]
    async fn test_granting_matches_constraints() {
        let capture = MockCapture::granting();

        let stream = capture.get_user_media(&LOW.constraints()).await.unwrap();

        let video = stream.first_track(TrackKind::Video).unwrap().settings();
        assert_eq!(video.width, Some(LOW.width));
        assert!(stream.first_track(TrackKind::Audio).is_some());
        assert_eq!(capture.request_count(), 1);
        assert_eq!(capture.active_streams(), 1);
    }

    #[tokio::test]
    async fn test_deny_after() {
        let capture = MockCapture::builder().deny_after(1, "Device in use").build();

        assert!(capture.get_user_media(&HD.constraints()).await.is_ok());
        let err = capture.get_user_media(&HD.constraints()).await.unwrap_err();
        assert_eq!(err.message(), "Device in use");
    }

    #[tokio::test]
    async fn test_deny_first() {
        let capture = MockCapture::builder().deny_first(1, "Device in use").build();

        let err = capture.get_user_media(&HD.constraints()).await.unwrap_err();
        assert_eq!(err.message(), "Device in use");
        assert!(capture.get_user_media(&HD.constraints()).await.is_ok());
        assert_eq!(capture.active_streams(), 1);
    }

    #[tokio::test]
    async fn test_without_audio() {
        let capture = MockCapture::builder().without_audio().build();
        let stream = capture.get_user_media(&HD.constraints()).await.unwrap();
        assert!(stream.first_track(TrackKind::Audio).is_none());
    }

    #[tokio::test]
    async fn test_prompt_holds_until_granted() {
        let capture = MockCapture::builder().with_permission_prompt().build();
        let pending = tokio::spawn({
            let capture = capture.clone();
            async move { capture.get_user_media(&HD.constraints()).await }
        });

        capture.wait_for_requests(1).await;
        assert_eq!(capture.pending_requests(), 1);
        assert_eq!(capture.active_streams(), 0);

        capture.grant_permission();
        assert!(pending.await.unwrap().is_ok());
        assert_eq!(capture.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_prompt_denial() {
        let capture = MockCapture::builder().with_permission_prompt().build();
        capture.deny_permission();

        let err = capture.get_user_media(&HD.constraints()).await.unwrap_err();
        assert_eq!(err.message(), "Permission denied");
    }
}
