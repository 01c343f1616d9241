//! The media capture seam.

use super::profile::CaptureConstraints;
use super::stream::MediaStream;
use crate::errors::CaptureError;

/// Local camera and microphone access.
///
/// Implementations may suspend for as long as the user takes to answer a
/// permission prompt. Dropping the returned future abandons the request; an
/// implementation must not leave a device open for an abandoned request.
#[async_trait::async_trait]
pub trait MediaCapture: Send + Sync {
    /// Request a stream matching the constraints.
    async fn get_user_media(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError>;
}
