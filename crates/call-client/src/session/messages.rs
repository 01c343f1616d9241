//! Commands accepted by the call session actor.

use crate::errors::CallError;
use crate::media::MediaQualityProfile;
use tokio::sync::oneshot;

/// Messages sent to the `CallSession` actor through its handle.
#[derive(Debug)]
pub enum SessionMessage {
    /// Flip the microphone. Replies with the resulting flag.
    ToggleAudio { respond_to: oneshot::Sender<bool> },

    /// Flip the camera. Replies with the resulting flag.
    ToggleVideo { respond_to: oneshot::Sender<bool> },

    /// Re-acquire the local stream at another quality.
    ChangeQuality {
        profile: MediaQualityProfile,
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
}
