//! Shared fixtures: streams, identifiers and snapshot waiting helpers.

use call_client::media::{MediaStream, MediaTrack, TrackKind, TrackSettings};
use call_client::session::{CallSessionHandle, ConnectionStatus, SessionSnapshot, StatusChange};
use common::types::MeetingId;
use std::time::Duration;
use tokio::sync::broadcast;

/// Default time a fixture waits for a session to reach some state.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

/// A live stream with one audio and one video track.
#[must_use]
pub fn test_stream() -> MediaStream {
    MediaStream::new(vec![
        MediaTrack::new(TrackKind::Audio, "Test Microphone", TrackSettings::default()),
        MediaTrack::new(
            TrackKind::Video,
            "Test Camera",
            TrackSettings {
                width: Some(640),
                height: Some(480),
                frame_rate: Some(30),
                facing_mode: None,
            },
        ),
    ])
}

/// Shorthand for `MeetingId::new`.
#[must_use]
pub fn meeting_id(id: &str) -> MeetingId {
    MeetingId::new(id)
}

/// Wait until the session's snapshot satisfies `predicate` and return it.
///
/// # Panics
///
/// Panics if the predicate does not hold within [`SNAPSHOT_TIMEOUT`] or the
/// session stopped publishing first.
pub async fn wait_for_snapshot(
    handle: &CallSessionHandle,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut watch = handle.watch();
    let result = tokio::time::timeout(SNAPSHOT_TIMEOUT, watch.wait_for(predicate)).await;
    let snapshot = match result {
        Ok(Ok(snapshot)) => snapshot.clone(),
        Ok(Err(_)) => panic!("session stopped publishing: {:?}", handle.snapshot()),
        Err(_) => panic!("snapshot condition not reached: {:?}", handle.snapshot()),
    };
    snapshot
}

/// Wait until the session shows `status`.
///
/// # Panics
///
/// See [`wait_for_snapshot`].
pub async fn wait_for_status(
    handle: &CallSessionHandle,
    status: ConnectionStatus,
) -> SessionSnapshot {
    wait_for_snapshot(handle, |s| s.status == status).await
}

/// Wait until the session has torn down.
///
/// # Panics
///
/// See [`wait_for_snapshot`].
pub async fn wait_for_end(handle: &CallSessionHandle) -> SessionSnapshot {
    wait_for_snapshot(handle, |s| s.ended).await
}

/// Collects status transitions from a subscription.
#[derive(Debug)]
pub struct StatusRecorder {
    rx: broadcast::Receiver<StatusChange>,
    seen: Vec<ConnectionStatus>,
}

impl StatusRecorder {
    /// Start recording. Subscribe before the transitions of interest happen.
    #[must_use]
    pub fn new(handle: &CallSessionHandle) -> Self {
        Self {
            rx: handle.subscribe_status(),
            seen: Vec::new(),
        }
    }

    /// Record transitions until `status` is entered, then return every
    /// status entered so far in order.
    ///
    /// # Panics
    ///
    /// Panics if `status` is not entered within [`SNAPSHOT_TIMEOUT`] or the
    /// subscription lagged.
    pub async fn until(&mut self, status: ConnectionStatus) -> Vec<ConnectionStatus> {
        if self.seen.contains(&status) {
            return self.seen.clone();
        }
        let deadline = tokio::time::Instant::now() + SNAPSHOT_TIMEOUT;
        loop {
            let change = match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Ok(change)) => change,
                Ok(Err(e)) => panic!("status subscription failed: {e}"),
                Err(_) => panic!("status {status} not entered, saw {:?}", self.seen),
            };
            self.seen.push(change.to);
            if change.to == status {
                return self.seen.clone();
            }
        }
    }
}
