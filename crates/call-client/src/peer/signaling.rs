//! The signaling seam: how a session reaches the peer-connection service.
//!
//! The service is event driven. [`SignalingService::connect`] returns at once
//! with a link for outbound commands and a receiver of service events; the
//! local identifier arrives later as [`SignalingEvent::Open`].

use super::call::{CallHandle, CallOffer};
use crate::errors::SignalingError;
use crate::media::MediaStream;
use common::types::MeetingId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events emitted by the signaling service for one session.
#[derive(Debug)]
pub enum SignalingEvent {
    /// Registration confirmed; this is the session's identifier.
    Open(MeetingId),
    /// A remote peer is calling.
    IncomingCall(CallOffer),
    /// Session-level failure.
    Error(SignalingError),
}

/// Outbound commands on an open signaling session.
pub trait SignalingLink: Send + Sync {
    /// Dial `target`, sending `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is destroyed or the service refuses
    /// the dial (for example an unknown target).
    fn dial(&self, target: &MeetingId, stream: MediaStream) -> Result<CallHandle, SignalingError>;

    /// Tear the session down, closing its calls. Idempotent.
    fn destroy(&self);
}

/// A connected signaling session: command link plus event stream.
pub struct SignalingChannel {
    pub link: Arc<dyn SignalingLink>,
    pub events: mpsc::UnboundedReceiver<SignalingEvent>,
}

/// The peer-connection service.
pub trait SignalingService: Send + Sync {
    /// Start one signaling session.
    fn connect(&self) -> SignalingChannel;
}
