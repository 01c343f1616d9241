//! Call handles and inbound call offers.
//!
//! A [`CallHandle`] owns one connection to a remote peer. Closing is one-way:
//! once closed (locally or by a `Close`/`Error` event) the handle yields no
//! more events and can never reopen. A new call needs a new handle.

use crate::media::MediaStream;
use common::types::MeetingId;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Events delivered on an established or pending call.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The remote peer's media arrived.
    Stream(MediaStream),
    /// The call was closed by either side.
    Close,
    /// The call failed. Treated like a close.
    Error(String),
}

/// Collaborator side of a call: how a handle asks the transport to hang up.
pub trait CallLink: Send + Sync {
    /// Hang up. Must be idempotent.
    fn close(&self);
}

/// Collaborator side of an inbound offer.
pub trait OfferResponder: Send {
    /// Accept the offer, sending `stream` to the caller.
    fn answer(self: Box<Self>, stream: MediaStream) -> CallHandle;

    /// Decline the offer.
    fn reject(self: Box<Self>);
}

/// Handle to one call. Dropping it hangs up.
pub struct CallHandle {
    peer: MeetingId,
    events: mpsc::UnboundedReceiver<CallEvent>,
    link: Box<dyn CallLink>,
    closed: bool,
}

impl CallHandle {
    /// Build a handle from a collaborator's event channel and link.
    pub fn new(
        peer: MeetingId,
        events: mpsc::UnboundedReceiver<CallEvent>,
        link: Box<dyn CallLink>,
    ) -> Self {
        Self {
            peer,
            events,
            link,
            closed: false,
        }
    }

    /// Identifier of the remote peer.
    #[must_use]
    pub fn peer(&self) -> &MeetingId {
        &self.peer
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next call event.
    ///
    /// Returns `None` once the handle is closed or the collaborator went
    /// away. A `Close` or `Error` event closes the handle after it is
    /// returned.
    pub async fn next_event(&mut self) -> Option<CallEvent> {
        if self.closed {
            return None;
        }

        match self.events.recv().await {
            Some(event) => {
                if matches!(event, CallEvent::Close | CallEvent::Error(_)) {
                    self.close();
                }
                Some(event)
            }
            None => {
                self.close();
                None
            }
        }
    }

    /// Hang up. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        self.link.close();
        debug!(target: "call.peer", peer = %self.peer, "Call handle closed");
    }
}

impl Drop for CallHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// An inbound call waiting to be answered or rejected.
pub struct CallOffer {
    from: MeetingId,
    responder: Box<dyn OfferResponder>,
}

impl CallOffer {
    pub fn new(from: MeetingId, responder: Box<dyn OfferResponder>) -> Self {
        Self { from, responder }
    }

    /// Identifier of the calling peer.
    #[must_use]
    pub fn caller(&self) -> &MeetingId {
        &self.from
    }

    /// Accept with the local stream.
    #[must_use]
    pub fn answer(self, stream: MediaStream) -> CallHandle {
        self.responder.answer(stream)
    }

    /// Decline.
    pub fn reject(self) {
        self.responder.reject();
    }
}

impl fmt::Debug for CallOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOffer")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLink(Arc<AtomicUsize>);

    impl CallLink for CountingLink {
        fn close(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn handle() -> (CallHandle, mpsc::UnboundedSender<CallEvent>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let handle = CallHandle::new(
            MeetingId::new("remote"),
            rx,
            Box::new(CountingLink(closes.clone())),
        );
        (handle, tx, closes)
    }

    #[tokio::test]
    async fn test_close_is_one_way_and_idempotent() {
        let (mut call, tx, closes) = handle();

        call.close();
        call.close();

        assert!(call.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        let _ = tx.send(CallEvent::Close);
        assert!(call.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_remote_close_event_closes_handle() {
        let (mut call, tx, closes) = handle();
        tx.send(CallEvent::Close).unwrap();

        assert!(matches!(call.next_event().await, Some(CallEvent::Close)));
        assert!(call.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(call.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_error_event_closes_handle() {
        let (mut call, tx, _closes) = handle();
        tx.send(CallEvent::Error("ice failed".to_string())).unwrap();

        assert!(matches!(call.next_event().await, Some(CallEvent::Error(_))));
        assert!(call.is_closed());
    }

    #[test]
    fn test_drop_hangs_up() {
        let (call, _tx, closes) = handle();
        drop(call);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
