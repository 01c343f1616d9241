//! In-process signaling hub.
//!
//! Every [`LoopbackSignaling::connect`] registers a peer under a fresh random
//! identifier and confirms it with an `Open` event. Dialing a registered peer
//! delivers an offer to it; answering exchanges both streams. Closing either
//! side, rejecting the offer, or destroying either session closes the call for
//! both peers.

use crate::errors::SignalingError;
use crate::media::MediaStream;
use crate::peer::{
    CallEvent, CallHandle, CallLink, CallOffer, OfferResponder, SignalingChannel, SignalingEvent,
    SignalingLink, SignalingService,
};
use common::types::MeetingId;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

type EventSender = mpsc::UnboundedSender<SignalingEvent>;
type CallEventSender = mpsc::UnboundedSender<CallEvent>;

#[derive(Default)]
struct Hub {
    peers: HashMap<MeetingId, PeerEntry>,
}

struct PeerEntry {
    events: EventSender,
    calls: Vec<Arc<LoopbackCall>>,
}

impl PeerEntry {
    fn track(&mut self, call: &Arc<LoopbackCall>) {
        self.calls.retain(|c| !c.is_closed());
        self.calls.push(Arc::clone(call));
    }
}

fn lock_hub(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process signaling service shared by every session that should be able
/// to reach each other.
#[derive(Clone, Default)]
pub struct LoopbackSignaling {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackSignaling {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently registered.
    #[must_use]
    pub fn registered_peers(&self) -> usize {
        lock_hub(&self.hub).peers.len()
    }
}

impl SignalingService for LoopbackSignaling {
    fn connect(&self) -> SignalingChannel {
        let id = MeetingId::generate();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Receiver is held right here, so the send cannot fail.
        let _ = events_tx.send(SignalingEvent::Open(id.clone()));
        lock_hub(&self.hub).peers.insert(
            id.clone(),
            PeerEntry {
                events: events_tx,
                calls: Vec::new(),
            },
        );
        debug!(target: "call.loopback", peer = %id, "Peer registered");

        SignalingChannel {
            link: Arc::new(LoopbackLink {
                id,
                hub: Arc::clone(&self.hub),
            }),
            events: events_rx,
        }
    }
}

struct LoopbackLink {
    id: MeetingId,
    hub: Arc<Mutex<Hub>>,
}

impl SignalingLink for LoopbackLink {
    fn dial(&self, target: &MeetingId, stream: MediaStream) -> Result<CallHandle, SignalingError> {
        let mut hub = lock_hub(&self.hub);
        if !hub.peers.contains_key(&self.id) {
            return Err(SignalingError::SessionClosed);
        }

        let (caller_tx, caller_rx) = mpsc::unbounded_channel();
        let call = Arc::new(LoopbackCall::new(caller_tx));

        let callee = hub
            .peers
            .get_mut(target)
            .ok_or_else(|| SignalingError::PeerUnavailable(target.to_string()))?;

        let offer = CallOffer::new(
            self.id.clone(),
            Box::new(LoopbackOffer {
                call: Arc::clone(&call),
                caller: self.id.clone(),
                caller_stream: stream,
            }),
        );
        callee
            .events
            .send(SignalingEvent::IncomingCall(offer))
            .map_err(|_| SignalingError::PeerUnavailable(target.to_string()))?;
        callee.track(&call);

        if let Some(caller) = hub.peers.get_mut(&self.id) {
            caller.track(&call);
        }

        info!(target: "call.loopback", caller = %self.id, callee = %target, "Call offered");
        Ok(CallHandle::new(
            target.clone(),
            caller_rx,
            Box::new(LoopbackCallLink(call)),
        ))
    }

    fn destroy(&self) {
        let entry = lock_hub(&self.hub).peers.remove(&self.id);
        if let Some(entry) = entry {
            for call in entry.calls {
                call.close();
            }
            debug!(target: "call.loopback", peer = %self.id, "Peer destroyed");
        }
    }
}

#[derive(Default)]
struct CallState {
    closed: bool,
    caller: Option<CallEventSender>,
    callee: Option<CallEventSender>,
}

/// One call between two loopback peers.
struct LoopbackCall {
    state: Mutex<CallState>,
}

impl LoopbackCall {
    fn new(caller: CallEventSender) -> Self {
        Self {
            state: Mutex::new(CallState {
                closed: false,
                caller: Some(caller),
                callee: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Connect the answering side and exchange streams. Returns false when
    /// the call was closed before it was answered.
    fn answer(
        &self,
        callee: CallEventSender,
        caller_stream: MediaStream,
        callee_stream: MediaStream,
    ) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }

        // A side that already hung up has closed its receiver; ignore send errors.
        if let Some(caller) = &state.caller {
            let _ = caller.send(CallEvent::Stream(callee_stream));
        }
        let _ = callee.send(CallEvent::Stream(caller_stream));
        state.callee = Some(callee);
        true
    }

    fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        for side in [state.caller.take(), state.callee.take()].into_iter().flatten() {
            let _ = side.send(CallEvent::Close);
        }
    }
}

struct LoopbackCallLink(Arc<LoopbackCall>);

impl CallLink for LoopbackCallLink {
    fn close(&self) {
        self.0.close();
    }
}

struct LoopbackOffer {
    call: Arc<LoopbackCall>,
    caller: MeetingId,
    caller_stream: MediaStream,
}

impl OfferResponder for LoopbackOffer {
    fn answer(self: Box<Self>, stream: MediaStream) -> CallHandle {
        let (callee_tx, callee_rx) = mpsc::unbounded_channel();
        if !self.call.answer(callee_tx.clone(), self.caller_stream, stream) {
            let _ = callee_tx.send(CallEvent::Close);
        }

        CallHandle::new(self.caller, callee_rx, Box::new(LoopbackCallLink(self.call)))
    }

    fn reject(self: Box<Self>) {
        debug!(target: "call.loopback", caller = %self.caller, "Offer rejected");
        self.call.close();
    }
}
