//! `PeerSession` - one signaling session for the lifetime of a call page.
//!
//! # Lifecycle
//!
//! 1. [`PeerSession::open`] connects once and spawns an event pump
//! 2. The pump assigns the local identifier on the service's `Open` event,
//!    which is the point the session becomes ready
//! 3. Inbound offers go to the single [`InboundSubscription`], if any
//! 4. [`PeerSession::close`] (or drop) destroys the link and stops the pump
//!
//! Session errors are recorded in [`PeerSessionState::last_error`] and never
//! retried.

use super::call::{CallHandle, CallOffer};
use super::signaling::{SignalingEvent, SignalingLink, SignalingService};
use crate::errors::SignalingError;
use crate::media::MediaStream;
use crate::observability::metrics;
use common::types::MeetingId;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Observable state of a signaling session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSessionState {
    local_id: Option<MeetingId>,
    ready: bool,
    last_error: Option<SignalingError>,
}

impl PeerSessionState {
    /// The identifier assigned by the service, once registered.
    #[must_use]
    pub fn local_id(&self) -> Option<&MeetingId> {
        self.local_id.as_ref()
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&SignalingError> {
        self.last_error.as_ref()
    }
}

/// Single-slot inbound offer routing.
#[derive(Default)]
struct InboundSlot {
    next_id: u64,
    current: Option<(u64, mpsc::UnboundedSender<CallOffer>)>,
}

fn lock_slot(slot: &Mutex<InboundSlot>) -> MutexGuard<'_, InboundSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscription to inbound call offers.
///
/// Only one subscription is live per session. Subscribing again ends the
/// previous subscription: its [`recv`](Self::recv) returns `None` once drained.
/// Dropping the subscription unsubscribes.
pub struct InboundSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<CallOffer>,
    slot: Arc<Mutex<InboundSlot>>,
}

impl InboundSubscription {
    /// Wait for the next offer. `None` when superseded or the session closed.
    pub async fn recv(&mut self) -> Option<CallOffer> {
        self.receiver.recv().await
    }

    /// Stop receiving offers. Offers arriving afterwards are rejected.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for InboundSubscription {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.slot);
        if slot.current.as_ref().is_some_and(|(id, _)| *id == self.id) {
            slot.current = None;
        }
    }
}

/// Owner of the signaling connection for one call session.
pub struct PeerSession {
    link: Option<Arc<dyn SignalingLink>>,
    state: watch::Sender<PeerSessionState>,
    inbound: Arc<Mutex<InboundSlot>>,
    cancel_token: CancellationToken,
    pump: Option<JoinHandle<()>>,
    opened: bool,
}

impl PeerSession {
    /// Create an unopened session. `cancel_token` stops the event pump; pass a
    /// child of the owning session's token.
    #[must_use]
    pub fn new(cancel_token: CancellationToken) -> Self {
        let (state, _) = watch::channel(PeerSessionState::default());
        Self {
            link: None,
            state,
            inbound: Arc::new(Mutex::new(InboundSlot::default())),
            cancel_token,
            pump: None,
            opened: false,
        }
    }

    /// Connect to the signaling service. Runs once; later calls are ignored.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&mut self, service: &dyn SignalingService) {
        if self.opened {
            warn!(target: "call.peer", "Signaling session already opened, ignoring");
            return;
        }
        self.opened = true;

        let channel = service.connect();
        self.link = Some(channel.link);

        let pump = EventPump {
            events: channel.events,
            state: self.state.clone(),
            inbound: Arc::clone(&self.inbound),
            cancel_token: self.cancel_token.clone(),
        };
        self.pump = Some(tokio::spawn(pump.run()));
        debug!(target: "call.peer", "Signaling session opening");
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PeerSessionState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<PeerSessionState> {
        self.state.subscribe()
    }

    /// Dial `target` with `stream`.
    ///
    /// Returns `None` without failing when the session is not open and ready;
    /// callers gate on readiness. A refused dial is recorded as the session
    /// error.
    pub fn place_call(&self, target: &MeetingId, stream: MediaStream) -> Option<CallHandle> {
        let link = self.link.as_ref()?;
        if !self.state.borrow().ready {
            debug!(target: "call.peer", target_id = %target, "Dial before session ready, ignoring");
            return None;
        }

        match link.dial(target, stream) {
            Ok(call) => {
                info!(target: "call.peer", target_id = %target, "Outbound call placed");
                Some(call)
            }
            Err(e) => {
                warn!(target: "call.peer", target_id = %target, error = %e, "Outbound call refused");
                record_error(&self.state, e);
                None
            }
        }
    }

    /// Subscribe to inbound call offers, ending any previous subscription.
    #[must_use]
    pub fn subscribe_inbound(&self) -> InboundSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut slot = lock_slot(&self.inbound);
        slot.next_id += 1;
        let id = slot.next_id;
        if slot.current.replace((id, sender)).is_some() {
            debug!(target: "call.peer", "Previous inbound subscription superseded");
        }

        InboundSubscription {
            id,
            receiver,
            slot: Arc::clone(&self.inbound),
        }
    }

    /// Destroy the signaling link. Idempotent.
    pub fn close(&mut self) {
        self.cancel_token.cancel();
        lock_slot(&self.inbound).current = None;

        if let Some(link) = self.link.take() {
            link.destroy();
            self.state.send_if_modified(|state| std::mem::replace(&mut state.ready, false));
            info!(target: "call.peer", "Signaling session closed");
        }

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn record_error(state: &watch::Sender<PeerSessionState>, error: SignalingError) {
    metrics::record_signaling_error(error.kind());
    state.send_modify(|state| state.last_error = Some(error));
}

/// Forwards service events into session state and the inbound slot.
struct EventPump {
    events: mpsc::UnboundedReceiver<SignalingEvent>,
    state: watch::Sender<PeerSessionState>,
    inbound: Arc<Mutex<InboundSlot>>,
    cancel_token: CancellationToken,
}

impl EventPump {
    #[instrument(skip_all, name = "call.peer.pump")]
    async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,

                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            debug!(target: "call.peer", "Signaling event stream ended");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle_event(&self, event: SignalingEvent) {
        match event {
            SignalingEvent::Open(id) => {
                let assigned = self.state.send_if_modified(|state| {
                    if state.local_id.is_some() {
                        return false;
                    }
                    state.local_id = Some(id.clone());
                    state.ready = true;
                    true
                });
                if assigned {
                    info!(target: "call.peer", local_id = %id, "Signaling session ready");
                } else {
                    warn!(target: "call.peer", local_id = %id, "Identifier already assigned, ignoring");
                }
            }

            SignalingEvent::IncomingCall(offer) => {
                let undelivered = {
                    let slot = lock_slot(&self.inbound);
                    match &slot.current {
                        Some((_, sender)) => sender.send(offer).err().map(|e| e.0),
                        None => Some(offer),
                    }
                };

                if let Some(offer) = undelivered {
                    debug!(
                        target: "call.peer",
                        caller = %offer.caller(),
                        "No inbound subscriber, rejecting offer"
                    );
                    offer.reject();
                }
            }

            SignalingEvent::Error(e) => {
                warn!(target: "call.peer", error = %e, "Signaling session error");
                record_error(&self.state, e);
            }
        }
    }
}
