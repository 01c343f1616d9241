//! `CallSession` - the call orchestrator actor.
//!
//! One actor per call page. It owns the [`DeviceStreamManager`], the
//! [`PeerSession`] and at most one [`CallHandle`], so every state change
//! happens inside its loop.
//!
//! # Lifecycle
//!
//! 1. Opens the signaling session and requests the local stream at the
//!    default profile
//! 2. Once both the stream and the signaling session are ready, picks one
//!    path: dial the target (join) or wait for an inbound offer (host)
//! 3. Drives the connection status from call events
//! 4. Tears down on cancellation ([`CallSessionHandle::end_call`]) or when
//!    every handle is dropped
//!
//! An error from either collaborator before step 2 halts orchestration for
//! good; status stays `initializing` and the error is published.

use super::messages::SessionMessage;
use super::snapshot::SessionSnapshot;
use super::status::{ConnectionStatus, StatusChange};
use crate::errors::CallError;
use crate::media::{DeviceStreamManager, MediaCapture, MediaQualityProfile, MediaStream};
use crate::observability::metrics;
use crate::peer::{
    CallEvent, CallHandle, CallOffer, InboundSubscription, PeerSession, PeerSessionState,
    SignalingService,
};
use crate::routes::Route;
use common::types::MeetingId;

use std::future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox size for UI commands.
const SESSION_CHANNEL_BUFFER: usize = 32;

/// Buffered status changes per subscriber before it starts lagging.
const STATUS_CHANNEL_CAPACITY: usize = 16;

static ACTIVE_SESSIONS: AtomicU64 = AtomicU64::new(0);

/// Handle to a `CallSession`.
#[derive(Clone, Debug)]
pub struct CallSessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    snapshot: watch::Receiver<SessionSnapshot>,
    status_events: broadcast::Sender<StatusChange>,
    cancel_token: CancellationToken,
}

impl CallSessionHandle {
    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshot changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribe to applied status transitions.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusChange> {
        self.status_events.subscribe()
    }

    /// Flip the microphone. No-op while the first stream is being acquired.
    pub async fn toggle_audio(&self) -> Result<bool, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::ToggleAudio { respond_to: tx })
            .await?;
        rx.await.map_err(|_| CallError::SessionEnded)
    }

    /// Flip the camera. No-op while the first stream is being acquired.
    pub async fn toggle_video(&self) -> Result<bool, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::ToggleVideo { respond_to: tx })
            .await?;
        rx.await.map_err(|_| CallError::SessionEnded)
    }

    /// Re-acquire the local stream at `profile`.
    ///
    /// Only the local stream is replaced; an established call keeps the
    /// stream it was set up with.
    ///
    /// # Errors
    ///
    /// `AcquisitionInFlight` while the first stream is pending, `Capture`
    /// when the new request fails, `SessionEnded` after teardown. Once a
    /// capture or signaling error has stopped the call from starting, that
    /// error is returned and the devices are left alone.
    pub async fn change_quality(&self, profile: MediaQualityProfile) -> Result<(), CallError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::ChangeQuality {
            profile,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| CallError::SessionEnded)?
    }

    /// End the session and return where to navigate.
    ///
    /// Teardown happens on the actor; this returns at once.
    pub fn end_call(&self) -> Route {
        self.cancel_token.cancel();
        Route::Home
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: SessionMessage) -> Result<(), CallError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| CallError::SessionEnded)
    }
}

/// Which side set up the current call, for setup timing.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// The `CallSession` actor.
pub struct CallSession {
    target: Option<MeetingId>,
    devices: DeviceStreamManager,
    peer: PeerSession,
    peer_state: watch::Receiver<PeerSessionState>,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    snapshot: watch::Sender<SessionSnapshot>,
    status_events: broadcast::Sender<StatusChange>,
    status: ConnectionStatus,
    call: Option<CallHandle>,
    call_setup: Option<(Instant, Direction)>,
    remote_stream: Option<MediaStream>,
    inbound: Option<InboundSubscription>,
    started: bool,
    halted: bool,
}

impl CallSession {
    /// Spawn a call session.
    ///
    /// `target` selects the path: `Some` joins that call, `None` hosts a new
    /// one. Returns a handle and the task join handle.
    pub fn spawn(
        target: Option<MeetingId>,
        capture: Arc<dyn MediaCapture>,
        signaling: Arc<dyn SignalingService>,
        default_profile: MediaQualityProfile,
        cancel_token: CancellationToken,
    ) -> (CallSessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::new(target.clone(), default_profile));
        let (status_events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        let peer = PeerSession::new(cancel_token.child_token());
        let actor = Self {
            target,
            devices: DeviceStreamManager::with_default_profile(capture, default_profile),
            peer_state: peer.watch(),
            peer,
            receiver,
            cancel_token: cancel_token.clone(),
            snapshot: snapshot_tx,
            status_events: status_events.clone(),
            status: ConnectionStatus::Initializing,
            call: None,
            call_setup: None,
            remote_stream: None,
            inbound: None,
            started: false,
            halted: false,
        };

        let task_handle = tokio::spawn(actor.run(signaling));

        let handle = CallSessionHandle {
            sender,
            snapshot: snapshot_rx,
            status_events,
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "call.session",
        fields(role = if self.target.is_some() { "guest" } else { "host" })
    )]
    async fn run(mut self, signaling: Arc<dyn SignalingService>) {
        metrics::set_sessions_active(ACTIVE_SESSIONS.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(target: "call.session", target_id = ?self.target, "CallSession started");

        self.peer.open(signaling.as_ref());

        if self.acquire_initial_stream().await {
            self.run_loop().await;
        }

        self.teardown();
        metrics::set_sessions_active(
            ACTIVE_SESSIONS
                .fetch_sub(1, Ordering::SeqCst)
                .saturating_sub(1),
        );
        info!(target: "call.session", status = %self.status, "CallSession stopped");
    }

    /// Wait for the first local stream while still answering commands and
    /// tracking the signaling session. Returns false when cancelled first;
    /// the pending request is dropped so a late grant is never applied.
    async fn acquire_initial_stream(&mut self) -> bool {
        {
            let acquisition = self.devices.acquire_default();
            tokio::pin!(acquisition);

            loop {
                tokio::select! {
                    () = self.cancel_token.cancelled() => {
                        debug!(target: "call.session", "Cancelled during local stream acquisition");
                        return false;
                    }

                    _ = &mut acquisition => break,

                    msg = self.receiver.recv() => match msg {
                        Some(message) => reply_while_acquiring(message, &self.snapshot),
                        None => {
                            debug!(target: "call.session", "All handles dropped during acquisition");
                            return false;
                        }
                    },

                    Ok(()) = self.peer_state.changed() => {
                        let peer = self.peer_state.borrow_and_update().clone();
                        self.snapshot.send_modify(|s| s.apply_peer(&peer));
                    }
                }
            }
        }

        let local = self.devices.state().clone();
        self.snapshot.send_modify(|s| {
            s.acquiring = false;
            s.apply_local(&local);
        });
        true
    }

    async fn run_loop(&mut self) {
        loop {
            self.try_start();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "call.session", "CallSession received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => match msg {
                    Some(message) => self.handle_message(message).await,
                    None => {
                        debug!(target: "call.session", "All handles dropped, ending session");
                        break;
                    }
                },

                Ok(()) = self.peer_state.changed() => self.on_peer_state_changed(),

                offer = next_offer(&mut self.inbound) => match offer {
                    Some(offer) => self.handle_offer(offer),
                    None => self.inbound = None,
                },

                event = next_call_event(&mut self.call) => self.handle_call_event(event),
            }
        }
    }

    /// Choose the call path once the stream and the signaling session are
    /// both ready. Runs at most once per session.
    fn try_start(&mut self) {
        if self.started || self.halted {
            return;
        }

        let peer = self.peer_state.borrow().clone();
        let local = self.devices.state();
        if let Some(error) = local.last_error() {
            warn!(target: "call.session", error = %error, "Capture failed, call will not start");
            self.halted = true;
            return;
        }
        if let Some(error) = peer.last_error() {
            warn!(target: "call.session", error = %error, "Signaling failed, call will not start");
            self.halted = true;
            return;
        }

        let Some(stream) = local.stream().cloned() else {
            return;
        };
        if !peer.ready() {
            return;
        }
        self.started = true;

        match self.target.clone() {
            Some(target) => {
                info!(target: "call.session", target_id = %target, "Joining call");
                self.transition(ConnectionStatus::Connecting);
                if let Some(call) = self.peer.place_call(&target, stream) {
                    self.call = Some(call);
                    self.call_setup = Some((Instant::now(), Direction::Outbound));
                }
            }
            None => {
                info!(
                    target: "call.session",
                    local_id = ?peer.local_id(),
                    "Hosting call, waiting for peer"
                );
                self.transition(ConnectionStatus::Waiting);
                self.inbound = Some(self.peer.subscribe_inbound());
            }
        }
    }

    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::ToggleAudio { respond_to } => {
                let enabled = self.devices.toggle_audio();
                self.publish();
                let _ = respond_to.send(enabled);
            }

            SessionMessage::ToggleVideo { respond_to } => {
                let enabled = self.devices.toggle_video();
                self.publish();
                let _ = respond_to.send(enabled);
            }

            SessionMessage::ChangeQuality {
                profile,
                respond_to,
            } => {
                if self.halted {
                    debug!(target: "call.session", "Call halted, refusing quality change");
                    let _ = respond_to.send(Err(self.halt_error()));
                    return;
                }

                let acquired = tokio::select! {
                    () = self.cancel_token.cancelled() => {
                        let _ = respond_to.send(Err(CallError::SessionEnded));
                        return;
                    }
                    stream = self.devices.change_quality(profile) => stream.is_some(),
                };
                self.publish();

                let result = if acquired {
                    Ok(())
                } else {
                    Err(self.devices.state().last_error().cloned().map_or_else(
                        || CallError::Internal("acquisition failed without error".to_string()),
                        CallError::Capture,
                    ))
                };
                let _ = respond_to.send(result);
            }
        }
    }

    /// The error that stopped the call from starting. It stays on the
    /// snapshot until teardown.
    fn halt_error(&self) -> CallError {
        if let Some(error) = self.devices.state().last_error() {
            return CallError::Capture(error.clone());
        }
        self.peer_state
            .borrow()
            .last_error()
            .cloned()
            .map_or(CallError::SessionEnded, CallError::Signaling)
    }

    fn on_peer_state_changed(&mut self) {
        let peer = self.peer_state.borrow_and_update().clone();
        self.snapshot.send_modify(|s| s.apply_peer(&peer));
    }

    fn handle_offer(&mut self, offer: CallOffer) {
        match self.status {
            ConnectionStatus::Waiting | ConnectionStatus::Disconnected => {
                let Some(stream) = self.devices.stream().cloned() else {
                    warn!(
                        target: "call.session",
                        caller = %offer.caller(),
                        "No local stream to answer with, rejecting offer"
                    );
                    metrics::record_inbound_offer("rejected");
                    offer.reject();
                    return;
                };

                info!(target: "call.session", caller = %offer.caller(), "Answering inbound call");
                self.transition(ConnectionStatus::Connecting);
                self.call = Some(offer.answer(stream));
                self.call_setup = Some((Instant::now(), Direction::Inbound));
                metrics::record_inbound_offer("answered");
            }

            status => {
                warn!(
                    target: "call.session",
                    caller = %offer.caller(),
                    status = %status,
                    "Already in a call, rejecting offer"
                );
                metrics::record_inbound_offer("rejected");
                offer.reject();
            }
        }
    }

    fn handle_call_event(&mut self, event: Option<CallEvent>) {
        match event {
            Some(CallEvent::Stream(remote)) => {
                if let Some((started, direction)) = self.call_setup.take() {
                    metrics::record_call_setup_duration(direction.as_str(), started.elapsed());
                }
                info!(target: "call.session", remote_stream = %remote.id(), "Remote stream received");
                self.remote_stream = Some(remote);
                self.transition(ConnectionStatus::Connected);
            }

            Some(CallEvent::Error(message)) => {
                warn!(target: "call.session", error = %message, "Call failed");
                self.drop_call();
            }

            Some(CallEvent::Close) | None => {
                info!(target: "call.session", "Call closed");
                self.drop_call();
            }
        }
    }

    fn drop_call(&mut self) {
        self.call = None;
        self.call_setup = None;
        self.remote_stream = None;
        self.transition(ConnectionStatus::Disconnected);
    }

    fn transition(&mut self, next: ConnectionStatus) {
        let from = self.status;
        if !from.can_transition_to(next) {
            warn!(
                target: "call.session",
                from = %from,
                to = %next,
                "Ignoring invalid status transition"
            );
            return;
        }

        self.status = next;
        metrics::record_status_transition(next.as_str());
        debug!(target: "call.session", from = %from, to = %next, "Status changed");
        // No subscribers is fine.
        let _ = self.status_events.send(StatusChange { from, to: next });
        self.publish();
    }

    /// Publish the full snapshot.
    fn publish(&self) {
        let local = self.devices.state();
        let peer = self.peer_state.borrow().clone();
        self.snapshot.send_modify(|s| {
            s.status = self.status;
            s.apply_local(local);
            s.apply_peer(&peer);
            s.remote_stream.clone_from(&self.remote_stream);
        });
    }

    fn teardown(&mut self) {
        if let Some(mut call) = self.call.take() {
            call.close();
        }
        self.inbound = None;
        self.remote_stream = None;
        self.devices.release();
        self.peer.close();

        self.publish();
        self.snapshot.send_modify(|s| {
            s.acquiring = false;
            s.ended = true;
        });
    }
}

/// Commands that arrive before the first stream is granted.
fn reply_while_acquiring(message: SessionMessage, snapshot: &watch::Sender<SessionSnapshot>) {
    match message {
        SessionMessage::ToggleAudio { respond_to } => {
            let _ = respond_to.send(snapshot.borrow().audio_enabled);
        }
        SessionMessage::ToggleVideo { respond_to } => {
            let _ = respond_to.send(snapshot.borrow().video_enabled);
        }
        SessionMessage::ChangeQuality { respond_to, .. } => {
            let _ = respond_to.send(Err(CallError::AcquisitionInFlight));
        }
    }
}

async fn next_offer(inbound: &mut Option<InboundSubscription>) -> Option<CallOffer> {
    match inbound {
        Some(subscription) => subscription.recv().await,
        None => future::pending().await,
    }
}

async fn next_call_event(call: &mut Option<CallHandle>) -> Option<CallEvent> {
    match call {
        Some(call) => call.next_event().await,
        None => future::pending().await,
    }
}
