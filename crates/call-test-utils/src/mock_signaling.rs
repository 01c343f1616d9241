//! Mock signaling service.
//!
//! The test plays the remote side. Every `connect` is recorded as a session;
//! the mock confirms it with an `Open` event unless told otherwise. Offers are
//! injected with [`MockSignaling::offer`], and dials show up as
//! [`MockRemoteCall`]s the test can answer, hang up or fail.
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::MockSignaling;
//!
//! let signaling = MockSignaling::builder()
//!     .with_local_id("host-1")
//!     .build();
//!
//! let remote = signaling.offer("guest-1");
//! remote.wait_for_phase(RemoteCallPhase::Answered).await;
//! remote.send_stream(test_stream());
//! ```

use call_client::errors::SignalingError;
use call_client::media::MediaStream;
use call_client::peer::{
    CallEvent, CallHandle, CallLink, CallOffer, OfferResponder, SignalingChannel, SignalingEvent,
    SignalingLink, SignalingService,
};
use common::types::MeetingId;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// How long `wait_for_*` helpers wait before failing the test.
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one call as seen from the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCallPhase {
    /// Offer sent (inbound) or dial received (outbound); nothing decided yet.
    Pending,
    /// The local side answered the offer.
    Answered,
    /// The local side rejected the offer.
    Rejected,
    /// The local side hung up.
    ClosedLocally,
    /// The test hung up or failed the call.
    ClosedRemotely,
}

impl RemoteCallPhase {
    fn is_final(self) -> bool {
        matches!(
            self,
            RemoteCallPhase::Rejected
                | RemoteCallPhase::ClosedLocally
                | RemoteCallPhase::ClosedRemotely
        )
    }
}

#[derive(Debug, Default)]
struct CallSlots {
    /// Sender for events delivered to the local `CallHandle`.
    to_local: Option<mpsc::UnboundedSender<CallEvent>>,
    /// Stream the local side sent (dialed or answered with).
    local_stream: Option<MediaStream>,
}

#[derive(Debug)]
struct CallShared {
    phase: watch::Sender<RemoteCallPhase>,
    slots: Mutex<CallSlots>,
}

impl CallShared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            phase: watch::channel(RemoteCallPhase::Pending).0,
            slots: Mutex::new(CallSlots::default()),
        })
    }

    fn slots(&self) -> MutexGuard<'_, CallSlots> {
        self.slots.lock().expect("call slots lock poisoned")
    }

    /// Move to a final phase unless already final.
    fn finish(&self, phase: RemoteCallPhase) {
        self.phase.send_if_modified(|current| {
            if current.is_final() {
                return false;
            }
            *current = phase;
            true
        });
        self.slots().to_local = None;
    }
}

/// Remote side of one call, driven by the test.
#[derive(Debug, Clone)]
pub struct MockRemoteCall {
    peer: MeetingId,
    shared: Arc<CallShared>,
}

impl MockRemoteCall {
    /// Identifier of the remote peer this call is with.
    #[must_use]
    pub fn peer(&self) -> &MeetingId {
        &self.peer
    }

    #[must_use]
    pub fn phase(&self) -> RemoteCallPhase {
        *self.shared.phase.borrow()
    }

    /// Stream the local side sent, once known.
    #[must_use]
    pub fn local_stream(&self) -> Option<MediaStream> {
        self.shared.slots().local_stream.clone()
    }

    /// Deliver remote media to the local side. Returns false when there is
    /// no open call to deliver to.
    pub fn send_stream(&self, stream: MediaStream) -> bool {
        self.send(CallEvent::Stream(stream))
    }

    /// Hang up from the remote side.
    pub fn close(&self) {
        self.send(CallEvent::Close);
        self.shared.finish(RemoteCallPhase::ClosedRemotely);
    }

    /// Fail the call from the remote side.
    pub fn fail(&self, message: &str) {
        self.send(CallEvent::Error(message.to_string()));
        self.shared.finish(RemoteCallPhase::ClosedRemotely);
    }

    /// Wait until the call reaches `phase`.
    ///
    /// # Panics
    ///
    /// Panics if the phase is not reached in time.
    pub async fn wait_for_phase(&self, phase: RemoteCallPhase) {
        let mut rx = self.shared.phase.subscribe();
        tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|p| *p == phase))
            .await
            .unwrap_or_else(|_| panic!("call never reached {phase:?}, at {:?}", self.phase()))
            .expect("phase sender lives in the call");
    }

    fn send(&self, event: CallEvent) -> bool {
        self.shared
            .slots()
            .to_local
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }
}

struct MockCallLink(Arc<CallShared>);

impl CallLink for MockCallLink {
    fn close(&self) {
        self.0.finish(RemoteCallPhase::ClosedLocally);
    }
}

struct MockResponder(Arc<CallShared>, MeetingId);

impl OfferResponder for MockResponder {
    fn answer(self: Box<Self>, stream: MediaStream) -> CallHandle {
        let MockResponder(shared, caller) = *self;
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut slots = shared.slots();
            slots.to_local = Some(tx);
            slots.local_stream = Some(stream);
        }
        shared.phase.send_replace(RemoteCallPhase::Answered);
        CallHandle::new(caller, rx, Box::new(MockCallLink(shared)))
    }

    fn reject(self: Box<Self>) {
        self.0.finish(RemoteCallPhase::Rejected);
    }
}

/// One recorded `connect`.
#[derive(Debug)]
struct SessionRecord {
    events: mpsc::UnboundedSender<SignalingEvent>,
    destroyed: bool,
}

#[derive(Debug, Default)]
struct State {
    sessions: Vec<SessionRecord>,
    dials: Vec<(MeetingId, MockRemoteCall)>,
    next_id: usize,
}

#[derive(Debug)]
struct Script {
    local_id: Option<MeetingId>,
    auto_open: bool,
    connect_error: Option<SignalingError>,
    dial_error: Option<SignalingError>,
}

/// Scriptable signaling service. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSignaling {
    script: Arc<Script>,
    state: Arc<Mutex<State>>,
}

impl MockSignaling {
    /// Create a new MockSignaling builder.
    #[must_use]
    pub fn builder() -> MockSignalingBuilder {
        MockSignalingBuilder::default()
    }

    /// Service that opens every session with a generated identifier.
    #[must_use]
    pub fn opening() -> Self {
        Self::builder().build()
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Whether the most recent session was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state()
            .sessions
            .last()
            .is_some_and(|session| session.destroyed)
    }

    /// Send `Open(id)` to the most recent session.
    pub fn open(&self, id: &str) {
        self.emit(SignalingEvent::Open(MeetingId::new(id)));
    }

    /// Send a session error to the most recent session.
    pub fn emit_error(&self, error: SignalingError) {
        self.emit(SignalingEvent::Error(error));
    }

    /// Offer a call from `from` to the most recent session.
    pub fn offer(&self, from: &str) -> MockRemoteCall {
        let from = MeetingId::new(from);
        let shared = CallShared::new();
        let offer = CallOffer::new(
            from.clone(),
            Box::new(MockResponder(Arc::clone(&shared), from.clone())),
        );
        self.emit(SignalingEvent::IncomingCall(offer));
        MockRemoteCall { peer: from, shared }
    }

    /// Targets dialed so far, oldest first.
    #[must_use]
    pub fn dialed(&self) -> Vec<MeetingId> {
        self.state()
            .dials
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// Remote side of the most recent dial.
    #[must_use]
    pub fn last_dial(&self) -> Option<MockRemoteCall> {
        self.state().dials.last().map(|(_, call)| call.clone())
    }

    /// Wait for the `n`th dial (1-based) and return its remote side.
    ///
    /// # Panics
    ///
    /// Panics if the dial does not happen in time.
    pub async fn wait_for_dial(&self, n: usize) -> MockRemoteCall {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                if let Some((_, call)) = self.state().dials.get(n - 1) {
                    return call.clone();
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("dial {n} never happened"))
    }

    fn emit(&self, event: SignalingEvent) {
        let state = self.state();
        let session = state
            .sessions
            .last()
            .expect("no signaling session connected yet");
        // A closed receiver means the session is gone; the event is dropped.
        let _ = session.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("signaling state lock poisoned")
    }
}

impl SignalingService for MockSignaling {
    fn connect(&self) -> SignalingChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        state.next_id += 1;

        if let Some(error) = &self.script.connect_error {
            let _ = tx.send(SignalingEvent::Error(error.clone()));
        } else if self.script.auto_open {
            let id = self
                .script
                .local_id
                .clone()
                .unwrap_or_else(|| MeetingId::new(format!("mock-peer-{}", state.next_id)));
            let _ = tx.send(SignalingEvent::Open(id));
        }

        state.sessions.push(SessionRecord {
            events: tx,
            destroyed: false,
        });
        let index = state.sessions.len() - 1;

        SignalingChannel {
            link: Arc::new(MockLink {
                index,
                script: Arc::clone(&self.script),
                state: Arc::clone(&self.state),
            }),
            events: rx,
        }
    }
}

struct MockLink {
    index: usize,
    script: Arc<Script>,
    state: Arc<Mutex<State>>,
}

impl SignalingLink for MockLink {
    fn dial(&self, target: &MeetingId, stream: MediaStream) -> Result<CallHandle, SignalingError> {
        let mut state = self.state.lock().expect("signaling state lock poisoned");
        if state.sessions.get(self.index).is_some_and(|s| s.destroyed) {
            return Err(SignalingError::SessionClosed);
        }
        if let Some(error) = &self.script.dial_error {
            return Err(error.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = CallShared::new();
        {
            let mut slots = shared.slots();
            slots.to_local = Some(tx);
            slots.local_stream = Some(stream);
        }
        state.dials.push((
            target.clone(),
            MockRemoteCall {
                peer: target.clone(),
                shared: Arc::clone(&shared),
            },
        ));

        Ok(CallHandle::new(
            target.clone(),
            rx,
            Box::new(MockCallLink(shared)),
        ))
    }

    fn destroy(&self) {
        let mut state = self.state.lock().expect("signaling state lock poisoned");
        if let Some(session) = state.sessions.get_mut(self.index) {
            session.destroyed = true;
        }
    }
}

/// Builder for MockSignaling configuration.
#[derive(Debug)]
pub struct MockSignalingBuilder {
    local_id: Option<MeetingId>,
    auto_open: bool,
    connect_error: Option<SignalingError>,
    dial_error: Option<SignalingError>,
}

impl Default for MockSignalingBuilder {
    fn default() -> Self {
        Self {
            local_id: None,
            auto_open: true,
            connect_error: None,
            dial_error: None,
        }
    }
}

impl MockSignalingBuilder {
    /// Open sessions with this identifier instead of a generated one.
    #[must_use]
    pub fn with_local_id(mut self, id: &str) -> Self {
        self.local_id = Some(MeetingId::new(id));
        self
    }

    /// Do not send `Open` on connect; the test calls `open` itself.
    #[must_use]
    pub fn without_auto_open(mut self) -> Self {
        self.auto_open = false;
        self
    }

    /// Answer every connect with this error instead of `Open`.
    #[must_use]
    pub fn fail_connect(mut self, error: SignalingError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Refuse every dial with this error.
    #[must_use]
    pub fn refuse_dials(mut self, error: SignalingError) -> Self {
        self.dial_error = Some(error);
        self
    }

    /// Build the MockSignaling.
    #[must_use]
    pub fn build(self) -> MockSignaling {
        MockSignaling {
            script: Arc::new(Script {
                local_id: self.local_id,
                auto_open: self.auto_open,
                connect_error: self.connect_error,
                dial_error: self.dial_error,
            }),
            state: Arc::new(Mutex::new(State::default())),
        }
    }
}
