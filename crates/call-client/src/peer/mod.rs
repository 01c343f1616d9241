//! Signaling: the peer-connection seam, call handles and the per-session
//! signaling owner.

pub mod call;
pub mod session;
pub mod signaling;

pub use call::{CallEvent, CallHandle, CallLink, CallOffer, OfferResponder};
pub use session::{InboundSubscription, PeerSession, PeerSessionState};
pub use signaling::{SignalingChannel, SignalingEvent, SignalingLink, SignalingService};
