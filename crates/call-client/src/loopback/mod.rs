//! In-process stand-ins for the signaling service and the capture device.
//!
//! Both run the full call flow without a browser: the demo binary and the
//! end-to-end tests connect two sessions through one [`LoopbackSignaling`]
//! hub and feed them streams from a [`SyntheticCapture`].

pub mod capture;
pub mod signaling;

pub use capture::SyntheticCapture;
pub use signaling::LoopbackSignaling;
