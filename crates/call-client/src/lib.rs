//! Peer-to-peer call client core.
//!
//! Everything a video call page needs apart from rendering and the
//! collaborators themselves:
//!
//! - [`media`] - local camera/microphone stream at a quality profile
//! - [`peer`] - the signaling session: identifier, inbound offers, dialing
//! - [`session`] - the call orchestrator actor and its connection status
//! - [`meeting_code`] - free-form meeting code resolution
//! - [`routes`] and [`view`] - navigation and what each page shows
//! - [`home`] - the home page model
//! - [`loopback`] - in-process capture and signaling
//!
//! # Architecture
//!
//! ```text
//! CallSession (actor, one per call page)
//! ├── DeviceStreamManager ── MediaCapture (collaborator)
//! ├── PeerSession ────────── SignalingService (collaborator)
//! │   └── event pump task
//! └── CallHandle (zero or one)
//! ```
//!
//! The actor publishes a [`session::SessionSnapshot`] through a watch channel;
//! [`view::CallPageView`] derives the page from it.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod errors;
pub mod home;
pub mod loopback;
pub mod media;
pub mod meeting_code;
pub mod observability;
pub mod peer;
pub mod routes;
pub mod session;
pub mod view;
