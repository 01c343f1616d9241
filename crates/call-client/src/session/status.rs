//! Connection status of a call session and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a call session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Waiting for the local stream and the signaling session.
    #[default]
    Initializing,
    /// Hosting; waiting for someone to call in.
    Waiting,
    /// A call is being placed or answered.
    Connecting,
    /// Remote media is flowing.
    Connected,
    /// The call closed or failed.
    Disconnected,
}

impl ConnectionStatus {
    /// Statuses in lifecycle order.
    pub const ALL: [ConnectionStatus; 5] = [
        ConnectionStatus::Initializing,
        ConnectionStatus::Waiting,
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
        ConnectionStatus::Disconnected,
    ];

    /// Lowercase name, also used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Initializing => "initializing",
            ConnectionStatus::Waiting => "waiting",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }

    /// Capitalized name for the status badge.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Initializing => "Initializing",
            ConnectionStatus::Waiting => "Waiting",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }

    /// Whether `next` is a legal successor.
    ///
    /// `Disconnected -> Connecting` exists for a host that answers a fresh
    /// inbound call after the previous one closed.
    #[must_use]
    pub const fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::{Connected, Connecting, Disconnected, Initializing, Waiting};

        matches!(
            (self, next),
            (Initializing, Waiting | Connecting)
                | (Waiting | Disconnected, Connecting)
                | (Connecting, Connected | Disconnected)
                | (Connected, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied transition, broadcast to status subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
}
