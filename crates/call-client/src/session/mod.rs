//! Call orchestration: the session actor, its status machine and snapshot.

pub mod actor;
pub mod messages;
pub mod snapshot;
pub mod status;

pub use actor::{CallSession, CallSessionHandle};
pub use messages::SessionMessage;
pub use snapshot::SessionSnapshot;
pub use status::{ConnectionStatus, StatusChange};
