//! Observability for the call client.
//!
//! Tracing targets are per module (`call.session`, `call.media`, `call.peer`,
//! `call.loopback`, `call.home`, `call.demo`). Metric labels are bounded:
//! - `outcome`: success, error, answered, rejected
//! - `kind`: signaling error kinds (6 values)
//! - `status`: connection statuses (5 values)
//! - `direction`: inbound, outbound
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `call_media_acquisitions_total` | Counter | `outcome` | Local stream requests |
//! | `call_signaling_errors_total` | Counter | `kind` | Session and dial failures |
//! | `call_status_transitions_total` | Counter | `status` | Orchestrator transitions |
//! | `call_inbound_offers_total` | Counter | `outcome` | Inbound offer handling |
//! | `call_setup_duration_seconds` | Histogram | `direction` | Offer to remote stream |
//! | `call_sessions_active` | Gauge | none | Running call sessions |

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_call_setup_duration, record_inbound_offer,
    record_media_acquisition, record_signaling_error, record_status_transition,
    set_sessions_active,
};
