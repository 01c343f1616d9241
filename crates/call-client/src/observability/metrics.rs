//! Metrics definitions for the call client.
//!
//! All metrics use the `call_` prefix, `_total` for counters and `_seconds`
//! for duration histograms. Recording without an installed recorder is a
//! no-op, so library users that never call [`init_metrics_recorder`] pay
//! nothing.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Returns error if a recorder is already installed or the buckets are
/// rejected.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Call setup spans a permission prompt and a network round trip
        .set_buckets_for_metric(
            Matcher::Prefix("call_setup".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set call setup buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Record a local stream acquisition.
///
/// Metric: `call_media_acquisitions_total`
/// Labels: `outcome` (success, error)
pub fn record_media_acquisition(outcome: &'static str) {
    counter!("call_media_acquisitions_total", "outcome" => outcome).increment(1);
}

/// Record a signaling failure.
///
/// Metric: `call_signaling_errors_total`
/// Labels: `kind` (bounded by `SignalingError::kind`)
pub fn record_signaling_error(kind: &'static str) {
    counter!("call_signaling_errors_total", "kind" => kind).increment(1);
}

/// Record an applied status transition.
///
/// Metric: `call_status_transitions_total`
/// Labels: `status` (the new status)
pub fn record_status_transition(status: &'static str) {
    counter!("call_status_transitions_total", "status" => status).increment(1);
}

/// Record how an inbound offer was handled.
///
/// Metric: `call_inbound_offers_total`
/// Labels: `outcome` (answered, rejected)
pub fn record_inbound_offer(outcome: &'static str) {
    counter!("call_inbound_offers_total", "outcome" => outcome).increment(1);
}

/// Record time from placing or answering a call to receiving remote media.
///
/// Metric: `call_setup_duration_seconds`
/// Labels: `direction` (inbound, outbound)
pub fn record_call_setup_duration(direction: &'static str, duration: Duration) {
    histogram!("call_setup_duration_seconds", "direction" => direction)
        .record(duration.as_secs_f64());
}

/// Set the number of running call sessions.
///
/// Metric: `call_sessions_active`
pub fn set_sessions_active(count: u64) {
    // Session counts stay far below 2^53
    #[allow(clippy::cast_precision_loss)]
    gauge!("call_sessions_active").set(count as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    type SnapshotEntry = (
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    );

    fn counter_value(snapshot: &[SnapshotEntry], name: &str, label: (&str, &str)) -> Option<u64> {
        snapshot.iter().find_map(|(key, _, _, value)| {
            let key = key.key();
            let labelled = key
                .labels()
                .any(|l| l.key() == label.0 && l.value() == label.1);
            match value {
                DebugValue::Counter(v) if key.name() == name && labelled => Some(*v),
                _ => None,
            }
        })
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_media_acquisition("success");
        record_signaling_error("network");
        record_status_transition("waiting");
        record_inbound_offer("answered");
        record_call_setup_duration("outbound", Duration::from_millis(120));
        set_sessions_active(3);
    }

    #[test]
    fn test_counters_are_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_media_acquisition("success");
            record_media_acquisition("success");
            record_media_acquisition("error");
            record_signaling_error("peer_unavailable");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(
                &snapshot,
                "call_media_acquisitions_total",
                ("outcome", "success")
            ),
            Some(2)
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "call_media_acquisitions_total",
                ("outcome", "error")
            ),
            Some(1)
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "call_signaling_errors_total",
                ("kind", "peer_unavailable")
            ),
            Some(1)
        );
    }

    #[test]
    fn test_setup_duration_and_gauge_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_call_setup_duration("inbound", Duration::from_millis(250));
            set_sessions_active(2);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let histogram = snapshot.iter().find_map(|(key, _, _, value)| match value {
            DebugValue::Histogram(values) if key.key().name() == "call_setup_duration_seconds" => {
                Some(values.len())
            }
            _ => None,
        });
        assert_eq!(histogram, Some(1));
        assert!(snapshot.iter().any(|(key, _, _, value)| {
            key.key().name() == "call_sessions_active" && *value == DebugValue::Gauge(2.0.into())
        }));
    }
}
