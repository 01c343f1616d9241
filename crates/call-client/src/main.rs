//! Call client demo
//!
//! Runs a host and a guest call session against the in-process loopback
//! collaborators:
//!
//! 1. Load configuration and initialize tracing and metrics
//! 2. Spawn the host session and wait for its invite link
//! 3. Resolve the invite link as a guest would and spawn the guest session
//! 4. Wait until both sides are connected (or timeout / Ctrl+C)
//! 5. End both calls and report

#![warn(clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use call_client::config::Config;
use call_client::loopback::{LoopbackSignaling, SyntheticCapture};
use call_client::observability;
use call_client::routes::{self, Route};
use call_client::session::{CallSession, CallSessionHandle, ConnectionStatus, SessionSnapshot};
use call_client::view::CallPageView;
use common::config::ObservabilityConfig;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Time allowed for sessions to tear down after `end_call`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    info!(target: "call.demo", config = ?config, "Starting call client demo");

    let prometheus_handle = observability::init_metrics_recorder().map_err(|e| anyhow!(e))?;

    let signaling = Arc::new(LoopbackSignaling::new());
    let capture = Arc::new(SyntheticCapture::new());
    let shutdown_token = CancellationToken::new();

    let (host, host_task) = CallSession::spawn(
        None,
        capture.clone(),
        signaling.clone(),
        config.default_profile,
        shutdown_token.child_token(),
    );

    let outcome = tokio::select! {
        result = run_demo(&config, &host, capture.clone(), signaling.clone(), &shutdown_token) => result,
        () = shutdown_signal() => {
            info!(target: "call.demo", "Shutdown signal received");
            Ok(())
        }
    };

    host.end_call();
    shutdown_token.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, host_task).await.is_err() {
        warn!(target: "call.demo", "Host session did not stop in time");
    }

    debug!(target: "call.demo", metrics = %prometheus_handle.render(), "Final metrics");

    if let Err(e) = &outcome {
        error!(target: "call.demo", error = %e, "Demo failed");
    }
    outcome
}

async fn run_demo(
    config: &Config,
    host: &CallSessionHandle,
    capture: Arc<SyntheticCapture>,
    signaling: Arc<LoopbackSignaling>,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<()> {
    let waiting = wait_for(host, config.demo_timeout, |s| {
        s.has_blocking_error() || (s.status == ConnectionStatus::Waiting && s.local_id.is_some())
    })
    .await
    .context("Host never started waiting")?;

    let invite = match CallPageView::from_snapshot(&waiting, &config.base_url) {
        CallPageView::Call(screen) => screen
            .invite_link
            .ok_or_else(|| anyhow!("Waiting host has no invite link"))?,
        CallPageView::Error(screen) => bail!("Host failed: {}", screen.message),
    };
    info!(target: "call.demo", invite_link = %invite, "Host is waiting");

    let Route::Call { target } = routes::join_route(&invite)? else {
        bail!("Invite link did not resolve to a call");
    };

    let (guest, guest_task) = CallSession::spawn(
        target,
        capture,
        signaling,
        config.default_profile,
        shutdown_token.child_token(),
    );

    let connected = |s: &SessionSnapshot| {
        s.has_blocking_error() || s.status == ConnectionStatus::Connected
    };
    let (host_snapshot, guest_snapshot) = tokio::try_join!(
        wait_for(host, config.demo_timeout, connected),
        wait_for(&guest, config.demo_timeout, connected),
    )
    .context("Sessions did not connect")?;

    for (role, snapshot) in [("host", &host_snapshot), ("guest", &guest_snapshot)] {
        let view = CallPageView::from_snapshot(snapshot, &config.base_url);
        info!(
            target: "call.demo",
            role,
            view = %serde_json::to_string(&view)?,
            "Call page"
        );
    }

    if host_snapshot.has_blocking_error() || guest_snapshot.has_blocking_error() {
        bail!("A session reported an error instead of connecting");
    }

    let route = guest.end_call();
    info!(target: "call.demo", navigate_to = %route, "Guest ended the call");

    if tokio::time::timeout(SHUTDOWN_GRACE, guest_task).await.is_err() {
        warn!(target: "call.demo", "Guest session did not stop in time");
    }

    let after = wait_for(host, config.demo_timeout, |s| {
        s.status == ConnectionStatus::Disconnected
    })
    .await?;
    info!(target: "call.demo", status = %after.status, "Host saw the call end");

    Ok(())
}

/// Wait until `predicate` holds for the session snapshot.
async fn wait_for(
    handle: &CallSessionHandle,
    timeout: Duration,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> anyhow::Result<SessionSnapshot> {
    let mut watch = handle.watch();
    let snapshot = tokio::time::timeout(timeout, watch.wait_for(predicate))
        .await
        .context("Timed out waiting for session state")?
        .context("Session ended")?
        .clone();
    Ok(snapshot)
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(target: "call.demo", error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
