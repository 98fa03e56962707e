use {
    super::lifecycle::LifecycleEngine,
    chrono::Utc,
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Time-box PENDING payments: every tick, drive overdue ones to EXPIRED
/// through the engine's CAS path. A webhook landing moments earlier simply
/// wins the CAS and the candidate is skipped.
pub async fn run_sweeper(
    engine: Arc<LifecycleEngine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "expiration sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("expiration sweeper shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match engine.sweep_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "expired stale payments"),
            Err(e) => tracing::error!(error = %e, "sweep pass failed"),
        }
    }
}
