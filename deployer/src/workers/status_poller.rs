//! Status poller worker, moves building deployments to live or failed

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::deploy::orchestrator::DeploymentOrchestrator;

/// Status poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the status poller worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &DeploymentOrchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Status poller starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Status poller shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        debug!("Polling building deployments...");
        match orchestrator.refresh_all().await {
            Ok(0) => {}
            Ok(changed) => info!("Updated {} deployment(s)", changed),
            Err(e) => error!("Status poll failed: {}", e),
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Status poller shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with poll
            }
        }
    }
}
