//! Maintenance worker, drops idle rate limit windows

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::ratelimit::RateLimiter;

/// Maintenance worker options
#[derive(Debug, Clone)]
pub struct Options {
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

/// Run the maintenance worker
pub async fn run<S, F>(
    options: &Options,
    rate_limiter: &RateLimiter,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Maintenance worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Maintenance worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let purged = rate_limiter.purge_idle();
        if purged > 0 {
            debug!(
                "Purged {} idle rate window(s), {} still tracked",
                purged,
                rate_limiter.tracked()
            );
        }
    }
}
