//! Per-identity sliding window rate limiter
//!
//! Accepted requests are remembered as instants in a per-identity window.
//! The outer map lock is only held long enough to find or create the window;
//! the check-and-record sequence runs under the window's own mutex so two
//! requests for the same identity are serialized while different identities
//! never contend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

/// Rate limiter settings
#[derive(Debug, Clone)]
pub struct RateLimitOptions {
    /// Trailing window length
    pub window: Duration,

    /// Maximum accepted requests per window
    pub max_requests: usize,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600), // 10 minutes
            max_requests: 5,
        }
    }
}

/// Ordered acceptance instants for one identity
#[derive(Debug, Default)]
pub struct RateWindow {
    accepted: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.accepted.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.accepted.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Sliding window admission gate
pub struct RateLimiter {
    options: RateLimitOptions,
    windows: RwLock<HashMap<String, Arc<Mutex<RateWindow>>>>,
}

impl RateLimiter {
    pub fn new(options: RateLimitOptions) -> Self {
        Self {
            options,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &RateLimitOptions {
        &self.options
    }

    /// Admit the identity if it has capacity left, recording the acceptance
    pub fn check_and_record(&self, identity: &str) -> bool {
        self.check_and_record_at(identity, Instant::now())
    }

    /// Same as [`check_and_record`](Self::check_and_record) at a given instant
    pub fn check_and_record_at(&self, identity: &str, now: Instant) -> bool {
        let window = self.window_for(identity);
        let mut window = window.lock().unwrap_or_else(|e| e.into_inner());

        window.prune(now, self.options.window);
        if window.len() >= self.options.max_requests {
            debug!(
                "Rate limit reached for {} ({} in {:?})",
                identity,
                window.len(),
                self.options.window
            );
            return false;
        }

        window.accepted.push_back(now);
        true
    }

    /// Time until the oldest acceptance leaves the window, when the identity
    /// is currently at capacity
    pub fn retry_after(&self, identity: &str) -> Option<Duration> {
        self.retry_after_at(identity, Instant::now())
    }

    pub fn retry_after_at(&self, identity: &str, now: Instant) -> Option<Duration> {
        let window = {
            let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
            windows.get(identity).cloned()?
        };
        let mut window = window.lock().unwrap_or_else(|e| e.into_inner());

        window.prune(now, self.options.window);
        if window.len() < self.options.max_requests {
            return None;
        }
        let oldest = *window.accepted.front()?;
        Some(self.options.window.saturating_sub(now.saturating_duration_since(oldest)))
    }

    /// Drop windows whose entries have all expired
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    pub fn purge_idle_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.write().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, window| {
            let mut window = window.lock().unwrap_or_else(|e| e.into_inner());
            window.prune(now, self.options.window);
            !window.is_empty()
        });
        before - windows.len()
    }

    /// Number of identities currently tracked
    pub fn tracked(&self) -> usize {
        let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
        windows.len()
    }

    fn window_for(&self, identity: &str) -> Arc<Mutex<RateWindow>> {
        {
            let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
            if let Some(window) = windows.get(identity) {
                return window.clone();
            }
        }

        let mut windows = self.windows.write().unwrap_or_else(|e| e.into_inner());
        windows
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RateWindow::default())))
            .clone()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitOptions::default())
    }
}
