//! Minimum spacing between repeated calls.

use std::future::Future;
use std::time::{Duration, Instant};

pub const COMPONENT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Admits the call and records `now` unless the previous admitted call is
    /// less than `min_interval` ago.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// The next call is admitted regardless of timing.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Wraps a component so that its operations run at most once per interval.
#[derive(Debug)]
pub struct Throttled<T> {
    inner: T,
    throttle: Throttle,
}

impl<T> Throttled<T> {
    pub fn new(inner: T, min_interval: Duration) -> Self {
        Self {
            inner,
            throttle: Throttle::new(min_interval),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Access that bypasses the throttle, for configuration changes.
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn reset(&mut self) {
        self.throttle.reset();
    }

    /// Runs `operation` if the throttle admits it, `None` otherwise.
    pub async fn call<'a, F, Fut, R>(&'a mut self, operation: F) -> Option<R>
    where
        F: FnOnce(&'a mut T) -> Fut,
        Fut: Future<Output = R> + 'a,
    {
        if !self.throttle.try_acquire(Instant::now()) {
            return None;
        }
        Some(operation(&mut self.inner).await)
    }
}
