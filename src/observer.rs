/// Observer hooks surfaced to an external monitor (§6, §9).
///
/// Kept as an injected `Arc<dyn Observer>` dependency passed at
/// construction time rather than a process-wide singleton: the monitoring
/// plumbing itself (metrics export, alerting) is out of scope (§1), but the
/// integration point for it is not.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ErrorClass;

/// Hook surface invoked by `ClientList`, `DirectClient`, the subscriber, and
/// the distributed lock.
pub trait Observer: Send + Sync {
    /// A `ClientList` successfully built a client for `host`.
    fn on_created(&self, _host: &str) {}
    /// A `ClientList` member transitioned to unavailable.
    fn on_closed(&self, _host: &str) {}
    /// A previously-unavailable `ClientList` member was rebuilt successfully.
    fn on_recovered(&self, _host: &str) {}

    /// An operation completed (successfully or not) and should be counted
    /// under `class`.
    fn record_error(&self, _class: ErrorClass) {}
    /// An operation exceeded the slow-call threshold.
    fn record_slow_call(&self, _operation: &str, _elapsed_ms: u64) {}

    /// A publish attempt failed at the transport level.
    fn record_publish_error(&self) {}
    /// A publish succeeded but reached zero subscribers.
    fn record_publish_no_subscriber(&self) {}
    /// A publish succeeded and reached at least one subscriber.
    fn record_publish_count(&self, _receivers: i64) {}

    /// A `tryLock` call succeeded.
    fn record_lock_success(&self) {}
    /// A `tryLock` call exhausted its wait budget.
    fn record_lock_fail(&self) {}
    /// A `tryLock` or `unlock` call errored at the transport level.
    fn record_lock_error(&self) {}
    /// An `unlock` call deleted the key it owned.
    fn record_unlock_success(&self, held_ms: u64) {
        let _ = held_ms;
    }
    /// An `unlock` call found the token mismatched (lock already lost).
    fn record_unlock_lost(&self) {}
}

/// Default observer: every hook is a no-op. Used when the caller does not
/// wire in their own monitoring.
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// In-process atomic counters, useful for tests and for applications that
/// just want simple counters without a full metrics pipeline.
#[derive(Default)]
pub struct CountingObserver {
    pub created: AtomicU64,
    pub closed: AtomicU64,
    pub recovered: AtomicU64,
    pub illegal_argument: AtomicU64,
    pub illegal_state: AtomicU64,
    pub timeout: AtomicU64,
    pub redis_error: AtomicU64,
    pub key_not_found: AtomicU64,
    pub unexpected_error: AtomicU64,
    pub slow_calls: AtomicU64,
    pub publish_error: AtomicU64,
    pub publish_no_subscriber: AtomicU64,
    pub publish_count: AtomicU64,
    pub lock_success: AtomicU64,
    pub lock_fail: AtomicU64,
    pub lock_error: AtomicU64,
    pub unlock_success: AtomicU64,
    pub unlock_lost: AtomicU64,
    pub total_holding_time_ms: AtomicU64,
    pub max_holding_time_ms: AtomicU64,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for CountingObserver {
    fn on_created(&self, _host: &str) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn on_closed(&self, _host: &str) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_recovered(&self, _host: &str) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, class: ErrorClass) {
        let counter = match class {
            ErrorClass::IllegalArgument => &self.illegal_argument,
            ErrorClass::IllegalState => &self.illegal_state,
            ErrorClass::Timeout => &self.timeout,
            ErrorClass::RedisError => &self.redis_error,
            ErrorClass::KeyNotFound => &self.key_not_found,
            ErrorClass::UnexpectedError => &self.unexpected_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_slow_call(&self, _operation: &str, _elapsed_ms: u64) {
        self.slow_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_publish_error(&self) {
        self.publish_error.fetch_add(1, Ordering::Relaxed);
    }

    fn record_publish_no_subscriber(&self) {
        self.publish_no_subscriber.fetch_add(1, Ordering::Relaxed);
    }

    fn record_publish_count(&self, receivers: i64) {
        if receivers > 0 {
            self.publish_count.fetch_add(receivers as u64, Ordering::Relaxed);
        }
    }

    fn record_lock_success(&self) {
        self.lock_success.fetch_add(1, Ordering::Relaxed);
    }

    fn record_lock_fail(&self) {
        self.lock_fail.fetch_add(1, Ordering::Relaxed);
    }

    fn record_lock_error(&self) {
        self.lock_error.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unlock_success(&self, held_ms: u64) {
        self.unlock_success.fetch_add(1, Ordering::Relaxed);
        self.total_holding_time_ms.fetch_add(held_ms, Ordering::Relaxed);
        self.max_holding_time_ms.fetch_max(held_ms, Ordering::Relaxed);
    }

    fn record_unlock_lost(&self) {
        self.unlock_lost.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_observer_tallies_lifecycle_events() {
        let observer = CountingObserver::new();
        observer.on_created("h1");
        observer.on_closed("h1");
        observer.on_recovered("h1");
        assert_eq!(observer.created.load(Ordering::Relaxed), 1);
        assert_eq!(observer.closed.load(Ordering::Relaxed), 1);
        assert_eq!(observer.recovered.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn counting_observer_tallies_error_classes() {
        let observer = CountingObserver::new();
        observer.record_error(ErrorClass::Timeout);
        observer.record_error(ErrorClass::Timeout);
        observer.record_error(ErrorClass::KeyNotFound);
        assert_eq!(observer.timeout.load(Ordering::Relaxed), 2);
        assert_eq!(observer.key_not_found.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn counting_observer_tracks_lock_holding_time() {
        let observer = CountingObserver::new();
        observer.record_unlock_success(50);
        observer.record_unlock_success(120);
        assert_eq!(observer.unlock_success.load(Ordering::Relaxed), 2);
        assert_eq!(observer.total_holding_time_ms.load(Ordering::Relaxed), 170);
        assert_eq!(observer.max_holding_time_ms.load(Ordering::Relaxed), 120);
    }
}
