//! Metrics collection for SASL authentication

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::protocol::errors::ErrorCode;

/// Authentication metrics collector
#[derive(Debug, Default)]
pub struct AuthMetrics {
    pub authentications_started: AtomicU64,
    pub authentications_succeeded: AtomicU64,
    pub authentications_failed: AtomicU64,
    pub requests_sent: AtomicU64,
    pub responses_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    error_codes: Mutex<HashMap<ErrorCode, u64>>,
}

impl AuthMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_authentication_started(&self) {
        self.authentications_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authentication_succeeded(&self) {
        self.authentications_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authentication_failed(&self) {
        self.authentications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded response and the error codes it carried
    pub fn record_response(&self, error_counts: &HashMap<ErrorCode, usize>) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
        let mut codes = self.error_codes.lock();
        for (code, count) in error_counts {
            *codes.entry(*code).or_insert(0) += *count as u64;
        }
    }

    pub fn record_bytes_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> AuthMetricsSnapshot {
        AuthMetricsSnapshot {
            authentications_started: self.authentications_started.load(Ordering::Relaxed),
            authentications_succeeded: self.authentications_succeeded.load(Ordering::Relaxed),
            authentications_failed: self.authentications_failed.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            error_codes: self.error_codes.lock().clone(),
        }
    }
}

/// Point-in-time copy of [`AuthMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMetricsSnapshot {
    pub authentications_started: u64,
    pub authentications_succeeded: u64,
    pub authentications_failed: u64,
    pub requests_sent: u64,
    pub responses_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub error_codes: HashMap<ErrorCode, u64>,
}

impl AuthMetricsSnapshot {
    /// Fraction of finished authentications that failed
    pub fn failure_rate(&self) -> f64 {
        let finished = self.authentications_succeeded + self.authentications_failed;
        if finished == 0 {
            0.0
        } else {
            self.authentications_failed as f64 / finished as f64
        }
    }
}

static GLOBAL_METRICS: Lazy<Arc<AuthMetrics>> = Lazy::new(|| Arc::new(AuthMetrics::new()));

/// Process-wide metrics shared by authenticators that were not given their own
pub fn global_metrics() -> Arc<AuthMetrics> {
    GLOBAL_METRICS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = AuthMetrics::new();
        metrics.record_authentication_started();
        metrics.record_authentication_started();
        metrics.record_authentication_succeeded();
        metrics.record_authentication_failed();
        metrics.record_bytes_sent(100);
        metrics.record_bytes_received(40);

        let mut counts = HashMap::new();
        counts.insert(ErrorCode::None, 2);
        metrics.record_response(&counts);
        metrics.record_response(&counts);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.authentications_started, 2);
        assert_eq!(snapshot.bytes_sent, 100);
        assert_eq!(snapshot.bytes_received, 40);
        assert_eq!(snapshot.responses_received, 2);
        assert_eq!(snapshot.error_codes.get(&ErrorCode::None), Some(&4));
        assert_eq!(snapshot.failure_rate(), 0.5);
    }

    #[test]
    fn test_global_metrics_is_shared() {
        assert!(Arc::ptr_eq(&global_metrics(), &global_metrics()));
    }
}
