//! Observability and Metrics
//!
//! Atomic counters for sessions, framing and dispatch. A `Metrics` value is
//! shared through an `Arc` by the sessions of one server (or one test); there is
//! no process-wide instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total sessions started
    pub sessions_total: AtomicU64,
    /// Sessions currently running
    pub sessions_active: AtomicU64,
    /// Sessions ended by a framing error
    pub sessions_failed: AtomicU64,
    /// Packages produced by the decoder
    pub packages_decoded: AtomicU64,
    /// Packages written to the transport
    pub packages_sent: AtomicU64,
    /// Raw bytes read from the transport
    pub bytes_received: AtomicU64,
    /// Encoded bytes written to the transport
    pub bytes_sent: AtomicU64,
    /// Frames rejected for declaring an oversized body
    pub oversized_rejections: AtomicU64,
    /// Packages dispatched to a handler
    pub packages_dispatched: AtomicU64,
    /// Packages with no matching route
    pub dispatch_misses: AtomicU64,
    /// Handler invocations that returned an error or panicked
    pub handler_failures: AtomicU64,
    /// Queued packages skipped because the session was closing
    pub dispatches_cancelled: AtomicU64,
    /// Times the reader stalled on a full dispatch queue
    pub backpressure_stalls: AtomicU64,
    /// Connections refused at the connection limit
    pub connections_refused: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            packages_decoded: AtomicU64::new(0),
            packages_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            oversized_rejections: AtomicU64::new(0),
            packages_dispatched: AtomicU64::new(0),
            dispatch_misses: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            dispatches_cancelled: AtomicU64::new(0),
            backpressure_stalls: AtomicU64::new(0),
            connections_refused: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn session_started(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_ended(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn package_decoded(&self) {
        self.packages_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a package written to the transport
    pub fn package_sent(&self, byte_count: u64) {
        self.packages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn oversized_rejection(&self) {
        self.oversized_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn package_dispatched(&self) {
        self.packages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatch_miss(&self) {
        self.dispatch_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatch_cancelled(&self) {
        self.dispatches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backpressure_stall(&self) {
        self.backpressure_stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_refused(&self) {
        self.connections_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            packages_decoded: self.packages_decoded.load(Ordering::Relaxed),
            packages_sent: self.packages_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            oversized_rejections: self.oversized_rejections.load(Ordering::Relaxed),
            packages_dispatched: self.packages_dispatched.load(Ordering::Relaxed),
            dispatch_misses: self.dispatch_misses.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            dispatches_cancelled: self.dispatches_cancelled.load(Ordering::Relaxed),
            backpressure_stalls: self.backpressure_stalls.load(Ordering::Relaxed),
            connections_refused: self.connections_refused.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_active = snapshot.sessions_active,
            sessions_failed = snapshot.sessions_failed,
            packages_decoded = snapshot.packages_decoded,
            packages_sent = snapshot.packages_sent,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            oversized_rejections = snapshot.oversized_rejections,
            packages_dispatched = snapshot.packages_dispatched,
            dispatch_misses = snapshot.dispatch_misses,
            handler_failures = snapshot.handler_failures,
            dispatches_cancelled = snapshot.dispatches_cancelled,
            backpressure_stalls = snapshot.backpressure_stalls,
            connections_refused = snapshot.connections_refused,
            uptime_seconds = snapshot.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub sessions_failed: u64,
    pub packages_decoded: u64,
    pub packages_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub oversized_rejections: u64,
    pub packages_dispatched: u64,
    pub dispatch_misses: u64,
    pub handler_failures: u64,
    pub dispatches_cancelled: u64,
    pub backpressure_stalls: u64,
    pub connections_refused: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration, logged at debug level on drop
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
