//! Graceful shutdown management for replay

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info};

/// Shared shutdown flag between the signal handler, the reader and the worker
#[derive(Debug)]
pub struct ShutdownState {
    /// Whether shutdown has been initiated
    shutting_down: AtomicBool,
    /// Whether the worker has drained the channel
    shutdown_complete: AtomicBool,
    /// Events sent to the worker but not yet applied
    inflight_events: AtomicUsize,
    /// Shutdown initiated timestamp
    shutdown_start: Mutex<Option<Instant>>,
    notify: Notify,
}

impl ShutdownState {
    /// Create a new shutdown state
    pub fn new() -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            shutdown_complete: AtomicBool::new(false),
            inflight_events: AtomicUsize::new(0),
            shutdown_start: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Begin the shutdown process and wake everything waiting on it
    pub fn begin_shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shutdown_start.lock() = Some(Instant::now());
        self.notify.notify_waiters();
        info!("Shutdown initiated");
    }

    /// Check if shutdown is in progress
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has begun
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_shutting_down() {
                return;
            }
            notified.await;
        }
    }

    /// Mark the replay as finished
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::SeqCst);
        if let Some(duration) = self.shutdown_duration() {
            info!("Shutdown completed in {:?}", duration);
        }
    }

    /// Check if shutdown is complete
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::SeqCst)
    }

    /// Add an in-flight event
    pub fn add_inflight_event(&self) {
        let count = self.inflight_events.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("In-flight events: {}", count);
    }

    /// Remove an in-flight event
    pub fn remove_inflight_event(&self) {
        let _ = self
            .inflight_events
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Get the count of in-flight events
    pub fn inflight_count(&self) -> usize {
        self.inflight_events.load(Ordering::Relaxed)
    }

    /// Get the duration since shutdown started
    pub fn shutdown_duration(&self) -> Option<Duration> {
        let start = *self.shutdown_start.lock();
        start.map(|start| start.elapsed())
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
