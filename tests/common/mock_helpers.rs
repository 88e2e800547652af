//! Recording collaborators for observing pipelines from tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use streamable_rs::{ProgressReport, ProgressReporter};

/// Reporter keeping every report it receives
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ProgressReport>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<ProgressReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, report: &ProgressReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
    }
}

/// Counts work functions currently running and started overall
#[derive(Debug, Default)]
pub struct LiveCounter {
    active: AtomicUsize,
    started: AtomicUsize,
}

impl LiveCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark a work function as running until the guard is dropped
    pub fn enter(self: &Arc<Self>) -> LiveGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);
        LiveGuard {
            counter: self.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

pub struct LiveGuard {
    counter: Arc<LiveCounter>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Records the instant of each call
#[derive(Debug, Default)]
pub struct Timestamps {
    instants: Mutex<Vec<Instant>>,
}

impl Timestamps {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self) {
        if let Ok(mut instants) = self.instants.lock() {
            instants.push(Instant::now());
        }
    }

    pub fn snapshot(&self) -> Vec<Instant> {
        self.instants.lock().map(|i| i.clone()).unwrap_or_default()
    }
}
