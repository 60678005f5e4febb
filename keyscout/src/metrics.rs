use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks dispatch and stream counters for one scan
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Stream metrics
    bytes_read: Arc<AtomicU64>,
    empty_reads: Arc<AtomicU64>,

    // Dispatch metrics
    batches_dispatched: Arc<AtomicU64>,
    candidates_dispatched: Arc<AtomicU64>,
    done_signals: Arc<AtomicU64>,

    // Outstanding batches (sent, not yet acknowledged by a NeedWork)
    in_flight: Arc<AtomicU64>,
    peak_in_flight: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            bytes_read: Arc::new(AtomicU64::new(0)),
            empty_reads: Arc::new(AtomicU64::new(0)),
            batches_dispatched: Arc::new(AtomicU64::new(0)),
            candidates_dispatched: Arc::new(AtomicU64::new(0)),
            done_signals: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records raw bytes pulled from the wordlist
    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a read that produced no candidates
    pub fn record_empty_read(&self) {
        self.empty_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a batch handed to a worker
    pub fn record_dispatch(&self, candidates: usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.candidates_dispatched
            .fetch_add(candidates as u64, Ordering::Relaxed);

        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
        debug!("Batch dispatched: {} candidates, in flight: {}", candidates, current);
    }

    /// Records that a worker finished (or abandoned) its batch
    pub fn record_settled(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Records a done-signal sent to an idle worker
    pub fn record_done_signal(&self) {
        self.done_signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets current statistics
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            candidates_dispatched: self.candidates_dispatched.load(Ordering::Relaxed),
            done_signals: self.done_signals.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Bytes read: {}\n\
             Empty reads: {}\n\
             Batches/candidates dispatched: {}/{}\n\
             Done signals: {}\n\
             Peak batches in flight: {}",
            stats.bytes_read,
            stats.empty_reads,
            stats.batches_dispatched,
            stats.candidates_dispatched,
            stats.done_signals,
            stats.peak_in_flight
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_read: u64,
    pub empty_reads: u64,
    pub batches_dispatched: u64,
    pub candidates_dispatched: u64,
    pub done_signals: u64,
    pub in_flight: u64,
    pub peak_in_flight: u64,
}
