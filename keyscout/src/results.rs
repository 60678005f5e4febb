//! Result types of a scan.
//!
//! A run ends in exactly one of three ways: a match ([`ScanOutcome::Found`]), a fully
//! exhausted wordlist ([`ScanOutcome::NotFound`]), or an error returned from `scan`.
//! "Not found" is a normal outcome, not an error, so callers can tell the two apart.
use std::time::Duration;

use crate::metrics::ScanStats;

/// The password that unlocked the secret, with the recovered plaintext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The candidate line that matched
    pub candidate: String,
    /// The decrypted secret
    pub plaintext: String,
    /// Worker that found it
    pub worker: usize,
}

/// How a scan ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Found(MatchResult),
    NotFound,
}

/// Totals gathered by the coordinator over one run
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Candidates tested, summed from worker progress deltas
    pub tested_total: u64,
    /// Wall time from worker start to outcome
    pub elapsed: Duration,
    /// Bytes of the wordlist consumed
    pub file_position: u64,
    /// Size of the wordlist when it was opened
    pub total_size: u64,
    /// Workers started
    pub workers: usize,
    /// Workers that died from a panic
    pub crashed_workers: usize,
    /// Dispatch counters
    pub stats: ScanStats,
}

impl ScanSummary {
    /// Candidates per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.tested_total as f64 / secs
        } else {
            0.0
        }
    }
}

/// Outcome plus summary of a finished scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub summary: ScanSummary,
}

impl ScanReport {
    pub fn is_found(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Found(_))
    }

    /// The match, if there was one
    pub fn found(&self) -> Option<&MatchResult> {
        match &self.outcome {
            ScanOutcome::Found(result) => Some(result),
            ScanOutcome::NotFound => None,
        }
    }
}
