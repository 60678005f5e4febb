use std::fmt;
use std::time::Duration;
use tracing::info;

/// Progress of a running scan, computed on each timer tick
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub tested_total: u64,
    pub elapsed: Duration,
    /// Candidates per second
    pub rate: f64,
    /// Share of the wordlist read, 0-100
    pub percent: f64,
    pub file_position: u64,
    pub total_size: u64,
}

impl ProgressSnapshot {
    pub fn new(tested_total: u64, elapsed: Duration, file_position: u64, total_size: u64) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            tested_total as f64 / secs
        } else {
            0.0
        };
        let percent = if total_size == 0 {
            100.0
        } else {
            file_position as f64 / total_size as f64 * 100.0
        };

        Self {
            tested_total,
            elapsed,
            rate,
            percent,
            file_position,
            total_size,
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = Duration::from_secs(self.elapsed.as_secs());
        write!(
            f,
            "Tested {} candidates in {} ({:.0}/s), {:.2}% of wordlist read",
            self.tested_total,
            humantime::format_duration(elapsed),
            self.rate,
            self.percent
        )
    }
}

/// Receives periodic progress from the coordinator
pub trait ProgressSink {
    fn report(&mut self, snapshot: &ProgressSnapshot);

    /// Called once when the scan ends, whatever the outcome
    fn finish(&mut self) {}
}

/// Writes progress lines to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, snapshot: &ProgressSnapshot) {
        info!("{}", snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_math() {
        let snapshot = ProgressSnapshot::new(5000, Duration::from_secs(10), 250, 1000);
        assert_eq!(snapshot.rate, 500.0);
        assert_eq!(snapshot.percent, 25.0);
        assert_eq!(
            snapshot.to_string(),
            "Tested 5000 candidates in 10s (500/s), 25.00% of wordlist read"
        );
    }

    #[test]
    fn test_snapshot_edge_cases() {
        let snapshot = ProgressSnapshot::new(0, Duration::ZERO, 0, 0);
        assert_eq!(snapshot.rate, 0.0);
        assert_eq!(snapshot.percent, 100.0);
    }

    #[test]
    fn test_display_drops_subsecond_noise() {
        let snapshot = ProgressSnapshot::new(10, Duration::from_millis(61_500), 1, 2);
        assert!(snapshot.to_string().contains("in 1m 1s"));
    }
}
