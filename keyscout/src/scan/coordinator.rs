use crossbeam_channel::{never, select, tick, unbounded, Receiver};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::dispatcher::Dispatcher;
use super::progress::{LogProgress, ProgressSink, ProgressSnapshot};
use super::reader::{ChunkReader, ReaderOptions};
use super::worker::{WorkerEvent, WorkerId, WorkerPool};
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::predicate::{MnemonicPredicate, Predicate};
use crate::results::{MatchResult, ScanOutcome, ScanReport, ScanSummary};
use crate::wallet::{load_secret, SecretRecord};

/// Runs a scan with the wallet predicate and log-based progress
pub fn scan(config: &ScanConfig) -> ScanResult<ScanReport> {
    Scanner::new(config.clone(), MnemonicPredicate::new(config.expected_words)).run()
}

/// Entry point of a scan: owns the configuration and the predicate
pub struct Scanner {
    config: ScanConfig,
    predicate: Arc<dyn Predicate>,
}

impl Scanner {
    pub fn new<P: Predicate + 'static>(config: ScanConfig, predicate: P) -> Self {
        Self::with_predicate(config, Arc::new(predicate))
    }

    pub fn with_predicate(config: ScanConfig, predicate: Arc<dyn Predicate>) -> Self {
        Self { config, predicate }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Runs the scan, logging progress lines
    pub fn run(&self) -> ScanResult<ScanReport> {
        self.run_with_progress(&mut LogProgress)
    }

    /// Loads the secret, opens the wordlist and runs the scan.
    ///
    /// Input errors are returned before any worker is started.
    pub fn run_with_progress(&self, sink: &mut dyn ProgressSink) -> ScanResult<ScanReport> {
        self.config.validate()?;
        let secret = load_secret(&self.config.secret_path)?;

        let metrics = ScanMetrics::new();
        let reader = ChunkReader::open(
            &self.config.candidate_path,
            ReaderOptions::from(&self.config),
            metrics.clone(),
        )?;

        self.run_reader(secret, reader, metrics, sink)
    }

    /// Runs the scan over an already opened wordlist
    pub fn run_reader<R: Read>(
        &self,
        secret: SecretRecord,
        reader: ChunkReader<R>,
        metrics: ScanMetrics,
        sink: &mut dyn ProgressSink,
    ) -> ScanResult<ScanReport> {
        let workers = self.config.worker_count.get();
        info!(
            "Starting scan of {} ({} bytes) with {} workers, {} byte chunks",
            self.config.candidate_path.display(),
            reader.total_size(),
            workers,
            self.config.chunk_size_bytes
        );

        let (events_tx, events_rx) = unbounded();
        let (pool, senders) = WorkerPool::spawn(
            workers,
            Arc::new(secret),
            Arc::clone(&self.predicate),
            self.config.report_every,
            &events_tx,
        )?;
        // Workers hold the only senders: the channel closes when the last one exits
        drop(events_tx);

        let mut coordinator = Coordinator {
            dispatcher: Dispatcher::new(reader, senders, metrics.clone()),
            tested_total: 0,
            started: Instant::now(),
            found: false,
            live_workers: workers,
            workers,
            crashed: 0,
        };

        let outcome = coordinator.event_loop(&events_rx, self.config.progress_interval(), sink);
        sink.finish();
        coordinator.teardown(pool, outcome, &metrics)
    }
}

/// Single owner of the dispatcher and the run totals; reacts to worker events
struct Coordinator<R> {
    dispatcher: Dispatcher<R>,
    tested_total: u64,
    started: Instant,
    found: bool,
    live_workers: usize,
    workers: usize,
    crashed: usize,
}

impl<R: Read> Coordinator<R> {
    fn event_loop(
        &mut self,
        events: &Receiver<WorkerEvent>,
        interval: Option<Duration>,
        sink: &mut dyn ProgressSink,
    ) -> ScanResult<ScanOutcome> {
        let ticker = interval.map(tick).unwrap_or_else(never);

        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => {
                        if let Some(outcome) = self.handle(event)? {
                            return Ok(outcome);
                        }
                    }
                    Err(_) => return self.conclude(),
                },
                recv(ticker) -> _ => sink.report(&self.snapshot()),
            }
        }
    }

    fn handle(&mut self, event: WorkerEvent) -> ScanResult<Option<ScanOutcome>> {
        match event {
            WorkerEvent::NeedWork { worker } => self.dispatcher.worker_idle(worker)?,
            WorkerEvent::Progress { tested, .. } => self.tested_total += tested,
            WorkerEvent::Found {
                worker,
                candidate,
                plaintext,
            } => {
                if !self.found {
                    self.found = true;
                    info!("Worker {} found the password", worker);
                    return Ok(Some(ScanOutcome::Found(MatchResult {
                        candidate,
                        plaintext,
                        worker,
                    })));
                }
            }
            WorkerEvent::Exited { worker } => {
                debug!("Worker {} exited", worker);
                return self.worker_gone(worker);
            }
            WorkerEvent::Crashed { worker, reason } => {
                warn!("Worker {} crashed: {}", worker, reason);
                self.crashed += 1;
                return self.worker_gone(worker);
            }
        }
        Ok(None)
    }

    fn worker_gone(&mut self, worker: WorkerId) -> ScanResult<Option<ScanOutcome>> {
        self.dispatcher.worker_terminated(worker);
        self.live_workers = self.live_workers.saturating_sub(1);
        if self.live_workers == 0 {
            self.conclude().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Outcome once no worker is left and nothing matched
    fn conclude(&self) -> ScanResult<ScanOutcome> {
        if self.dispatcher.is_exhausted() {
            info!(
                "Wordlist exhausted after {} candidates without a match",
                self.tested_total
            );
            Ok(ScanOutcome::NotFound)
        } else {
            error!("All workers exited before the wordlist was exhausted");
            Err(ScanError::WorkersLost {
                crashed: self.crashed,
            })
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        let (file_position, total_size) = self.dispatcher.progress();
        ProgressSnapshot::new(
            self.tested_total,
            self.started.elapsed(),
            file_position,
            total_size,
        )
    }

    /// Stops the pool and builds the report. Consumes the coordinator, so it runs once.
    fn teardown(
        self,
        pool: WorkerPool,
        outcome: ScanResult<ScanOutcome>,
        metrics: &ScanMetrics,
    ) -> ScanResult<ScanReport> {
        let elapsed = self.started.elapsed();
        let (file_position, total_size) = self.dispatcher.progress();

        pool.cancel();
        // Closing the assignment channels wakes every idle worker
        drop(self.dispatcher);
        if self.live_workers == 0 {
            pool.join();
        } else {
            // Busy workers stop at their next candidate; nobody waits for them
            pool.detach();
        }

        metrics.log_stats();

        let outcome = outcome?;
        let summary = ScanSummary {
            tested_total: self.tested_total,
            elapsed,
            file_position,
            total_size,
            workers: self.workers,
            crashed_workers: self.crashed,
            stats: metrics.get_stats(),
        };
        info!(
            "Scan complete: {} candidates in {:?} ({:.0}/s)",
            summary.tested_total,
            summary.elapsed,
            summary.rate()
        );

        Ok(ScanReport { outcome, summary })
    }
}
