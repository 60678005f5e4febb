use crossbeam_channel::{bounded, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

use super::reader::{Batch, Candidate};
use crate::errors::ScanResult;
use crate::predicate::Predicate;
use crate::wallet::SecretRecord;

/// Index of a worker slot, `0..worker_count`
pub type WorkerId = usize;

/// Lifecycle of a worker slot as seen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Starting,
    Idle,
    Busy,
    Terminated,
}

/// Work sent to one worker
#[derive(Debug)]
pub enum Assignment {
    Batch(Batch),
    /// The wordlist is exhausted; flush and exit
    Done,
}

/// Everything a worker tells the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The worker is idle and waiting for an assignment
    NeedWork { worker: WorkerId },
    /// Candidates tested since the last report
    Progress { worker: WorkerId, tested: u64 },
    Found {
        worker: WorkerId,
        candidate: Candidate,
        plaintext: String,
    },
    /// Clean exit after a done-signal
    Exited { worker: WorkerId },
    /// The worker thread panicked
    Crashed { worker: WorkerId, reason: String },
}

enum BatchEnd {
    Completed,
    Matched,
    Cancelled,
}

/// Request/response loop of one worker thread
struct Worker {
    id: WorkerId,
    secret: Arc<SecretRecord>,
    predicate: Arc<dyn Predicate>,
    assignments: Receiver<Assignment>,
    events: Sender<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    report_every: u64,
    untested_report: u64,
}

impl Worker {
    fn run(mut self) {
        loop {
            if self
                .events
                .send(WorkerEvent::NeedWork { worker: self.id })
                .is_err()
            {
                return;
            }

            match self.assignments.recv() {
                Ok(Assignment::Batch(batch)) => match self.test_batch(batch) {
                    BatchEnd::Completed => continue,
                    BatchEnd::Matched | BatchEnd::Cancelled => return,
                },
                Ok(Assignment::Done) => {
                    self.flush_progress();
                    trace!("Worker {} received done-signal", self.id);
                    let _ = self.events.send(WorkerEvent::Exited { worker: self.id });
                    return;
                }
                // Coordinator tore the pool down
                Err(_) => return,
            }
        }
    }

    fn test_batch(&mut self, batch: Batch) -> BatchEnd {
        trace!("Worker {} testing {} candidates", self.id, batch.len());

        for candidate in batch {
            if self.cancel.load(Ordering::Acquire) {
                return BatchEnd::Cancelled;
            }

            let result = self.predicate.try_candidate(&self.secret, &candidate);
            self.untested_report += 1;

            if let Some(plaintext) = result {
                self.flush_progress();
                debug!("Worker {} found a match", self.id);
                let _ = self.events.send(WorkerEvent::Found {
                    worker: self.id,
                    candidate,
                    plaintext,
                });
                return BatchEnd::Matched;
            }

            if self.untested_report >= self.report_every {
                self.flush_progress();
            }
        }

        self.flush_progress();
        BatchEnd::Completed
    }

    fn flush_progress(&mut self) {
        if self.untested_report > 0 {
            let _ = self.events.send(WorkerEvent::Progress {
                worker: self.id,
                tested: self.untested_report,
            });
            self.untested_report = 0;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Fixed set of worker threads sharing one secret and one predicate
pub struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `count` workers.
    ///
    /// Returns the pool and one assignment sender per worker, indexed by [`WorkerId`].
    /// Each assignment channel holds a single message: a worker never has more than one
    /// batch outstanding.
    pub fn spawn(
        count: usize,
        secret: Arc<SecretRecord>,
        predicate: Arc<dyn Predicate>,
        report_every: u64,
        events: &Sender<WorkerEvent>,
    ) -> ScanResult<(Self, Vec<Sender<Assignment>>)> {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(count);
        let mut senders = Vec::with_capacity(count);

        for id in 0..count {
            let (assignment_tx, assignment_rx) = bounded(1);
            let worker = Worker {
                id,
                secret: Arc::clone(&secret),
                predicate: Arc::clone(&predicate),
                assignments: assignment_rx,
                events: events.clone(),
                cancel: Arc::clone(&cancel),
                report_every: report_every.max(1),
                untested_report: 0,
            };
            let crash_events = events.clone();

            let handle = thread::Builder::new()
                .name(format!("keyscout-worker-{}", id))
                .spawn(move || {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| worker.run())) {
                        let _ = crash_events.send(WorkerEvent::Crashed {
                            worker: id,
                            reason: panic_message(payload.as_ref()),
                        });
                    }
                })?;

            handles.push(handle);
            senders.push(assignment_tx);
        }

        debug!("Spawned {} workers", count);
        Ok((Self { handles, cancel }, senders))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Tells busy workers to abandon their batch at the next candidate
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Waits for every worker thread
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    /// Stops waiting on workers; finished threads are reaped, the rest are left to observe the cancel flag
    pub fn detach(self) {
        self.cancel();
        for handle in self.handles {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}
