use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

use super::reader::{Batch, ChunkReader};
use super::worker::{Assignment, SlotState, WorkerId};
use crate::errors::ScanResult;
use crate::metrics::ScanMetrics;

const BACKOFF_MIN: Duration = Duration::from_millis(1);
const BACKOFF_MAX: Duration = Duration::from_millis(32);

/// Capped exponential delay for reads that made no progress
#[derive(Debug)]
struct Backoff {
    delay: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self { delay: BACKOFF_MIN }
    }

    fn snooze(&mut self) {
        thread::sleep(self.delay);
        self.delay = (self.delay * 2).min(BACKOFF_MAX);
    }

    fn reset(&mut self) {
        self.delay = BACKOFF_MIN;
    }
}

#[derive(Debug)]
struct Slot {
    sender: Sender<Assignment>,
    state: SlotState,
}

/// Pairs idle workers with the next batch from the wordlist.
///
/// Workers only receive data after asking for it, so memory held in batches is bounded by
/// `worker_count * max_batch_lines` no matter how large the wordlist is.
#[derive(Debug)]
pub struct Dispatcher<R = File> {
    reader: ChunkReader<R>,
    slots: Vec<Slot>,
    idle: VecDeque<WorkerId>,
    /// Batches whose worker died before receiving them
    undelivered: VecDeque<Batch>,
    backoff: Backoff,
    metrics: ScanMetrics,
}

impl<R: Read> Dispatcher<R> {
    pub fn new(reader: ChunkReader<R>, senders: Vec<Sender<Assignment>>, metrics: ScanMetrics) -> Self {
        let slots = senders
            .into_iter()
            .map(|sender| Slot {
                sender,
                state: SlotState::Starting,
            })
            .collect();

        Self {
            reader,
            slots,
            idle: VecDeque::new(),
            undelivered: VecDeque::new(),
            backoff: Backoff::new(),
            metrics,
        }
    }

    /// Queues a worker that asked for work, then pumps
    pub fn worker_idle(&mut self, worker: WorkerId) -> ScanResult<()> {
        let Some(slot) = self.slots.get_mut(worker) else {
            return Ok(());
        };
        match slot.state {
            SlotState::Terminated => return Ok(()),
            SlotState::Busy => self.metrics.record_settled(),
            SlotState::Starting | SlotState::Idle => {}
        }
        slot.state = SlotState::Idle;
        if !self.idle.contains(&worker) {
            self.idle.push_back(worker);
        }
        self.pump()
    }

    /// Marks a worker as gone for good
    pub fn worker_terminated(&mut self, worker: WorkerId) {
        if let Some(slot) = self.slots.get_mut(worker) {
            if slot.state == SlotState::Busy {
                self.metrics.record_settled();
            }
            slot.state = SlotState::Terminated;
        }
        self.idle.retain(|&w| w != worker);
    }

    /// Hands a batch to every idle worker, or the done-signal once the wordlist is exhausted
    pub fn pump(&mut self) -> ScanResult<()> {
        while let Some(worker) = self.idle.pop_front() {
            match self.next_batch()? {
                Some(batch) => self.send_batch(worker, batch),
                None => {
                    self.idle.push_front(worker);
                    self.broadcast_done();
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// The next batch to hand out, `None` once the wordlist is exhausted
    fn next_batch(&mut self) -> ScanResult<Option<Batch>> {
        if let Some(batch) = self.undelivered.pop_front() {
            return Ok(Some(batch));
        }

        loop {
            if self.reader.is_exhausted() {
                return Ok(None);
            }

            let before = self.reader.position();
            let batch = self.reader.next_batch()?;
            if !batch.is_empty() {
                self.backoff.reset();
                return Ok(Some(batch));
            }

            // Comment-only or partial chunks advance the position and are retried at once;
            // only a read that consumed nothing waits.
            if self.reader.position() == before && !self.reader.is_exhausted() {
                trace!("No data available, backing off {:?}", self.backoff.delay);
                self.backoff.snooze();
            }
        }
    }

    fn send_batch(&mut self, worker: WorkerId, batch: Batch) {
        let len = batch.len();
        let slot = &mut self.slots[worker];

        match slot.sender.send(Assignment::Batch(batch)) {
            Ok(()) => {
                slot.state = SlotState::Busy;
                self.metrics.record_dispatch(len);
            }
            Err(err) => {
                debug!("Worker {} is gone, keeping its batch for another worker", worker);
                slot.state = SlotState::Terminated;
                if let Assignment::Batch(batch) = err.into_inner() {
                    self.undelivered.push_back(batch);
                }
            }
        }
    }

    fn broadcast_done(&mut self) {
        for worker in self.idle.drain(..) {
            let _ = self.slots[worker].sender.send(Assignment::Done);
            self.metrics.record_done_signal();
            trace!("Sent done-signal to worker {}", worker);
        }
    }

    /// True once every candidate has been read and handed out
    pub fn is_exhausted(&self) -> bool {
        self.reader.is_exhausted() && self.undelivered.is_empty()
    }

    /// Bytes consumed and total size of the wordlist
    pub fn progress(&self) -> (u64, u64) {
        (self.reader.position(), self.reader.total_size())
    }

    /// Batches sent and not yet acknowledged
    pub fn outstanding(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Busy)
            .count()
    }

    pub fn slot_state(&self, worker: WorkerId) -> Option<SlotState> {
        self.slots.get(worker).map(|s| s.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodingMode;
    use crate::scan::reader::ReaderOptions;
    use crossbeam_channel::{bounded, Receiver};
    use std::io::Cursor;
    use std::num::NonZeroUsize;

    fn dispatcher(
        content: &str,
        chunk_size: usize,
        workers: usize,
    ) -> (Dispatcher<Cursor<Vec<u8>>>, Vec<Receiver<Assignment>>) {
        let metrics = ScanMetrics::new();
        let reader = ChunkReader::from_reader(
            "words.txt",
            Cursor::new(content.as_bytes().to_vec()),
            content.len() as u64,
            ReaderOptions {
                chunk_size: NonZeroUsize::new(chunk_size).unwrap(),
                comment_marker: "#".to_string(),
                encoding_mode: EncodingMode::Lossy,
            },
            metrics.clone(),
        );
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..workers).map(|_| bounded(1)).unzip();
        (Dispatcher::new(reader, senders, metrics), receivers)
    }

    fn expect_batch(rx: &Receiver<Assignment>) -> Vec<String> {
        match rx.try_recv() {
            Ok(Assignment::Batch(batch)) => batch.into_candidates(),
            other => panic!("expected a batch, got {:?}", other),
        }
    }

    #[test]
    fn test_pull_model_one_batch_per_request() {
        let (mut dispatcher, receivers) = dispatcher("a\nb\nc\nd\n", 2, 2);

        dispatcher.worker_idle(0).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["a"]);
        assert_eq!(dispatcher.slot_state(0), Some(SlotState::Busy));
        assert!(receivers[1].try_recv().is_err()); // Never asked, never fed

        dispatcher.worker_idle(1).unwrap();
        assert_eq!(expect_batch(&receivers[1]), vec!["b"]);
        assert_eq!(dispatcher.outstanding(), 2);

        dispatcher.worker_idle(0).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["c"]);
        assert_eq!(dispatcher.outstanding(), 2);
    }

    #[test]
    fn test_comment_only_chunks_are_skipped_without_waiting() {
        let (mut dispatcher, receivers) = dispatcher("#a\n#b\n#c\nword\n", 3, 1);
        dispatcher.worker_idle(0).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["word"]);
    }

    #[test]
    fn test_exhaustion_broadcasts_done() {
        let (mut dispatcher, receivers) = dispatcher("only\n", 64, 3);

        dispatcher.worker_idle(0).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["only"]);

        dispatcher.worker_idle(1).unwrap();
        assert!(matches!(receivers[1].try_recv(), Ok(Assignment::Done)));
        assert!(dispatcher.is_exhausted());

        // A busy worker coming back after exhaustion gets the done-signal too
        dispatcher.worker_idle(0).unwrap();
        assert!(matches!(receivers[0].try_recv(), Ok(Assignment::Done)));
        assert_eq!(dispatcher.outstanding(), 0);
        assert!(receivers[2].try_recv().is_err());
    }

    #[test]
    fn test_empty_wordlist() {
        let (mut dispatcher, receivers) = dispatcher("", 8, 1);
        dispatcher.worker_idle(0).unwrap();
        assert!(matches!(receivers[0].try_recv(), Ok(Assignment::Done)));
        assert!(dispatcher.is_exhausted());
    }

    #[test]
    fn test_terminated_worker_is_ignored() {
        let (mut dispatcher, receivers) = dispatcher("first\nsecond\n", 6, 2);

        dispatcher.worker_idle(0).unwrap();
        dispatcher.worker_idle(1).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["first"]);
        assert_eq!(expect_batch(&receivers[1]), vec!["second"]);

        dispatcher.worker_terminated(1);
        assert_eq!(dispatcher.slot_state(1), Some(SlotState::Terminated));
        assert_eq!(dispatcher.outstanding(), 1);

        // A late request from a terminated slot is dropped
        dispatcher.worker_idle(1).unwrap();
        assert_eq!(dispatcher.slot_state(1), Some(SlotState::Terminated));
        assert!(receivers[1].try_recv().is_err());
    }

    #[test]
    fn test_send_failure_keeps_batch() {
        let (mut dispatcher, mut receivers) = dispatcher("one\ntwo\n", 4, 2);

        drop(receivers.remove(1)); // Worker 1's thread is gone
        dispatcher.worker_idle(1).unwrap();
        assert_eq!(dispatcher.slot_state(1), Some(SlotState::Terminated));
        assert!(!dispatcher.is_exhausted());

        dispatcher.worker_idle(0).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["one"]);
        dispatcher.worker_idle(0).unwrap();
        assert_eq!(expect_batch(&receivers[0]), vec!["two"]);
    }

    #[test]
    fn test_progress() {
        let (mut dispatcher, _receivers) = dispatcher("abc\ndef\n", 4, 1);
        assert_eq!(dispatcher.progress(), (0, 8));
        dispatcher.worker_idle(0).unwrap();
        assert_eq!(dispatcher.progress(), (4, 8));
    }
}
