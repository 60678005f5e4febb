//! Parallel wordlist scan.
//!
//! A [`ChunkReader`] turns the wordlist into batches of candidates, the [`Dispatcher`] hands one
//! batch at a time to whichever worker asks for it, and the coordinator stops everything on the
//! first match or once the wordlist is exhausted.

pub mod coordinator;
pub mod dispatcher;
pub mod progress;
pub mod reader;
pub mod worker;

pub use coordinator::{scan, Scanner};
pub use dispatcher::Dispatcher;
pub use progress::{LogProgress, ProgressSink, ProgressSnapshot};
pub use reader::{Batch, Candidate, ChunkReader, ReaderOptions, StreamState};
pub use worker::{Assignment, SlotState, WorkerEvent, WorkerId, WorkerPool};
