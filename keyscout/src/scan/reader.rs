use std::fs::File;
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::config::{EncodingMode, ScanConfig};
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;

/// Byte order mark some editors put at the start of UTF-8 files
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// One password guess: a trimmed, non-empty, non-comment wordlist line
pub type Candidate = String;

/// Candidates handed to a single worker, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    candidates: Vec<Candidate>,
}

impl Batch {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

impl IntoIterator for Batch {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Read position of the wordlist stream
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Bytes consumed so far, never more than `total_size`
    pub file_position: u64,
    /// Size of the wordlist when it was opened
    pub total_size: u64,
    /// Unterminated trailing bytes of the last chunk
    pub carryover: Vec<u8>,
    /// Set once, after the final candidate has been produced
    pub exhausted: bool,
}

/// Line-splitting options of a [`ChunkReader`]
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub chunk_size: NonZeroUsize,
    pub comment_marker: String,
    pub encoding_mode: EncodingMode,
}

impl From<&ScanConfig> for ReaderOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes,
            comment_marker: config.comment_marker.clone(),
            encoding_mode: config.encoding_mode,
        }
    }
}

/// Streams a wordlist in fixed-size byte chunks and turns complete lines into batches.
///
/// Lines are split on raw `\n` bytes before decoding, so a line (or a multi-byte
/// character) cut by a chunk boundary decodes exactly as if read in one piece.
#[derive(Debug)]
pub struct ChunkReader<R = File> {
    path: PathBuf,
    source: R,
    state: StreamState,
    /// Absolute offset of the first carryover byte
    carry_offset: u64,
    buffer: Vec<u8>,
    options: ReaderOptions,
    metrics: ScanMetrics,
}

impl ChunkReader<File> {
    /// Opens the wordlist at `path`
    pub fn open(path: &Path, options: ReaderOptions, metrics: ScanMetrics) -> ScanResult<Self> {
        let file = File::open(path).map_err(|e| ScanError::classify_candidate_io(path, e))?;
        let total_size = file
            .metadata()
            .map_err(|e| ScanError::stream_io(path, e))?
            .len();

        debug!("Opened wordlist {} ({} bytes)", path.display(), total_size);
        Ok(Self::from_reader(path, file, total_size, options, metrics))
    }
}

impl<R: Read> ChunkReader<R> {
    /// Wraps any reader; `total_size` caps how many bytes will be consumed
    pub fn from_reader(
        path: impl Into<PathBuf>,
        source: R,
        total_size: u64,
        options: ReaderOptions,
        metrics: ScanMetrics,
    ) -> Self {
        Self {
            path: path.into(),
            source,
            state: StreamState {
                total_size,
                ..StreamState::default()
            },
            carry_offset: 0,
            buffer: vec![0; options.chunk_size.get()],
            options,
            metrics,
        }
    }

    pub fn position(&self) -> u64 {
        self.state.file_position
    }

    pub fn total_size(&self) -> u64 {
        self.state.total_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.exhausted
    }

    /// Reads the next chunk and returns the candidates it completed.
    ///
    /// An empty batch with `is_exhausted() == false` means the chunk held no complete
    /// candidate (comments, blanks, a partial line) or the source was momentarily not
    /// readable; callers simply ask again. A read failure marks the stream exhausted.
    pub fn next_batch(&mut self) -> ScanResult<Batch> {
        if self.state.exhausted {
            return Ok(Batch::default());
        }

        let remaining = self.state.total_size - self.state.file_position;
        let want = remaining.min(self.buffer.len() as u64) as usize;

        let read = if want == 0 {
            0
        } else {
            match self.source.read(&mut self.buffer[..want]) {
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) =>
                {
                    trace!("Transient read condition on {}: {}", self.path.display(), e);
                    self.metrics.record_empty_read();
                    return Ok(Batch::default());
                }
                Err(e) => {
                    self.state.exhausted = true;
                    return Err(ScanError::stream_io(&self.path, e));
                }
            }
        };

        if read == 0 {
            return self.finish();
        }

        self.state.file_position += read as u64;
        self.metrics.record_read(read as u64);
        self.state
            .carryover
            .extend_from_slice(&self.buffer[..read]);

        let Some(last_newline) = self.state.carryover.iter().rposition(|&b| b == b'\n') else {
            self.metrics.record_empty_read();
            return Ok(Batch::default());
        };

        let rest = self.state.carryover.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.state.carryover, rest);
        let base_offset = self.carry_offset;
        self.carry_offset += complete.len() as u64;

        let mut candidates = Vec::new();
        let mut line_offset = base_offset;
        // The slice after the final '\n' is empty and filtered out like any blank line
        for line in complete.split(|&b| b == b'\n') {
            if let Some(candidate) = self.accept(line, line_offset)? {
                candidates.push(candidate);
            }
            line_offset += line.len() as u64 + 1;
        }

        if candidates.is_empty() {
            self.metrics.record_empty_read();
        }
        trace!(
            "Read {} bytes, {} candidates, position {}/{}",
            read,
            candidates.len(),
            self.state.file_position,
            self.state.total_size
        );
        Ok(Batch::new(candidates))
    }

    /// End of file: flush the unterminated last line, exhaust on the following call
    fn finish(&mut self) -> ScanResult<Batch> {
        if self.state.carryover.is_empty() {
            debug!(
                "Wordlist {} exhausted at byte {}",
                self.path.display(),
                self.state.file_position
            );
            self.state.exhausted = true;
            return Ok(Batch::default());
        }

        let tail = std::mem::take(&mut self.state.carryover);
        let offset = self.carry_offset;
        self.carry_offset += tail.len() as u64;
        match self.accept(&tail, offset)? {
            Some(candidate) => Ok(Batch::new(vec![candidate])),
            None => self.finish(),
        }
    }

    /// Decodes and filters one raw line
    fn accept(&mut self, line: &[u8], offset: u64) -> ScanResult<Option<Candidate>> {
        let line = match line.strip_prefix(UTF8_BOM) {
            Some(rest) if offset == 0 => rest,
            _ => line,
        };
        let text = match String::from_utf8(line.to_vec()) {
            Ok(text) => text,
            Err(e) => match self.options.encoding_mode {
                EncodingMode::FailFast => {
                    self.state.exhausted = true;
                    return Err(ScanError::encoding_error(&self.path, offset, e));
                }
                EncodingMode::Lossy => {
                    warn!(
                        "Invalid UTF-8 replaced in {} at byte {}",
                        self.path.display(),
                        offset
                    );
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            },
        };

        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with(self.options.comment_marker.as_str()) {
            return Ok(None);
        }
        if trimmed.len() == text.len() {
            Ok(Some(text))
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}
