use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{ScanError, ScanResult};

/// Default number of bytes pulled from the wordlist per read
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of candidates a worker tests between progress reports
pub const DEFAULT_REPORT_EVERY: u64 = 500;

/// Default seconds between progress lines
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;

/// Word count of a genuine recovered mnemonic
pub const DEFAULT_EXPECTED_WORDS: usize = 34;

/// How to handle wordlist lines that are not valid UTF-8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Abort the scan with `ScanError::Encoding`
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep going
    #[default]
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lossy" => Ok(Self::Lossy),
            "failfast" | "fail-fast" => Ok(Self::FailFast),
            other => Err(ScanError::config_error(format!(
                "unknown encoding mode '{}' (expected lossy or failfast)",
                other
            ))),
        }
    }
}

/// Configuration for one scan.
///
/// # Configuration Locations
///
/// Values are layered, later sources winning:
/// 1. Global `$HOME/.config/keyscout/config.yaml`
/// 2. Local `.keyscout.yaml` in the current directory
/// 3. Custom config file given via `--config`
/// 4. `KEYSCOUT_*` environment variables
/// 5. Command-line flags (see [`ScanConfig::merge_with_cli`])
///
/// # Configuration Format
///
/// ```yaml
/// # Wallet export holding the encrypted mnemonic
/// secret_path: "wallet.json"
///
/// # Wordlist, one candidate per line
/// candidate_path: "rockyou.txt"
///
/// # Worker threads (default: CPU cores)
/// worker_count: 8
///
/// # Bytes read from the wordlist per chunk
/// chunk_size_bytes: 65536
///
/// # Lines starting with this marker are skipped
/// comment_marker: "#"
///
/// # Candidates tested between progress reports
/// report_every: 500
///
/// # Seconds between progress lines (0 disables them)
/// progress_interval_secs: 10
///
/// # lossy or failfast
/// encoding_mode: lossy
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Path of the secret payload (JSON sequence of wallet records)
    #[serde(default)]
    pub secret_path: PathBuf,

    /// Path of the candidate wordlist
    #[serde(default)]
    pub candidate_path: PathBuf,

    /// Number of worker threads
    #[serde(default = "default_worker_count")]
    pub worker_count: NonZeroUsize,

    /// Bytes read from the wordlist per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: NonZeroUsize,

    /// Trimmed lines starting with this marker are not candidates
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,

    /// A worker reports progress every `report_every` tested candidates
    #[serde(default = "default_report_every")]
    pub report_every: u64,

    /// Seconds between progress lines, 0 disables the timer
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,

    /// Word count a decrypted mnemonic must have to count as a match
    #[serde(default = "default_expected_words")]
    pub expected_words: usize,

    /// Decoding policy for wordlist lines
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_chunk_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN)
}

fn default_comment_marker() -> String {
    "#".to_string()
}

fn default_report_every() -> u64 {
    DEFAULT_REPORT_EVERY
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}

fn default_expected_words() -> usize {
    DEFAULT_EXPECTED_WORDS
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub secret_path: Option<PathBuf>,
    pub candidate_path: Option<PathBuf>,
    pub worker_count: Option<NonZeroUsize>,
    pub chunk_size_bytes: Option<NonZeroUsize>,
    pub comment_marker: Option<String>,
    pub report_every: Option<u64>,
    pub progress_interval_secs: Option<u64>,
    pub expected_words: Option<usize>,
    pub encoding_mode: Option<EncodingMode>,
    pub log_level: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(PathBuf::new(), PathBuf::new())
    }
}

impl ScanConfig {
    /// Creates a configuration with default tuning for the given inputs
    pub fn new(secret_path: impl Into<PathBuf>, candidate_path: impl Into<PathBuf>) -> Self {
        Self {
            secret_path: secret_path.into(),
            candidate_path: candidate_path.into(),
            worker_count: default_worker_count(),
            chunk_size_bytes: default_chunk_size(),
            comment_marker: default_comment_marker(),
            report_every: default_report_every(),
            progress_interval_secs: default_progress_interval(),
            expected_words: default_expected_words(),
            encoding_mode: EncodingMode::default(),
            log_level: default_log_level(),
        }
    }

    /// Loads configuration, layering an explicit file over the default locations.
    /// The explicit file must exist; the default locations are optional.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let default_files = [
            dirs::config_dir().map(|p| p.join("keyscout/config.yaml")),
            Some(PathBuf::from(".keyscout.yaml")),
        ];
        for path in default_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("KEYSCOUT").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    /// Merges command-line values over file values
    pub fn merge_with_cli(mut self, cli: ScanOverrides) -> Self {
        if let Some(path) = cli.secret_path {
            self.secret_path = path;
        }
        if let Some(path) = cli.candidate_path {
            self.candidate_path = path;
        }
        if let Some(count) = cli.worker_count {
            self.worker_count = count;
        }
        if let Some(size) = cli.chunk_size_bytes {
            self.chunk_size_bytes = size;
        }
        if let Some(marker) = cli.comment_marker {
            self.comment_marker = marker;
        }
        if let Some(every) = cli.report_every {
            self.report_every = every;
        }
        if let Some(secs) = cli.progress_interval_secs {
            self.progress_interval_secs = secs;
        }
        if let Some(words) = cli.expected_words {
            self.expected_words = words;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Checks the values a scan cannot run without
    pub fn validate(&self) -> ScanResult<()> {
        if self.secret_path.as_os_str().is_empty() {
            return Err(ScanError::config_error("no secret file given"));
        }
        if self.candidate_path.as_os_str().is_empty() {
            return Err(ScanError::config_error("no wordlist given"));
        }
        if self.report_every == 0 {
            return Err(ScanError::config_error(
                "report_every must be greater than zero",
            ));
        }
        if self.expected_words == 0 {
            return Err(ScanError::config_error(
                "expected_words must be greater than zero",
            ));
        }
        if self.comment_marker.is_empty() {
            return Err(ScanError::config_error("comment_marker must not be empty"));
        }
        Ok(())
    }

    /// Upper bound on the number of candidates in one batch.
    ///
    /// Every completed line inside a chunk costs at least one byte plus its `\n`, and the
    /// line completed from the carried-over fragment adds one more.
    pub fn max_batch_lines(&self) -> usize {
        self.chunk_size_bytes.get() / 2 + 1
    }

    /// Interval of the progress timer, `None` when disabled
    pub fn progress_interval(&self) -> Option<std::time::Duration> {
        (self.progress_interval_secs > 0)
            .then(|| std::time::Duration::from_secs(self.progress_interval_secs))
    }
}
