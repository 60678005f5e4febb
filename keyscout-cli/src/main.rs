use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use keyscout::{
    config::{EncodingMode, ScanConfig, ScanOverrides},
    predicate::MnemonicPredicate,
    results::{ScanOutcome, ScanReport},
    scan::{ProgressSink, ProgressSnapshot, Scanner},
    ScanError,
};
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, ScanError>;

/// Search a wordlist for the password of an encrypted wallet mnemonic
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Wallet export (JSON list of records) holding the encrypted mnemonic
    #[arg(short = 'w', long)]
    wallet: Option<PathBuf>,

    /// Wordlist with one candidate password per line
    #[arg(short = 'l', long)]
    wordlist: Option<PathBuf>,

    /// Number of worker threads (default: CPU cores)
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Bytes read from the wordlist per chunk
    #[arg(short = 'c', long)]
    chunk_size: Option<NonZeroUsize>,

    /// Lines starting with this marker are skipped
    #[arg(long)]
    comment: Option<String>,

    /// Candidates a worker tests between progress reports
    #[arg(long)]
    report_every: Option<u64>,

    /// Seconds between progress updates (0 disables them)
    #[arg(long)]
    progress_interval: Option<u64>,

    /// Word count of the recovered mnemonic
    #[arg(long)]
    words: Option<usize>,

    /// How to handle invalid UTF-8 in the wordlist (lossy|failfast)
    #[arg(long)]
    encoding: Option<EncodingMode>,

    /// Configuration file layered over the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ScanOverrides {
        ScanOverrides {
            secret_path: self.wallet.clone(),
            candidate_path: self.wordlist.clone(),
            worker_count: self.threads,
            chunk_size_bytes: self.chunk_size,
            comment_marker: self.comment.clone(),
            report_every: self.report_every,
            progress_interval_secs: self.progress_interval,
            expected_words: self.words,
            encoding_mode: self.encoding,
            log_level: self.log_level.clone(),
        }
    }
}

/// Progress bar over the bytes of the wordlist
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total_bytes: u64) -> Self {
        let bar = ProgressBar::new(total_bytes);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn report(&mut self, snapshot: &ProgressSnapshot) {
        self.bar.set_length(snapshot.total_size);
        self.bar.set_position(snapshot.file_position);
        self.bar.set_message(format!(
            "{} tested ({:.0}/s)",
            snapshot.tested_total, snapshot.rate
        ));
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if e.is_input_error() {
                eprintln!(
                    "{}",
                    "No candidates were tested; check --wallet and --config".dimmed()
                );
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();

    let config = ScanConfig::load_from(cli.config.as_deref())
        .map_err(|e| ScanError::config_error(e.to_string()))?
        .merge_with_cli(cli.overrides());

    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    let total_bytes = std::fs::metadata(&config.candidate_path)
        .map(|m| m.len())
        .unwrap_or(0);
    let scanner = Scanner::new(config.clone(), MnemonicPredicate::new(config.expected_words));
    let report = scanner.run_with_progress(&mut BarProgress::new(total_bytes))?;

    print_report(&report);
    Ok(report.is_found())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_report(report: &ScanReport) {
    match &report.outcome {
        ScanOutcome::Found(found) => {
            println!("{} {}", "Password found:".green().bold(), found.candidate);
            println!("{} {}", "Mnemonic:".green(), found.plaintext);
        }
        ScanOutcome::NotFound => {
            println!("{}", "Password not found in wordlist".yellow());
        }
    }

    let summary = &report.summary;
    eprintln!(
        "Tested {} candidates in {:.2}s ({:.0}/s) with {} workers",
        summary.tested_total,
        summary.elapsed.as_secs_f64(),
        summary.rate(),
        summary.workers
    );
}
