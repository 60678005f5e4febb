pub mod config;
pub mod errors;
pub mod metrics;
pub mod predicate;
pub mod results;
pub mod scan;
pub mod wallet;

pub use config::{EncodingMode, ScanConfig, ScanOverrides};
pub use errors::{ScanError, ScanResult};
pub use predicate::{MnemonicPredicate, Predicate};
pub use results::{MatchResult, ScanOutcome, ScanReport, ScanSummary};
pub use scan::{scan, Scanner};
pub use wallet::SecretRecord;
