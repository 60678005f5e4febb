use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::errors::{ScanError, ScanResult};

/// One wallet record from the secret payload.
///
/// When `encrypted` is false the mnemonic is already plaintext and every candidate
/// trivially "decrypts" it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub encrypted: bool,
    pub mnemonic: String,
}

/// Loads the secret payload and returns its first record
pub fn load_secret(path: &Path) -> ScanResult<SecretRecord> {
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ScanError::secret_not_found(path),
        io::ErrorKind::PermissionDenied => ScanError::permission_denied(path),
        _ => ScanError::IoError(e),
    })?;
    parse_secret(path, &contents)
}

/// Parses a secret payload already read into memory
pub fn parse_secret(path: &Path, contents: &str) -> ScanResult<SecretRecord> {
    let records: Vec<SecretRecord> =
        serde_json::from_str(contents).map_err(|e| ScanError::secret_parse(path, e))?;

    debug!(
        "Loaded {} wallet record(s) from {}",
        records.len(),
        path.display()
    );

    records
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::empty_secret(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_first_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        fs::write(
            &path,
            r#"[{"encrypted":true,"mnemonic":"U2FsdGVk","label":"main"},{"encrypted":false,"mnemonic":"x"}]"#,
        )
        .unwrap();

        let record = load_secret(&path).unwrap();
        assert!(record.encrypted);
        assert_eq!(record.mnemonic, "U2FsdGVk");
    }

    #[test]
    fn test_missing_file() {
        let err = load_secret(Path::new("does-not-exist.json")).unwrap_err();
        assert!(matches!(err, ScanError::SecretNotFound(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_malformed_and_empty_payloads() {
        let path = Path::new("wallet.json");
        assert!(matches!(
            parse_secret(path, "{not json"),
            Err(ScanError::SecretParse { .. })
        ));
        assert!(matches!(
            parse_secret(path, r#"[{"encrypted":"yes"}]"#),
            Err(ScanError::SecretParse { .. })
        ));
        assert!(matches!(
            parse_secret(path, "[]"),
            Err(ScanError::EmptySecret(_))
        ));
    }
}
