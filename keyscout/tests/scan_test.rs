use anyhow::Result;
use keyscout::predicate::cipher;
use keyscout::{
    scan, EncodingMode, ScanConfig, ScanError, ScanOutcome, Scanner, SecretRecord,
};
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const PASSWORD: &str = "alpaca123";

fn mnemonic() -> String {
    (0..34)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_wallet(dir: &Path, encrypted: bool) -> Result<std::path::PathBuf> {
    let mnemonic = if encrypted {
        cipher::seal(&mnemonic(), PASSWORD, [3, 1, 4, 1, 5, 9, 2, 6])
    } else {
        mnemonic()
    };
    let record = SecretRecord {
        encrypted,
        mnemonic,
    };
    let path = dir.join("wallet.json");
    fs::write(&path, serde_json::to_string(&vec![record])?)?;
    Ok(path)
}

fn config(wallet: &Path, wordlist: &Path, workers: usize, chunk_size: usize) -> ScanConfig {
    ScanConfig {
        worker_count: NonZeroUsize::new(workers).unwrap(),
        chunk_size_bytes: NonZeroUsize::new(chunk_size).unwrap(),
        progress_interval_secs: 0,
        ..ScanConfig::new(wallet, wordlist)
    }
}

#[test]
fn test_finds_password_across_chunk_boundaries() -> Result<()> {
    let dir = tempdir()?;
    let wallet = write_wallet(dir.path(), true)?;
    let wordlist = dir.path().join("words.txt");
    fs::write(&wordlist, "wrong1\n#comment\nalpaca123\nwrong2\n")?;

    let report = scan(&config(&wallet, &wordlist, 2, 8))?;

    let found = report.found().expect("password should be found");
    assert_eq!(found.candidate, PASSWORD);
    assert_eq!(found.plaintext, mnemonic());
    Ok(())
}

#[test]
fn test_not_found_tests_every_candidate() -> Result<()> {
    let dir = tempdir()?;
    let wallet = write_wallet(dir.path(), true)?;
    let wordlist = dir.path().join("words.txt");
    fs::write(&wordlist, "one\r\ntwo\n\n   \n# skipped\nthree")?;

    let report = scan(&config(&wallet, &wordlist, 1, 4))?;

    assert_eq!(report.outcome, ScanOutcome::NotFound);
    assert_eq!(report.summary.tested_total, 3);
    assert_eq!(report.summary.file_position, report.summary.total_size);
    Ok(())
}

#[test]
fn test_plaintext_wallet_matches_first_candidate() -> Result<()> {
    let dir = tempdir()?;
    let wallet = write_wallet(dir.path(), false)?;
    let wordlist = dir.path().join("words.txt");
    fs::write(&wordlist, "anything\nelse\n")?;

    let report = scan(&config(&wallet, &wordlist, 1, 64))?;

    let found = report.found().expect("plaintext wallet always matches");
    assert_eq!(found.candidate, "anything");
    assert_eq!(found.plaintext, mnemonic());
    Ok(())
}

#[test]
fn test_wrong_word_count_is_not_a_match() -> Result<()> {
    let dir = tempdir()?;
    let wallet = write_wallet(dir.path(), true)?;
    let wordlist = dir.path().join("words.txt");
    fs::write(&wordlist, "alpaca123\n")?;

    let report = scan(&ScanConfig {
        expected_words: 12,
        ..config(&wallet, &wordlist, 1, 64)
    })?;
    assert_eq!(report.outcome, ScanOutcome::NotFound);
    Ok(())
}

#[test]
fn test_input_errors_before_scanning() -> Result<()> {
    let dir = tempdir()?;
    let wordlist = dir.path().join("words.txt");
    fs::write(&wordlist, "alpaca123\n")?;

    let err = scan(&config(&dir.path().join("missing.json"), &wordlist, 2, 64)).unwrap_err();
    assert!(matches!(err, ScanError::SecretNotFound(_)));
    assert!(err.is_input_error());

    let wallet = write_wallet(dir.path(), true)?;
    let err = scan(&config(&wallet, &dir.path().join("missing.txt"), 2, 64)).unwrap_err();
    assert!(matches!(err, ScanError::CandidateNotFound(_)));

    let empty = dir.path().join("empty.json");
    fs::write(&empty, "[]")?;
    let err = scan(&config(&empty, &wordlist, 2, 64)).unwrap_err();
    assert!(matches!(err, ScanError::EmptySecret(_)));
    Ok(())
}

#[test]
fn test_encoding_modes() -> Result<()> {
    let dir = tempdir()?;
    let wallet = write_wallet(dir.path(), true)?;
    let wordlist = dir.path().join("words.txt");
    fs::write(&wordlist, b"caf\xe9\nalpaca123\n")?;

    let strict = ScanConfig {
        encoding_mode: EncodingMode::FailFast,
        ..config(&wallet, &wordlist, 1, 64)
    };
    assert!(matches!(scan(&strict), Err(ScanError::Encoding { .. })));

    let lossy = ScanConfig {
        encoding_mode: EncodingMode::Lossy,
        ..config(&wallet, &wordlist, 1, 64)
    };
    assert_eq!(scan(&lossy)?.found().map(|m| m.candidate.as_str()), Some(PASSWORD));
    Ok(())
}

#[test]
fn test_chunk_size_does_not_change_candidates() -> Result<()> {
    let dir = tempdir()?;
    let wallet = write_wallet(dir.path(), true)?;
    let wordlist = dir.path().join("words.txt");
    let content: String = (0..200)
        .map(|i| match i % 10 {
            0 => format!("# comment {}\n", i),
            1 => "\n".to_string(),
            _ => format!("  pass{:03}\r\n", i),
        })
        .collect();
    fs::write(&wordlist, content)?;

    let mut runs = Vec::new();
    for chunk_size in [1, 2, 5, 13, 64, 4096] {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let scanner = Scanner::new(
            config(&wallet, &wordlist, 3, chunk_size),
            move |_: &SecretRecord, c: &str| -> Option<String> {
                recorder.lock().unwrap().push(c.to_string());
                None
            },
        );
        let report = scanner.run()?;
        assert_eq!(report.outcome, ScanOutcome::NotFound);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(report.summary.tested_total, seen.len() as u64);
        let unique: BTreeSet<String> = seen.iter().cloned().collect();
        assert_eq!(unique.len(), seen.len(), "chunk size {}", chunk_size);
        runs.push(unique);
    }

    assert_eq!(runs[0].len(), 160);
    assert!(runs.iter().all(|run| run == &runs[0]));
    Ok(())
}
