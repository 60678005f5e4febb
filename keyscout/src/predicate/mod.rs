//! The match test applied to each candidate.
//!
//! The scan machinery only needs "does this candidate unlock the secret, and if so what
//! is the plaintext". [`Predicate`] is that seam; [`MnemonicPredicate`] is the wallet
//! implementation used by the CLI, and any `Fn(&SecretRecord, &str) -> Option<String>`
//! closure works as well.

pub mod cipher;

use crate::config::DEFAULT_EXPECTED_WORDS;
use crate::wallet::SecretRecord;

/// Decides whether one candidate unlocks the secret.
///
/// Returns the recovered plaintext on a match. Failures inside the test (bad padding,
/// garbage output) are non-matches, never errors.
pub trait Predicate: Send + Sync {
    fn try_candidate(&self, secret: &SecretRecord, candidate: &str) -> Option<String>;
}

impl<F> Predicate for F
where
    F: Fn(&SecretRecord, &str) -> Option<String> + Send + Sync,
{
    fn try_candidate(&self, secret: &SecretRecord, candidate: &str) -> Option<String> {
        self(secret, candidate)
    }
}

/// Decrypts the wallet mnemonic and accepts it when it has the expected word count
#[derive(Debug, Clone, Copy)]
pub struct MnemonicPredicate {
    expected_words: usize,
}

impl MnemonicPredicate {
    pub fn new(expected_words: usize) -> Self {
        Self { expected_words }
    }

    /// Words are separated by single spaces; doubled spaces yield empty words and fail the count
    fn has_expected_words(&self, phrase: &str) -> bool {
        phrase.trim().split(' ').count() == self.expected_words
    }
}

impl Default for MnemonicPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_WORDS)
    }
}

impl Predicate for MnemonicPredicate {
    fn try_candidate(&self, secret: &SecretRecord, candidate: &str) -> Option<String> {
        // Unencrypted records skip decryption entirely, so any candidate passes
        let phrase = if secret.encrypted {
            cipher::open(&secret.mnemonic, candidate)?
        } else {
            secret.mnemonic.clone()
        };

        self.has_expected_words(&phrase).then_some(phrase)
    }
}
