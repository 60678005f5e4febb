//! OpenSSL-compatible passphrase encryption, as produced by `openssl enc -aes-256-cbc -md md5`
//! and by CryptoJS's `AES.encrypt(text, passphrase)`.
//!
//! Wire format: `base64("Salted__" || salt[8] || ciphertext)`. Key and IV come from
//! `EVP_BytesToKey` with MD5 and a single iteration.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const SALT_MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// `EVP_BytesToKey(MD5, count = 1)` producing a 256-bit key and a 128-bit IV
fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material = Vec::with_capacity(KEY_LEN + IV_LEN + 16);
    let mut previous: Vec<u8> = Vec::new();

    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

/// Decrypts `ciphertext` with `passphrase`.
///
/// Returns `None` for anything that is not a clean decryption into UTF-8 text:
/// bad base64, a missing salt header, wrong padding or non-UTF-8 output.
pub fn open(ciphertext: &str, passphrase: &str) -> Option<String> {
    let raw = STANDARD.decode(ciphertext.trim()).ok()?;
    if raw.len() < SALT_MAGIC.len() + SALT_LEN + BLOCK_LEN || !raw.starts_with(SALT_MAGIC) {
        return None;
    }

    let salt = &raw[SALT_MAGIC.len()..SALT_MAGIC.len() + SALT_LEN];
    let body = &raw[SALT_MAGIC.len() + SALT_LEN..];
    if body.len() % BLOCK_LEN != 0 {
        return None;
    }

    let (key, iv) = derive_key_iv(passphrase.as_bytes(), salt);
    let plain = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .ok()?;

    String::from_utf8(plain).ok()
}

/// Encrypts `plaintext` under `passphrase` with a caller-chosen salt
pub fn seal(plaintext: &str, passphrase: &str, salt: [u8; SALT_LEN]) -> String {
    let (key, iv) = derive_key_iv(passphrase.as_bytes(), &salt);
    let body = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut raw = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + body.len());
    raw.extend_from_slice(SALT_MAGIC);
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&body);
    STANDARD.encode(raw)
}
