//! AES-256-CBC cipher for cookie payloads.
//!
//! Envelope format is `base64(iv || ciphertext)` with a fresh random 16-byte
//! IV per call, compatible with what the backend's encrypter produces. CBC
//! carries no authentication tag: a failed padding check catches most
//! corruption, but a successful decrypt is NOT proof of integrity and
//! callers must not treat it as such.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length in bytes, prepended to every ciphertext.
pub const IV_LEN: usize = 16;
/// AES block length in bytes.
const BLOCK_LEN: usize = 16;
/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// Conventional prefix on base64 key material, accepted and stripped.
pub const KEY_PREFIX: &str = "base64:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("cipher key is not configured")]
    MissingKey,
    #[error("cipher key must be base64 for exactly {KEY_LEN} bytes")]
    InvalidKey,
    #[error("envelope is not valid base64")]
    InvalidEnvelope,
    #[error("envelope is too short to carry an IV and a ciphertext block")]
    TruncatedEnvelope,
    #[error("decryption failed: corrupted ciphertext or wrong key")]
    Decrypt,
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
}

/// 256-bit key material, fixed at startup.
///
/// The only supported input encoding is base64 (optionally carrying the
/// `base64:` prefix). Raw-UTF-8 keys are rejected; mixing encodings would
/// silently break cookies written under the other interpretation.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey([u8; KEY_LEN]);

impl CipherKey {
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(CipherError::MissingKey);
        }
        let trimmed = trimmed.strip_prefix(KEY_PREFIX).unwrap_or(trimmed);
        let bytes = BASE64
            .decode(trimmed)
            .map_err(|_| CipherError::InvalidKey)?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Cipher {
    key: CipherKey,
}

impl Cipher {
    #[must_use]
    pub fn new(key: CipherKey) -> Self {
        Self { key }
    }

    /// Encrypt a plaintext string into a fresh envelope.
    ///
    /// Every call draws a new random IV; two encryptions of the same
    /// plaintext never produce the same envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let encryptor = Aes256CbcEnc::new_from_slices(&self.key.0, &iv)
            .map_err(|_| CipherError::InvalidKey)?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut combined = Vec::with_capacity(IV_LEN + ciphertext.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt an envelope produced by [`Cipher::encrypt`].
    ///
    /// Rejects malformed base64, envelopes too short to carry an IV, and
    /// ciphertexts that fail the padding check after decryption.
    pub fn decrypt(&self, envelope: &str) -> Result<String, CipherError> {
        let combined = BASE64
            .decode(envelope.trim())
            .map_err(|_| CipherError::InvalidEnvelope)?;
        if combined.len() < IV_LEN + BLOCK_LEN {
            return Err(CipherError::TruncatedEnvelope);
        }
        let (iv, ciphertext) = combined.split_at(IV_LEN);

        let decryptor = Aes256CbcDec::new_from_slices(&self.key.0, iv)
            .map_err(|_| CipherError::InvalidKey)?;
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::NotUtf8)
    }
}
