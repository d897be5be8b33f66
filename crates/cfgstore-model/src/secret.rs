//! Per-snapshot value encryption
//!
//! Confidential values are written in ENCODED mode as
//! `ENC-SIV1:<base64(nonce ‖ ciphertext ‖ tag)>`, sealed with AES-256-GCM-SIV.
//! The key is derived from the snapshot's create time, so any store that
//! knows the create time can read its own documents back.
//!
//! Each snapshot seals with one fixed nonce, so encoding the same snapshot
//! twice yields the same bytes. GCM-SIV tolerates the reuse: it reveals only
//! whether two sealed values are equal.

use crate::error::ValueError;
use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of encrypted wire values
pub const ENCRYPTED_PREFIX: &str = "ENC-SIV1:";

const KEY_LABEL: &[u8] = b"cfgstore.value-secret.key.v1";
const NONCE_LABEL: &[u8] = b"cfgstore.value-secret.nonce.v1";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric secret for confidential values of one snapshot
#[derive(Clone, PartialEq, Eq)]
pub struct ValueSecret {
    key: [u8; 32],
    nonce: [u8; NONCE_LEN],
}

impl fmt::Debug for ValueSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSecret").finish_non_exhaustive()
    }
}

impl ValueSecret {
    /// Derive the secret for a snapshot from its create time
    ///
    /// # Errors
    /// Returns error if the MAC cannot be keyed
    pub fn derive(create_time: &str) -> Result<Self, ValueError> {
        let key: [u8; 32] = hmac_sha256(KEY_LABEL, create_time.as_bytes())?;
        let full = hmac_sha256(NONCE_LABEL, create_time.as_bytes())?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&full[..NONCE_LEN]);
        Ok(Self { key, nonce })
    }

    /// Whether `value` looks like output of [`ValueSecret::encrypt`]
    #[inline]
    #[must_use]
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }

    /// Encrypt a plaintext
    ///
    /// # Errors
    /// Returns error if the cipher rejects the input
    pub fn encrypt(&self, plaintext: &str) -> Result<String, ValueError> {
        let sealed = self
            .cipher()?
            .encrypt(Nonce::from_slice(&self.nonce), plaintext.as_bytes())
            .map_err(|_| ValueError::Crypto("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&sealed);
        Ok(format!("{ENCRYPTED_PREFIX}{}", STANDARD.encode(out)))
    }

    /// Decrypt a value produced by [`ValueSecret::encrypt`]
    ///
    /// The nonce is read from the payload, not from this secret.
    ///
    /// # Errors
    /// Returns error on a missing prefix, bad base64, truncated input, a
    /// failed tag check (wrong snapshot or tampering) or non-UTF-8 plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String, ValueError> {
        let payload = encoded
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or_else(|| ValueError::Crypto("missing encryption prefix".into()))?;
        let raw = STANDARD
            .decode(payload.trim())
            .map_err(|e| ValueError::Crypto(format!("invalid base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(ValueError::Crypto("ciphertext too short".into()));
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| ValueError::Crypto("authentication tag mismatch".into()))?;
        String::from_utf8(plain).map_err(|e| ValueError::Crypto(format!("invalid utf-8: {e}")))
    }

    fn cipher(&self) -> Result<Aes256GcmSiv, ValueError> {
        Aes256GcmSiv::new_from_slice(&self.key).map_err(|e| ValueError::Crypto(e.to_string()))
    }
}

fn hmac_sha256(label: &[u8], data: &[u8]) -> Result<[u8; 32], ValueError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(label).map_err(|e| ValueError::Crypto(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
