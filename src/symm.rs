//! Authenticated encryption seam
//!
//! The collaborator interface the KEMs hand their derived keys to: a small
//! AEAD trait with fixed key/nonce/tag geometry, implemented with
//! AES-256-GCM. Records on the wire are `nonce ‖ ciphertext ‖ tag`, the
//! byte string stored under the `_ED` container label.

#![forbid(unsafe_code)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::AbeError;

/// AEAD key length (bytes).
pub const AEAD_KEY_LEN: usize = 32;
/// AEAD nonce length (bytes).
pub const AEAD_NONCE_LEN: usize = 12;
/// AEAD authentication tag length (bytes).
pub const AEAD_TAG_LEN: usize = 16;

/// Authenticated cipher with the fixed geometry above.
pub trait AeadCipher {
    /// Encrypt; returns `ciphertext ‖ tag`.
    fn encrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, AbeError>;

    /// Decrypt `ciphertext ‖ tag`; authentication failure is
    /// [`AbeError::DecryptionFailed`].
    fn decrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        ct_and_tag: &[u8],
    ) -> Result<Vec<u8>, AbeError>;
}

/// AES-256-GCM implementation of [`AeadCipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmCipher;

impl AeadCipher for Aes256GcmCipher {
    fn encrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, AbeError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| AbeError::Backend("AEAD key length".to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| AbeError::Backend("AEAD seal".to_string()))
    }

    fn decrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        ct_and_tag: &[u8],
    ) -> Result<Vec<u8>, AbeError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| AbeError::Backend("AEAD key length".to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ct_and_tag)
            .map_err(|_| AbeError::DecryptionFailed)
    }
}

/// Frame a record as `nonce ‖ ciphertext ‖ tag`.
pub fn seal_record(
    cipher: &impl AeadCipher,
    key: &[u8; AEAD_KEY_LEN],
    nonce: &[u8; AEAD_NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, AbeError> {
    let mut out = nonce.to_vec();
    out.extend(cipher.encrypt(key, nonce, plaintext)?);
    Ok(out)
}

/// Open a `nonce ‖ ciphertext ‖ tag` record.
pub fn open_record(
    cipher: &impl AeadCipher,
    key: &[u8; AEAD_KEY_LEN],
    record: &[u8],
) -> Result<Vec<u8>, AbeError> {
    if record.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
        return Err(AbeError::DecryptionFailed);
    }
    let nonce: [u8; AEAD_NONCE_LEN] = record[..AEAD_NONCE_LEN]
        .try_into()
        .map_err(|_| AbeError::DecryptionFailed)?;
    cipher.decrypt(key, &nonce, &record[AEAD_NONCE_LEN..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip() {
        let key = [0x11u8; AEAD_KEY_LEN];
        let nonce = [0x22u8; AEAD_NONCE_LEN];
        let record = seal_record(&Aes256GcmCipher, &key, &nonce, b"hello").unwrap();
        assert_eq!(record.len(), AEAD_NONCE_LEN + 5 + AEAD_TAG_LEN);
        assert_eq!(open_record(&Aes256GcmCipher, &key, &record).unwrap(), b"hello");
    }

    #[test]
    fn tampered_records_fail_closed() {
        let key = [0x11u8; AEAD_KEY_LEN];
        let nonce = [0x22u8; AEAD_NONCE_LEN];
        let mut record = seal_record(&Aes256GcmCipher, &key, &nonce, b"hello").unwrap();
        let last = record.len() - 1;
        record[last] ^= 0x01;
        assert!(matches!(
            open_record(&Aes256GcmCipher, &key, &record),
            Err(AbeError::DecryptionFailed)
        ));
        // truncated record
        assert!(matches!(
            open_record(&Aes256GcmCipher, &key, &record[..8]),
            Err(AbeError::DecryptionFailed)
        ));
        // wrong key
        let record = seal_record(&Aes256GcmCipher, &key, &nonce, b"hello").unwrap();
        assert!(matches!(
            open_record(&Aes256GcmCipher, &[0x12u8; 32], &record),
            Err(AbeError::DecryptionFailed)
        ));
    }
}
