//! Deterministic randomness: AES-CTR DRBG, nonce derivation, KDF
//!
//! The DRBG is the only entropy source any routine in this crate consumes.
//! It is seeded by a caller-supplied byte string, fully replaced by
//! `reseed`, and its output is a pure function of the seed; the CCA wrapper
//! relies on this when it reseeds an inner DRBG with the nonce
//! `u = SHA-256(r ‖ K ‖ binding)` and replays an encapsulation bit-for-bit.
//!
//! Construction: the seed is hashed to an AES-256 key and the keystream of
//! AES-256-CTR over a zero IV is the output stream. `getrandom(n)` returns
//! the next `n` keystream bytes.
//!
//! The KDF (HKDF-SHA-256) turns a serialized KEM output into a fixed 32-byte
//! AEAD key under a domain label.

#![forbid(unsafe_code)]

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type Aes256Ctr = Ctr128BE<Aes256>;

/// Seed-driven deterministic byte generator (AES-256-CTR keystream).
///
/// Implements the `rand` traits so it slots into every sampling helper in
/// [`crate::arith`]. Cloning is deliberately not provided; a DRBG instance
/// is owned by exactly one operation at a time.
pub struct AesCtrDrbg {
    cipher: Aes256Ctr,
}

impl AesCtrDrbg {
    /// Instantiate from a seed byte string.
    pub fn new(seed: &[u8]) -> Self {
        Self { cipher: Self::cipher_for(seed) }
    }

    /// Replace the full generator state with one derived from `seed`.
    pub fn reseed(&mut self, seed: &[u8]) {
        self.cipher = Self::cipher_for(seed);
    }

    /// Return the next `n` deterministic bytes.
    pub fn getrandom(&mut self, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        self.fill_bytes(&mut out);
        out
    }

    fn cipher_for(seed: &[u8]) -> Aes256Ctr {
        let mut h = Sha256::new();
        h.update(b"myabe-drbg-key:");
        h.update(seed);
        let key: [u8; 32] = h.finalize().into();
        let iv = [0u8; 16];
        Aes256Ctr::new(&key.into(), &iv.into())
    }
}

impl RngCore for AesCtrDrbg {
    fn next_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.fill_bytes(&mut b);
        u32::from_le_bytes(b)
    }

    fn next_u64(&mut self) -> u64 {
        let mut b = [0u8; 8];
        self.fill_bytes(&mut b);
        u64::from_le_bytes(b)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // keystream XOR zeros = keystream
        dest.fill(0);
        self.cipher.apply_keystream(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for AesCtrDrbg {}

/// Nonce `u = SHA-256(r ‖ K ‖ binding)`.
///
/// `binding` is the canonical policy string (CP) or the newline-joined
/// canonical attribute list (KP); the concatenation order is normative.
pub fn derive_reencryption_nonce(r: &[u8], k: &[u8], binding: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(r);
    h.update(k);
    h.update(binding);
    h.finalize().into()
}

/// HKDF-SHA-256 from a serialized KEM output to a 32-byte AEAD key.
pub fn derive_aead_key(ikm: &[u8], label: &[u8]) -> Zeroizing<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(label, &mut okm[..])
        .expect("32 bytes is a valid HKDF-SHA-256 output length");
    okm
}
