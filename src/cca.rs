//! Chosen-ciphertext wrapper (Fujisaki–Okamoto style)
//!
//! Promotes the IND-CPA KEMs to IND-CCA2 by making every ciphertext
//! self-verifying:
//!
//! 1. draw fresh 32-byte strings `r` and `K`;
//! 2. `u = SHA-256(r ‖ K ‖ binding)` where `binding` is the canonical
//!    policy (CP) or the joined attribute list (KP);
//! 3. encapsulate with an **inner DRBG seeded by `u`** — the KEM draws all
//!    of its randomness from it, so the ciphertext is a pure function of
//!    `(r, K, binding)`;
//! 4. AEAD-encrypt `r ‖ K ‖ plaintext` under `HKDF(Kgt, "cca-kem")` into
//!    the `_ED` entry.
//!
//! Decryption decapsulates, opens `_ED`, recomputes `u` from the recovered
//! `r ‖ K`, **re-encapsulates** with a fresh inner DRBG, and compares every
//! labelled element of the rebuilt KEM container against the received one
//! with a constant-time byte comparison. Both the AEAD check and the
//! re-encryption check always run; the only failure surfaced is
//! [`AbeError::DecryptionFailed`], so the API is useless as a decryption
//! oracle. A backend that sampled entropy anywhere but the inner DRBG would
//! fail every one of these comparisons — the determinism contract is
//! load-bearing here.

#![forbid(unsafe_code)]

use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use tracing::debug;
use zeroize::Zeroizing;

use crate::arith::gt_to_bytes;
use crate::cp_waters::{self, CpMasterPublicKey, CpUserKey};
use crate::curves::CurveBackend;
use crate::drbg::{derive_aead_key, derive_reencryption_nonce, AesCtrDrbg};
use crate::kp_gpsw::{self, KpMasterPublicKey, KpUserKey};
use crate::policy::{AttributeList, Policy};
use crate::symm::{open_record, seal_record, Aes256GcmCipher, AEAD_NONCE_LEN};
use crate::wire::{Container, Encoding, SchemeId, LABEL_ATTRS, LABEL_PAYLOAD, LABEL_POLICY};
use crate::AbeError;

/// Length of each of the FO seeds `r` and `K`.
const SEED_LEN: usize = 32;
/// KDF label binding the AEAD key to this wrapper.
const KDF_LABEL: &[u8] = b"cca-kem";

/// CCA-encrypt `plaintext` under a ciphertext policy.
pub fn encrypt_cp<B: CurveBackend>(
    mpk: &CpMasterPublicKey<B>,
    policy: &Policy,
    plaintext: &[u8],
    enc: Encoding,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Container, AbeError> {
    let (r, k) = draw_seeds(rng);
    let u = derive_reencryption_nonce(&*r, &*k, policy.canonical().as_bytes());
    let mut inner = AesCtrDrbg::new(&u);
    let (ct_kem, kgt) = cp_waters::encap::<B>(mpk, policy, &mut inner);
    let mut container = cp_waters::ct_to_container::<B>(&ct_kem, enc, SchemeId::CpWatersCca);
    let kgt_bytes = Zeroizing::new(gt_to_bytes::<B>(&kgt));
    seal_payload(&mut container, &kgt_bytes, &r, &k, plaintext, &mut inner)?;
    debug!(policy = policy.canonical(), "cca encrypt (cp)");
    Ok(container)
}

/// CCA-decrypt a [`SchemeId::CpWatersCca`] container.
pub fn decrypt_cp<B: CurveBackend>(
    mpk: &CpMasterPublicKey<B>,
    sk: &CpUserKey<B>,
    container: &Container,
) -> Result<Vec<u8>, AbeError> {
    if container.scheme() != SchemeId::CpWatersCca {
        return Err(AbeError::InvalidParameter("not a CP-Waters CCA ciphertext".to_string()));
    }
    let ct_kem = cp_waters::ct_from_container::<B>(container).map_err(collapse)?;
    let kgt = cp_waters::decap::<B>(sk, &ct_kem).map_err(collapse)?;
    let kgt_bytes = Zeroizing::new(gt_to_bytes::<B>(&kgt));
    let (r, k, plaintext, aead_ok) = open_payload(container, &kgt_bytes)?;

    // re-encrypt under the recovered seeds and compare, unconditionally
    let binding = container.get_str(LABEL_POLICY).map_err(collapse_wire)?;
    let u = derive_reencryption_nonce(&r[..], &k[..], binding.as_bytes());
    let mut inner = AesCtrDrbg::new(&u);
    let policy = ct_kem.policy.clone();
    let (ct2, _) = cp_waters::encap::<B>(mpk, &policy, &mut inner);
    let rebuilt =
        cp_waters::ct_to_container::<B>(&ct2, detected_encoding(container), SchemeId::CpWatersCca);
    let cca_ok = containers_agree(container, &rebuilt);
    debug!(policy = ct_kem.policy.canonical(), "cca decrypt (cp): re-encryption check complete");

    finish(plaintext, aead_ok & cca_ok)
}

/// CCA-encrypt `plaintext` under an attribute set (key-policy scheme).
pub fn encrypt_kp<B: CurveBackend>(
    mpk: &KpMasterPublicKey<B>,
    attrs: &AttributeList,
    plaintext: &[u8],
    enc: Encoding,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Container, AbeError> {
    let (r, k) = draw_seeds(rng);
    let u = derive_reencryption_nonce(&*r, &*k, attrs.joined().as_bytes());
    let mut inner = AesCtrDrbg::new(&u);
    let (ct_kem, kgt) = kp_gpsw::encap::<B>(mpk, attrs, &mut inner);
    let mut container = kp_gpsw::ct_to_container::<B>(&ct_kem, enc, SchemeId::KpGpswCca);
    let kgt_bytes = Zeroizing::new(gt_to_bytes::<B>(&kgt));
    seal_payload(&mut container, &kgt_bytes, &r, &k, plaintext, &mut inner)?;
    debug!(attrs = attrs.len(), "cca encrypt (kp)");
    Ok(container)
}

/// CCA-decrypt a [`SchemeId::KpGpswCca`] container.
pub fn decrypt_kp<B: CurveBackend>(
    mpk: &KpMasterPublicKey<B>,
    sk: &KpUserKey<B>,
    container: &Container,
) -> Result<Vec<u8>, AbeError> {
    if container.scheme() != SchemeId::KpGpswCca {
        return Err(AbeError::InvalidParameter("not a KP-GPSW CCA ciphertext".to_string()));
    }
    let ct_kem = kp_gpsw::ct_from_container::<B>(container).map_err(collapse)?;
    let kgt = kp_gpsw::decap::<B>(sk, &ct_kem).map_err(collapse)?;
    let kgt_bytes = Zeroizing::new(gt_to_bytes::<B>(&kgt));
    let (r, k, plaintext, aead_ok) = open_payload(container, &kgt_bytes)?;

    let binding = container.get_str(LABEL_ATTRS).map_err(collapse_wire)?;
    let u = derive_reencryption_nonce(&r[..], &k[..], binding.as_bytes());
    let mut inner = AesCtrDrbg::new(&u);
    let (ct2, _) = kp_gpsw::encap::<B>(mpk, &ct_kem.attrs, &mut inner);
    let rebuilt =
        kp_gpsw::ct_to_container::<B>(&ct2, detected_encoding(container), SchemeId::KpGpswCca);
    let cca_ok = containers_agree(container, &rebuilt);
    debug!(attrs = ct_kem.attrs.len(), "cca decrypt (kp): re-encryption check complete");

    finish(plaintext, aead_ok & cca_ok)
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

fn draw_seeds(
    rng: &mut (impl RngCore + CryptoRng),
) -> (Zeroizing<[u8; SEED_LEN]>, Zeroizing<[u8; SEED_LEN]>) {
    let mut r = Zeroizing::new([0u8; SEED_LEN]);
    let mut k = Zeroizing::new([0u8; SEED_LEN]);
    rng.fill_bytes(&mut *r);
    rng.fill_bytes(&mut *k);
    (r, k)
}

/// AEAD-seal `r ‖ K ‖ plaintext` into the `_ED` entry. The nonce comes from
/// the inner DRBG *after* encapsulation, so the whole ciphertext is a pure
/// function of `(r, K, binding, plaintext)`.
fn seal_payload(
    container: &mut Container,
    kgt_bytes: &[u8],
    r: &[u8; SEED_LEN],
    k: &[u8; SEED_LEN],
    plaintext: &[u8],
    inner: &mut AesCtrDrbg,
) -> Result<(), AbeError> {
    let aead_key = derive_aead_key(kgt_bytes, KDF_LABEL);
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    inner.fill_bytes(&mut nonce);
    let mut msg = Zeroizing::new(Vec::with_capacity(2 * SEED_LEN + plaintext.len()));
    msg.extend_from_slice(r);
    msg.extend_from_slice(k);
    msg.extend_from_slice(plaintext);
    let record = seal_record(&Aes256GcmCipher, &aead_key, &nonce, &msg)?;
    container.put_bytes(LABEL_PAYLOAD, &record);
    Ok(())
}

/// Open the `_ED` entry. On authentication failure this returns zeroed
/// seeds, an empty plaintext, and a false [`Choice`] so the caller can still
/// run the re-encryption arm before failing.
#[allow(clippy::type_complexity)]
fn open_payload(
    container: &Container,
    kgt_bytes: &[u8],
) -> Result<(Zeroizing<[u8; SEED_LEN]>, Zeroizing<[u8; SEED_LEN]>, Zeroizing<Vec<u8>>, Choice), AbeError>
{
    let aead_key = derive_aead_key(kgt_bytes, KDF_LABEL);
    let record = container.get_bytes(LABEL_PAYLOAD).map_err(collapse_wire)?;
    let mut r = Zeroizing::new([0u8; SEED_LEN]);
    let mut k = Zeroizing::new([0u8; SEED_LEN]);
    match open_record(&Aes256GcmCipher, &aead_key, record).map(Zeroizing::new) {
        Ok(opened) if opened.len() >= 2 * SEED_LEN => {
            r.copy_from_slice(&opened[..SEED_LEN]);
            k.copy_from_slice(&opened[SEED_LEN..2 * SEED_LEN]);
            let plaintext = Zeroizing::new(opened[2 * SEED_LEN..].to_vec());
            Ok((r, k, plaintext, Choice::from(1)))
        }
        _ => Ok((r, k, Zeroizing::new(Vec::new()), Choice::from(0))),
    }
}

/// Per-label constant-time comparison of every entry except `_ED` (which is
/// authenticated by the AEAD, not replayed). Label sets must agree exactly.
fn containers_agree(received: &Container, rebuilt: &Container) -> Choice {
    let received_kem_labels = received.labels().filter(|&l| l != LABEL_PAYLOAD).count();
    let mut ok = Choice::from(u8::from(received_kem_labels == rebuilt.len()));
    for label in received.labels() {
        if label == LABEL_PAYLOAD {
            continue;
        }
        let a = received.entry(label);
        let b = rebuilt.entry(label);
        match (a, b) {
            (Some(a), Some(b)) => {
                ok &= Choice::from(u8::from(a.tag == b.tag));
                ok &= Choice::from(u8::from(a.body.len() == b.body.len()));
                if a.body.len() == b.body.len() {
                    ok &= a.body.ct_eq(&b.body);
                }
            }
            _ => ok = Choice::from(0),
        }
    }
    ok
}

/// The rebuilt container must re-encode the way the sender encoded; all
/// group entries of one ciphertext share a framing, detected from `Cprime`
/// or any other element entry.
fn detected_encoding(container: &Container) -> Encoding {
    for label in container.labels() {
        if label == LABEL_PAYLOAD {
            continue;
        }
        if let Some(e) = container.entry(label) {
            if e.tag != crate::wire::ElementTag::Bytes {
                return e.encoding();
            }
        }
    }
    Encoding::Legacy
}

fn finish(plaintext: Zeroizing<Vec<u8>>, ok: Choice) -> Result<Vec<u8>, AbeError> {
    if bool::from(ok) {
        Ok(plaintext.to_vec())
    } else {
        Err(AbeError::DecryptionFailed)
    }
}

/// Collapse inner parse failures into the non-specific decryption error so
/// malformed ciphertexts are indistinguishable from tampered ones.
fn collapse(_: AbeError) -> AbeError {
    AbeError::DecryptionFailed
}

/// Same collapse, for errors coming out of the wire-format layer.
fn collapse_wire(_: crate::wire::WireError) -> AbeError {
    AbeError::DecryptionFailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::Bls12381;
    use crate::drbg::AesCtrDrbg;

    type B = Bls12381;

    fn cp_fixture(
        seed: &[u8],
        attrs: &[&str],
    ) -> (CpMasterPublicKey<B>, CpUserKey<B>) {
        let mut rng = AesCtrDrbg::new(seed);
        let (mpk, msk) = cp_waters::setup::<B>(&mut rng);
        let sk = cp_waters::keygen::<B>(
            &mpk,
            &msk,
            &AttributeList::new(attrs.iter().copied()).unwrap(),
            &mut rng,
        );
        (mpk, sk)
    }

    #[test]
    fn cp_round_trip_recovers_the_plaintext() {
        let (mpk, sk) = cp_fixture(b"cca-cp-rt", &["a", "b"]);
        let policy = Policy::parse("((a and b) or c)").unwrap();
        let mut rng = AesCtrDrbg::new(b"cca-cp-rt-enc");
        for enc in [Encoding::Legacy, Encoding::Standard] {
            let ct = encrypt_cp::<B>(&mpk, &policy, b"hello", enc, &mut rng).unwrap();
            let bytes = ct.to_bytes().unwrap();
            let parsed = Container::from_bytes(&bytes).unwrap();
            assert_eq!(decrypt_cp::<B>(&mpk, &sk, &parsed).unwrap(), b"hello");
        }
    }

    #[test]
    fn kp_round_trip_recovers_the_plaintext() {
        let mut rng = AesCtrDrbg::new(b"cca-kp-rt");
        let (mpk, msk) = kp_gpsw::setup::<B>(&mut rng);
        let policy = Policy::parse("(a and b)").unwrap();
        let sk = kp_gpsw::keygen::<B>(&mpk, &msk, &policy, &mut rng);
        let attrs = AttributeList::new(["a", "b", "z"]).unwrap();
        let ct = encrypt_kp::<B>(&mpk, &attrs, b"payload", Encoding::Legacy, &mut rng).unwrap();
        let parsed = Container::from_bytes(&ct.to_bytes().unwrap()).unwrap();
        assert_eq!(decrypt_kp::<B>(&mpk, &sk, &parsed).unwrap(), b"payload");
    }

    #[test]
    fn mismatched_attributes_fail_without_leaking_detail() {
        let (mpk, sk) = cp_fixture(b"cca-cp-unsat", &["role:guest"]);
        let policy = Policy::parse("(dept:IT and role:admin)").unwrap();
        let mut rng = AesCtrDrbg::new(b"cca-cp-unsat-enc");
        let ct = encrypt_cp::<B>(&mpk, &policy, b"secret", Encoding::Legacy, &mut rng).unwrap();
        match decrypt_cp::<B>(&mpk, &sk, &ct) {
            Err(AbeError::PolicyUnsatisfied) | Err(AbeError::DecryptionFailed) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn tamper_on_an_unused_leaf_is_caught_by_the_reencryption_check() {
        // key {a} decapsulates via leaf `a` alone; flipping a bit in leaf
        // `b`'s component leaves the AEAD intact, so only the re-encryption
        // comparison can notice.
        let (mpk, sk) = cp_fixture(b"cca-cp-tamper", &["a"]);
        let policy = Policy::parse("(a or b)").unwrap();
        let mut rng = AesCtrDrbg::new(b"cca-cp-tamper-enc");
        let mut ct = encrypt_cp::<B>(&mpk, &policy, b"msg", Encoding::Legacy, &mut rng).unwrap();

        // sanity: untampered decrypts
        assert_eq!(decrypt_cp::<B>(&mpk, &sk, &ct).unwrap(), b"msg");

        // flip the y-sign flag: the point stays valid, only its sign changes
        let entry = ct.entry_mut("C_2").expect("leaf b component");
        let last = entry.body.len() - 1;
        entry.body[last] ^= 0x80;
        assert!(matches!(
            decrypt_cp::<B>(&mpk, &sk, &ct),
            Err(AbeError::DecryptionFailed)
        ));
    }

    #[test]
    fn any_bit_flip_in_a_used_component_fails() {
        let (mpk, sk) = cp_fixture(b"cca-cp-flip", &["x"]);
        let policy = Policy::parse("x").unwrap();
        let mut rng = AesCtrDrbg::new(b"cca-cp-flip-enc");
        let ct = encrypt_cp::<B>(&mpk, &policy, b"msg", Encoding::Legacy, &mut rng).unwrap();
        for label in ["C_1", "D_1", "Cprime", "_ED"] {
            let mut tampered = ct.clone();
            let entry = tampered.entry_mut(label).unwrap();
            let last = entry.body.len() - 1;
            entry.body[last] ^= 0x80;
            assert!(
                matches!(
                    decrypt_cp::<B>(&mpk, &sk, &tampered),
                    Err(AbeError::DecryptionFailed)
                ),
                "tampering {label} must fail"
            );
        }
    }

    #[test]
    fn extra_container_entries_are_rejected() {
        let (mpk, sk) = cp_fixture(b"cca-cp-extra", &["x"]);
        let policy = Policy::parse("x").unwrap();
        let mut rng = AesCtrDrbg::new(b"cca-cp-extra-enc");
        let mut ct = encrypt_cp::<B>(&mpk, &policy, b"msg", Encoding::Legacy, &mut rng).unwrap();
        ct.put_str("Z_bogus", "junk");
        assert!(matches!(
            decrypt_cp::<B>(&mpk, &sk, &ct),
            Err(AbeError::DecryptionFailed)
        ));
    }

    #[test]
    fn full_encryption_is_deterministic_given_the_outer_draws() {
        let (mpk, _sk) = cp_fixture(b"cca-cp-det", &["x"]);
        let policy = Policy::parse("x").unwrap();
        let c1 = encrypt_cp::<B>(&mpk, &policy, b"m", Encoding::Legacy, &mut AesCtrDrbg::new(b"rk"))
            .unwrap();
        let c2 = encrypt_cp::<B>(&mpk, &policy, b"m", Encoding::Legacy, &mut AesCtrDrbg::new(b"rk"))
            .unwrap();
        assert_eq!(c1.to_bytes().unwrap(), c2.to_bytes().unwrap());
    }

    #[test]
    fn equivalent_policies_bind_to_the_same_nonce() {
        // (a and b) and (b and a) canonicalize identically, so u agrees
        let p1 = Policy::parse("(a and b)").unwrap();
        let p2 = Policy::parse("(b and a)").unwrap();
        assert_eq!(p1.canonical(), p2.canonical());
        let u1 = derive_reencryption_nonce(&[1; 32], &[2; 32], p1.canonical().as_bytes());
        let u2 = derive_reencryption_nonce(&[1; 32], &[2; 32], p2.canonical().as_bytes());
        assert_eq!(u1, u2);
    }
}
