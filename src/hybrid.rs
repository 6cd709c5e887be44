//! Hybrid record: KEM → KDF → AEAD
//!
//! The non-CCA encryption path. A session key is encapsulated by the chosen
//! KEM, run through HKDF under its own domain label, and used to AEAD-seal
//! the payload into the `_ED` entry of the same container. Decryption
//! reverses the steps; every failure surfaces as
//! [`AbeError::DecryptionFailed`] (or `PolicyUnsatisfied` when the key
//! simply cannot decapsulate).

#![forbid(unsafe_code)]

use rand::{CryptoRng, RngCore};
use tracing::debug;
use zeroize::Zeroizing;

use crate::arith::gt_to_bytes;
use crate::cp_waters::{self, CpMasterPublicKey, CpUserKey};
use crate::curves::CurveBackend;
use crate::drbg::derive_aead_key;
use crate::kp_gpsw::{self, KpMasterPublicKey, KpUserKey};
use crate::policy::{AttributeList, Policy};
use crate::symm::{open_record, seal_record, Aes256GcmCipher, AEAD_NONCE_LEN};
use crate::wire::{Container, Encoding, SchemeId, LABEL_PAYLOAD};
use crate::AbeError;

/// KDF label binding AEAD keys to the hybrid record.
const KDF_LABEL: &[u8] = b"hybrid-kem";

/// Encrypt `plaintext` under a ciphertext policy (CPA-secure record).
pub fn seal_cp<B: CurveBackend>(
    mpk: &CpMasterPublicKey<B>,
    policy: &Policy,
    plaintext: &[u8],
    enc: Encoding,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Container, AbeError> {
    let (ct_kem, kgt) = cp_waters::encap::<B>(mpk, policy, rng);
    let mut container = cp_waters::ct_to_container::<B>(&ct_kem, enc, SchemeId::CpWaters);
    let kgt_bytes = Zeroizing::new(gt_to_bytes::<B>(&kgt));
    attach_payload(&mut container, &kgt_bytes, plaintext, rng)?;
    debug!(policy = policy.canonical(), "hybrid seal (cp)");
    Ok(container)
}

/// Decrypt a [`SchemeId::CpWaters`] hybrid record.
pub fn open_cp<B: CurveBackend>(
    sk: &CpUserKey<B>,
    container: &Container,
) -> Result<Vec<u8>, AbeError> {
    if container.scheme() != SchemeId::CpWaters {
        return Err(AbeError::InvalidParameter("not a CP-Waters hybrid record".to_string()));
    }
    let ct_kem = cp_waters::ct_from_container::<B>(container)
        .map_err(|_| AbeError::DecryptionFailed)?;
    let kgt = cp_waters::decap::<B>(sk, &ct_kem).map_err(|_| AbeError::DecryptionFailed)?;
    debug!(policy = ct_kem.policy.canonical(), "hybrid open (cp)");
    detach_payload(container, &Zeroizing::new(gt_to_bytes::<B>(&kgt)))
}

/// Encrypt `plaintext` under an attribute set (CPA-secure record).
pub fn seal_kp<B: CurveBackend>(
    mpk: &KpMasterPublicKey<B>,
    attrs: &AttributeList,
    plaintext: &[u8],
    enc: Encoding,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Container, AbeError> {
    let (ct_kem, kgt) = kp_gpsw::encap::<B>(mpk, attrs, rng);
    let mut container = kp_gpsw::ct_to_container::<B>(&ct_kem, enc, SchemeId::KpGpsw);
    let kgt_bytes = Zeroizing::new(gt_to_bytes::<B>(&kgt));
    attach_payload(&mut container, &kgt_bytes, plaintext, rng)?;
    debug!(attrs = attrs.len(), "hybrid seal (kp)");
    Ok(container)
}

/// Decrypt a [`SchemeId::KpGpsw`] hybrid record.
pub fn open_kp<B: CurveBackend>(
    sk: &KpUserKey<B>,
    container: &Container,
) -> Result<Vec<u8>, AbeError> {
    if container.scheme() != SchemeId::KpGpsw {
        return Err(AbeError::InvalidParameter("not a KP-GPSW hybrid record".to_string()));
    }
    let ct_kem = kp_gpsw::ct_from_container::<B>(container)
        .map_err(|_| AbeError::DecryptionFailed)?;
    let kgt = kp_gpsw::decap::<B>(sk, &ct_kem).map_err(|_| AbeError::DecryptionFailed)?;
    debug!(attrs = ct_kem.attrs.len(), "hybrid open (kp)");
    detach_payload(container, &Zeroizing::new(gt_to_bytes::<B>(&kgt)))
}

fn attach_payload(
    container: &mut Container,
    kgt_bytes: &[u8],
    plaintext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(), AbeError> {
    let key = derive_aead_key(kgt_bytes, KDF_LABEL);
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    rng.fill_bytes(&mut nonce);
    let record = seal_record(&Aes256GcmCipher, &key, &nonce, plaintext)?;
    container.put_bytes(LABEL_PAYLOAD, &record);
    Ok(())
}

fn detach_payload(container: &Container, kgt_bytes: &[u8]) -> Result<Vec<u8>, AbeError> {
    let key = derive_aead_key(kgt_bytes, KDF_LABEL);
    let record = container
        .get_bytes(LABEL_PAYLOAD)
        .map_err(|_| AbeError::DecryptionFailed)?;
    open_record(&Aes256GcmCipher, &key, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::Bls12381;
    use crate::drbg::AesCtrDrbg;

    type B = Bls12381;

    #[test]
    fn cp_record_round_trips() {
        let mut rng = AesCtrDrbg::new(b"hybrid-cp");
        let (mpk, msk) = cp_waters::setup::<B>(&mut rng);
        let sk = cp_waters::keygen::<B>(
            &mpk,
            &msk,
            &AttributeList::new(["a", "b"]).unwrap(),
            &mut rng,
        );
        let policy = Policy::parse("(a and b)").unwrap();
        let ct = seal_cp::<B>(&mpk, &policy, b"the payload", Encoding::Legacy, &mut rng).unwrap();
        let parsed = Container::from_bytes(&ct.to_bytes().unwrap()).unwrap();
        assert_eq!(open_cp::<B>(&sk, &parsed).unwrap(), b"the payload");
    }

    #[test]
    fn kp_record_round_trips() {
        let mut rng = AesCtrDrbg::new(b"hybrid-kp");
        let (mpk, msk) = kp_gpsw::setup::<B>(&mut rng);
        let policy = Policy::parse("(a or b)").unwrap();
        let sk = kp_gpsw::keygen::<B>(&mpk, &msk, &policy, &mut rng);
        let attrs = AttributeList::new(["b"]).unwrap();
        let ct = seal_kp::<B>(&mpk, &attrs, b"kp payload", Encoding::Legacy, &mut rng).unwrap();
        assert_eq!(open_kp::<B>(&sk, &ct).unwrap(), b"kp payload");
    }

    #[test]
    fn tampered_payload_fails() {
        let mut rng = AesCtrDrbg::new(b"hybrid-tamper");
        let (mpk, msk) = cp_waters::setup::<B>(&mut rng);
        let sk = cp_waters::keygen::<B>(&mpk, &msk, &AttributeList::new(["x"]).unwrap(), &mut rng);
        let policy = Policy::parse("x").unwrap();
        let mut ct = seal_cp::<B>(&mpk, &policy, b"data", Encoding::Legacy, &mut rng).unwrap();
        let entry = ct.entry_mut(LABEL_PAYLOAD).unwrap();
        let last = entry.body.len() - 1;
        entry.body[last] ^= 0x01;
        assert!(matches!(open_cp::<B>(&sk, &ct), Err(AbeError::DecryptionFailed)));
    }

    #[test]
    fn wrong_scheme_container_is_rejected() {
        let mut rng = AesCtrDrbg::new(b"hybrid-scheme");
        let (mpk, msk) = cp_waters::setup::<B>(&mut rng);
        let sk = cp_waters::keygen::<B>(&mpk, &msk, &AttributeList::new(["x"]).unwrap(), &mut rng);
        let policy = Policy::parse("x").unwrap();
        let ct = crate::cca::encrypt_cp::<B>(&mpk, &policy, b"m", Encoding::Legacy, &mut rng)
            .unwrap();
        assert!(matches!(open_cp::<B>(&sk, &ct), Err(AbeError::InvalidParameter(_))));
    }
}
