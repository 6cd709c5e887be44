//! Crate root: public surface, configuration, and crate-wide invariants
//!
//! This module is the **single canonical entry-point** for downstream users
//! of the library. It centralizes the configuration types, the shared error
//! taxonomy, and the byte-oriented operation surface, and re-exports the
//! submodules that implement the two attribute-based KEMs.
//!
//! ## Invariants
//!
//! - **Explicit state.** Every operation takes its curve backend (a type
//!   parameter resolved through the [`curves`] catalog) and its DRBG as
//!   explicit arguments. There are no process-wide singletons, no hidden
//!   seeds, and no operation that samples entropy outside its `rng`
//!   parameter. We **forbid unsafe** throughout the crate.
//!
//! - **Determinism.** Randomized routines draw a fixed byte schedule from
//!   their DRBG ([`arith`] documents the scalar/group sampling rules), so an
//!   encapsulation replayed against an equally-seeded DRBG is bit-identical.
//!   The CCA wrapper ([`cca`]) is built entirely on this property.
//!
//! - **Canonical order.** Policies have one canonical string form
//!   ([`policy`]); leaf numbering, LSSS traversal ([`lsss`]), wire
//!   containers ([`wire`]) and the CCA comparison all walk that order.
//!   Nothing depends on hash-map iteration order.
//!
//! - **Fail closed.** Errors are typed ([`AbeError`]), partial results are
//!   never exposed, and the outer decryption error is deliberately
//!   non-specific.
//!
//! ## Surface
//!
//! The typed scheme APIs live in [`cp_waters`] and [`kp_gpsw`]; the
//! byte-level surface below ([`setup`], [`keygen`], [`encrypt`],
//! [`decrypt`], [`encap`], [`decap`]) works on serialized containers so a
//! keystore can treat every object as opaque bytes.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use rand::{CryptoRng, RngCore};

/// Group arithmetic helpers and the determinism contract.
pub mod arith;
/// Chosen-ciphertext (Fujisaki–Okamoto) wrapper.
pub mod cca;
/// Ciphertext-policy KEM (Waters).
pub mod cp_waters;
/// Curve catalog and pairing backends.
pub mod curves;
/// AES-CTR DRBG, nonce derivation, KDF.
pub mod drbg;
/// Non-CCA hybrid record (KEM → KDF → AEAD).
pub mod hybrid;
/// Key-policy KEM (Goyal–Pandey–Sahai–Waters).
pub mod kp_gpsw;
/// Linear secret sharing over policy trees.
pub mod lsss;
/// Policy trees, canonical strings, attribute lists.
pub mod policy;
/// Authenticated-encryption seam (AES-256-GCM).
pub mod symm;
/// Wire format: element framing and containers.
pub mod wire;

pub use arith::{Gt, Zr, G1, G2};
pub use curves::{CurveBackend, CurveId, CurveParams};
pub use drbg::AesCtrDrbg;
pub use policy::{AttributeList, LeafId, Policy, PolicyError, PolicyNode};
pub use wire::{Container, Encoding, SchemeId, WireError};

#[cfg(feature = "bls12_381")]
pub use curves::Bls12381;
#[cfg(feature = "bn254")]
pub use curves::Bn254;

use policy::PolicyError as PErr;

// ============================================================================
// Shared error taxonomy
// ============================================================================

/// Crate-wide error kinds.
///
/// `DecryptionFailed` deliberately covers both AEAD authentication failure
/// and a CCA re-encryption mismatch, so the API cannot be used as a
/// decryption oracle.
#[derive(Debug, thiserror::Error)]
pub enum AbeError {
    /// Malformed configuration, duplicate attribute, or mismatched input.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Curve identifier not present in the catalog.
    #[error("unknown curve `{0}`")]
    UnknownCurve(String),
    /// The attribute set does not satisfy the policy.
    #[error("attributes do not satisfy the policy")]
    PolicyUnsatisfied,
    /// Element or container (de)serialization failure.
    #[error("serialization failure: {0}")]
    Serialization(#[from] WireError),
    /// Pairing or field operation failed; indicates a backend bug.
    #[error("backend failure: {0}")]
    Backend(String),
    /// AEAD authentication failed or the re-encryption check disagreed.
    #[error("decryption failed")]
    DecryptionFailed,
    /// User key inconsistent with the public parameters.
    #[error("user key inconsistent with public parameters: {0}")]
    InvalidKey(String),
}

impl From<PErr> for AbeError {
    fn from(e: PErr) -> Self {
        AbeError::InvalidParameter(e.to_string())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// KEM variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// Ciphertext-policy (Waters): policies label ciphertexts.
    #[default]
    CpWaters,
    /// Key-policy (GPSW): policies label keys.
    KpGpsw,
}

impl Scheme {
    /// Resolve a short textual scheme identifier.
    pub fn from_name(name: &str) -> Result<Self, AbeError> {
        match name {
            "CP_WATERS" => Ok(Scheme::CpWaters),
            "KP_GPSW" => Ok(Scheme::KpGpsw),
            other => Err(AbeError::InvalidParameter(format!("unknown scheme `{other}`"))),
        }
    }
}

/// Operation configuration. These four keys are the complete recognized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbeConfig {
    /// Pairing curve (`BLS12_381` default, `BN254` legacy).
    pub curve: CurveId,
    /// KEM variant (`CP_WATERS` default).
    pub scheme: Scheme,
    /// Wrap encryptions with the CCA transform (default on).
    pub cca: bool,
    /// Per-element wire framing (default legacy).
    pub encoding: Encoding,
}

impl Default for AbeConfig {
    fn default() -> Self {
        Self {
            curve: CurveId::Bls12_381,
            scheme: Scheme::default(),
            cca: true,
            encoding: Encoding::default(),
        }
    }
}

impl AbeConfig {
    /// Apply one `key=value` option. Unknown keys and values are
    /// [`AbeError::InvalidParameter`] / [`AbeError::UnknownCurve`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), AbeError> {
        match key {
            "curve" => self.curve = CurveId::from_name(value)?,
            "scheme" => self.scheme = Scheme::from_name(value)?,
            "cca" => {
                self.cca = match value {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(AbeError::InvalidParameter(format!(
                            "cca must be on/off, got `{other}`"
                        )))
                    }
                }
            }
            "encoding" => {
                self.encoding = match value {
                    "legacy" => Encoding::Legacy,
                    "standard" => Encoding::Standard,
                    other => {
                        return Err(AbeError::InvalidParameter(format!(
                            "encoding must be legacy/standard, got `{other}`"
                        )))
                    }
                }
            }
            other => {
                return Err(AbeError::InvalidParameter(format!("unknown option `{other}`")))
            }
        }
        Ok(())
    }
}

/// Input to [`keygen`]: attributes for CP-Waters keys, a policy for KP-GPSW
/// keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRequest {
    /// Attribute set (ciphertext-policy scheme).
    Attributes(Vec<String>),
    /// Policy text (key-policy scheme).
    Policy(String),
}

/// What an encryption binds to: a policy for CP-Waters, an attribute set for
/// KP-GPSW.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptTarget {
    /// Policy text (ciphertext-policy scheme).
    Policy(String),
    /// Attribute set (key-policy scheme).
    Attributes(Vec<String>),
}

// ============================================================================
// Byte-level operation surface
// ============================================================================

/// Resolve the backend for a catalog id and run `$body` with `$B` bound to
/// its type. Feature-gated curves fall through to `UnknownCurve`.
macro_rules! with_backend {
    ($curve:expr, $B:ident => $body:expr) => {
        match $curve {
            #[cfg(feature = "bls12_381")]
            CurveId::Bls12_381 => {
                type $B = crate::curves::Bls12381;
                $body
            }
            #[cfg(feature = "bn254")]
            CurveId::Bn254 => {
                type $B = crate::curves::Bn254;
                $body
            }
            #[allow(unreachable_patterns)]
            other => Err(AbeError::UnknownCurve(other.name().to_string())),
        }
    };
}

/// Generate a serialized `(MPK, MSK)` pair for the configured scheme.
pub fn setup(
    cfg: &AbeConfig,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(Vec<u8>, Vec<u8>), AbeError> {
    with_backend!(cfg.curve, B => match cfg.scheme {
        Scheme::CpWaters => {
            let (mpk, msk) = cp_waters::setup::<B>(rng);
            Ok((
                cp_waters::mpk_to_container::<B>(&mpk, cfg.encoding).to_bytes()?,
                cp_waters::msk_to_container::<B>(&msk).to_bytes()?,
            ))
        }
        Scheme::KpGpsw => {
            let (mpk, msk) = kp_gpsw::setup::<B>(rng);
            Ok((
                kp_gpsw::mpk_to_container::<B>(&mpk, cfg.encoding).to_bytes()?,
                kp_gpsw::msk_to_container::<B>(&msk).to_bytes()?,
            ))
        }
    })
}

/// Issue a serialized user key.
pub fn keygen(
    cfg: &AbeConfig,
    mpk: &[u8],
    msk: &[u8],
    request: &KeyRequest,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>, AbeError> {
    let mpk = Container::from_bytes(mpk)?;
    let msk = Container::from_bytes(msk)?;
    with_backend!(cfg.curve, B => match cfg.scheme {
        Scheme::CpWaters => {
            let KeyRequest::Attributes(attrs) = request else {
                return Err(AbeError::InvalidParameter(
                    "CP-Waters keys are bound to attributes".to_string(),
                ));
            };
            let attrs = AttributeList::new(attrs.iter().cloned())?;
            let mpk = cp_waters::mpk_from_container::<B>(&mpk)?;
            let msk = cp_waters::msk_from_container::<B>(&msk)?;
            let sk = cp_waters::keygen::<B>(&mpk, &msk, &attrs, rng);
            Ok(cp_waters::sk_to_container::<B>(&sk, cfg.encoding).to_bytes()?)
        }
        Scheme::KpGpsw => {
            let KeyRequest::Policy(text) = request else {
                return Err(AbeError::InvalidParameter(
                    "KP-GPSW keys are bound to a policy".to_string(),
                ));
            };
            let policy = Policy::parse(text)?;
            let mpk = kp_gpsw::mpk_from_container::<B>(&mpk)?;
            let msk = kp_gpsw::msk_from_container::<B>(&msk)?;
            let sk = kp_gpsw::keygen::<B>(&mpk, &msk, &policy, rng);
            Ok(kp_gpsw::sk_to_container::<B>(&sk, cfg.encoding).to_bytes()?)
        }
    })
}

/// Encrypt `plaintext`, CCA-wrapped unless configured off.
pub fn encrypt(
    cfg: &AbeConfig,
    mpk: &[u8],
    target: &EncryptTarget,
    plaintext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>, AbeError> {
    let mpk = Container::from_bytes(mpk)?;
    with_backend!(cfg.curve, B => match cfg.scheme {
        Scheme::CpWaters => {
            let EncryptTarget::Policy(text) = target else {
                return Err(AbeError::InvalidParameter(
                    "CP-Waters encrypts under a policy".to_string(),
                ));
            };
            let policy = Policy::parse(text)?;
            let mpk = cp_waters::mpk_from_container::<B>(&mpk)?;
            let ct = if cfg.cca {
                cca::encrypt_cp::<B>(&mpk, &policy, plaintext, cfg.encoding, rng)?
            } else {
                hybrid::seal_cp::<B>(&mpk, &policy, plaintext, cfg.encoding, rng)?
            };
            Ok(ct.to_bytes()?)
        }
        Scheme::KpGpsw => {
            let EncryptTarget::Attributes(attrs) = target else {
                return Err(AbeError::InvalidParameter(
                    "KP-GPSW encrypts under attributes".to_string(),
                ));
            };
            let attrs = AttributeList::new(attrs.iter().cloned())?;
            let mpk = kp_gpsw::mpk_from_container::<B>(&mpk)?;
            let ct = if cfg.cca {
                cca::encrypt_kp::<B>(&mpk, &attrs, plaintext, cfg.encoding, rng)?
            } else {
                hybrid::seal_kp::<B>(&mpk, &attrs, plaintext, cfg.encoding, rng)?
            };
            Ok(ct.to_bytes()?)
        }
    })
}

/// Decrypt a serialized ciphertext with a serialized user key. Scheme,
/// framing, and curve are discovered from the containers; the key must be on
/// the ciphertext's curve.
pub fn decrypt(mpk: &[u8], sk: &[u8], ct: &[u8]) -> Result<Vec<u8>, AbeError> {
    let ct = Container::from_bytes(ct)?;
    let sk = Container::from_bytes(sk)?;
    let mpk = Container::from_bytes(mpk)?;
    let curve = CurveId::from_byte(ct.curve_byte()?)?;
    if sk.curve_byte()? != curve as u8 {
        return Err(AbeError::InvalidKey("key and ciphertext curves differ".to_string()));
    }
    check_key_family(&sk, ct.scheme())?;
    with_backend!(curve, B => match ct.scheme() {
        SchemeId::CpWatersCca => {
            let mpk = cp_waters::mpk_from_container::<B>(&mpk)?;
            let sk = cp_waters::sk_from_container::<B>(&sk)?;
            cca::decrypt_cp::<B>(&mpk, &sk, &ct)
        }
        SchemeId::CpWaters => {
            let sk = cp_waters::sk_from_container::<B>(&sk)?;
            hybrid::open_cp::<B>(&sk, &ct)
        }
        SchemeId::KpGpswCca => {
            let mpk = kp_gpsw::mpk_from_container::<B>(&mpk)?;
            let sk = kp_gpsw::sk_from_container::<B>(&sk)?;
            cca::decrypt_kp::<B>(&mpk, &sk, &ct)
        }
        SchemeId::KpGpsw => {
            let sk = kp_gpsw::sk_from_container::<B>(&sk)?;
            hybrid::open_kp::<B>(&sk, &ct)
        }
    })
}

/// Encapsulate a session key; returns `(ciphertext bytes, serialized GT
/// session key)`.
pub fn encap(
    cfg: &AbeConfig,
    mpk: &[u8],
    target: &EncryptTarget,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<(Vec<u8>, Vec<u8>), AbeError> {
    let mpk = Container::from_bytes(mpk)?;
    with_backend!(cfg.curve, B => match cfg.scheme {
        Scheme::CpWaters => {
            let EncryptTarget::Policy(text) = target else {
                return Err(AbeError::InvalidParameter(
                    "CP-Waters encapsulates under a policy".to_string(),
                ));
            };
            let policy = Policy::parse(text)?;
            let mpk = cp_waters::mpk_from_container::<B>(&mpk)?;
            let (ct, kgt) = cp_waters::encap::<B>(&mpk, &policy, rng);
            Ok((
                cp_waters::ct_to_container::<B>(&ct, cfg.encoding, SchemeId::CpWaters)
                    .to_bytes()?,
                arith::gt_to_bytes::<B>(&kgt),
            ))
        }
        Scheme::KpGpsw => {
            let EncryptTarget::Attributes(attrs) = target else {
                return Err(AbeError::InvalidParameter(
                    "KP-GPSW encapsulates under attributes".to_string(),
                ));
            };
            let attrs = AttributeList::new(attrs.iter().cloned())?;
            let mpk = kp_gpsw::mpk_from_container::<B>(&mpk)?;
            let (ct, kgt) = kp_gpsw::encap::<B>(&mpk, &attrs, rng);
            Ok((
                kp_gpsw::ct_to_container::<B>(&ct, cfg.encoding, SchemeId::KpGpsw).to_bytes()?,
                arith::gt_to_bytes::<B>(&kgt),
            ))
        }
    })
}

/// Decapsulate a session key (serialized GT form) from a KEM ciphertext.
pub fn decap(sk: &[u8], ct: &[u8]) -> Result<Vec<u8>, AbeError> {
    let ct = Container::from_bytes(ct)?;
    let sk = Container::from_bytes(sk)?;
    let curve = CurveId::from_byte(ct.curve_byte()?)?;
    if sk.curve_byte()? != curve as u8 {
        return Err(AbeError::InvalidKey("key and ciphertext curves differ".to_string()));
    }
    check_key_family(&sk, ct.scheme())?;
    with_backend!(curve, B => match ct.scheme() {
        SchemeId::CpWaters | SchemeId::CpWatersCca => {
            let sk = cp_waters::sk_from_container::<B>(&sk)?;
            let ct = cp_waters::ct_from_container::<B>(&ct)?;
            Ok(arith::gt_to_bytes::<B>(&cp_waters::decap::<B>(&sk, &ct)?))
        }
        SchemeId::KpGpsw | SchemeId::KpGpswCca => {
            let sk = kp_gpsw::sk_from_container::<B>(&sk)?;
            let ct = kp_gpsw::ct_from_container::<B>(&ct)?;
            Ok(arith::gt_to_bytes::<B>(&kp_gpsw::decap::<B>(&sk, &ct)?))
        }
    })
}

/// A key minted by one scheme cannot open the other scheme's ciphertexts.
fn check_key_family(sk: &Container, ct_scheme: SchemeId) -> Result<(), AbeError> {
    let wanted = match ct_scheme {
        SchemeId::CpWaters | SchemeId::CpWatersCca => SchemeId::CpWaters,
        SchemeId::KpGpsw | SchemeId::KpGpswCca => SchemeId::KpGpsw,
    };
    if sk.scheme() != wanted {
        return Err(AbeError::InvalidKey("key scheme does not match ciphertext".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drbg::AesCtrDrbg;

    fn cp_cfg() -> AbeConfig {
        AbeConfig::default()
    }

    #[test]
    fn cp_end_to_end_over_the_byte_surface() {
        let cfg = cp_cfg();
        let mut rng = AesCtrDrbg::new(b"lib-e2e");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        let sk = keygen(
            &cfg,
            &mpk,
            &msk,
            &KeyRequest::Attributes(vec!["a".into(), "b".into()]),
            &mut rng,
        )
        .unwrap();
        let ct = encrypt(
            &cfg,
            &mpk,
            &EncryptTarget::Policy("((a and b) or c)".into()),
            b"hello",
            &mut rng,
        )
        .unwrap();
        assert_eq!(decrypt(&mpk, &sk, &ct).unwrap(), b"hello");
    }

    #[test]
    fn kp_end_to_end_over_the_byte_surface() {
        let mut cfg = cp_cfg();
        cfg.set("scheme", "KP_GPSW").unwrap();
        cfg.set("encoding", "standard").unwrap();
        let mut rng = AesCtrDrbg::new(b"lib-kp-e2e");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        let sk = keygen(
            &cfg,
            &mpk,
            &msk,
            &KeyRequest::Policy("(a and b)".into()),
            &mut rng,
        )
        .unwrap();
        let ct = encrypt(
            &cfg,
            &mpk,
            &EncryptTarget::Attributes(vec!["a".into(), "b".into()]),
            b"dual",
            &mut rng,
        )
        .unwrap();
        assert_eq!(decrypt(&mpk, &sk, &ct).unwrap(), b"dual");
    }

    #[test]
    fn policy_mismatch_surfaces_as_decryption_failed() {
        let cfg = cp_cfg();
        let mut rng = AesCtrDrbg::new(b"lib-mismatch");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        let sk = keygen(
            &cfg,
            &mpk,
            &msk,
            &KeyRequest::Attributes(vec!["role:guest".into()]),
            &mut rng,
        )
        .unwrap();
        let ct = encrypt(
            &cfg,
            &mpk,
            &EncryptTarget::Policy("(role:admin and dept:IT)".into()),
            b"secret",
            &mut rng,
        )
        .unwrap();
        assert!(matches!(decrypt(&mpk, &sk, &ct), Err(AbeError::DecryptionFailed)));
    }

    #[test]
    fn encap_is_deterministic_and_decap_recovers_it() {
        let cfg = AbeConfig { cca: false, ..AbeConfig::default() };
        let mut rng = AesCtrDrbg::new(b"lib-encap");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        let target = EncryptTarget::Policy("x".into());

        let (ct1, k1) = encap(&cfg, &mpk, &target, &mut AesCtrDrbg::new(&[0u8; 32])).unwrap();
        let (ct2, k2) = encap(&cfg, &mpk, &target, &mut AesCtrDrbg::new(&[0u8; 32])).unwrap();
        assert_eq!(ct1, ct2);
        assert_eq!(k1, k2);

        let sk = keygen(
            &cfg,
            &mpk,
            &msk,
            &KeyRequest::Attributes(vec!["x".into()]),
            &mut rng,
        )
        .unwrap();
        assert_eq!(decap(&sk, &ct1).unwrap(), k1);
    }

    #[test]
    fn cca_off_still_round_trips() {
        let cfg = AbeConfig { cca: false, ..AbeConfig::default() };
        let mut rng = AesCtrDrbg::new(b"lib-cpa");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        let sk = keygen(
            &cfg,
            &mpk,
            &msk,
            &KeyRequest::Attributes(vec!["x".into()]),
            &mut rng,
        )
        .unwrap();
        let ct = encrypt(&cfg, &mpk, &EncryptTarget::Policy("x".into()), b"cpa", &mut rng)
            .unwrap();
        assert_eq!(decrypt(&mpk, &sk, &ct).unwrap(), b"cpa");
    }

    #[test]
    fn mismatched_request_kinds_are_invalid_parameters() {
        let cfg = cp_cfg();
        let mut rng = AesCtrDrbg::new(b"lib-kinds");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        assert!(matches!(
            keygen(&cfg, &mpk, &msk, &KeyRequest::Policy("x".into()), &mut rng),
            Err(AbeError::InvalidParameter(_))
        ));
        assert!(matches!(
            encrypt(
                &cfg,
                &mpk,
                &EncryptTarget::Attributes(vec!["x".into()]),
                b"m",
                &mut rng
            ),
            Err(AbeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn cross_scheme_keys_are_invalid() {
        let mut rng = AesCtrDrbg::new(b"lib-cross");
        let cp = cp_cfg();
        let (cp_mpk, cp_msk) = setup(&cp, &mut rng).unwrap();
        let cp_sk = keygen(
            &cp,
            &cp_mpk,
            &cp_msk,
            &KeyRequest::Attributes(vec!["x".into()]),
            &mut rng,
        )
        .unwrap();

        let mut kp = cp_cfg();
        kp.set("scheme", "KP_GPSW").unwrap();
        let (kp_mpk, _) = setup(&kp, &mut rng).unwrap();
        let ct = encrypt(
            &kp,
            &kp_mpk,
            &EncryptTarget::Attributes(vec!["x".into()]),
            b"m",
            &mut rng,
        )
        .unwrap();
        assert!(matches!(
            decrypt(&kp_mpk, &cp_sk, &ct),
            Err(AbeError::InvalidKey(_))
        ));
    }

    #[test]
    fn config_options_are_the_enumerated_set() {
        let mut cfg = AbeConfig::default();
        cfg.set("curve", "BN254").unwrap();
        assert_eq!(cfg.curve, CurveId::Bn254);
        cfg.set("scheme", "KP_GPSW").unwrap();
        cfg.set("cca", "off").unwrap();
        assert!(!cfg.cca);
        cfg.set("encoding", "standard").unwrap();
        assert_eq!(cfg.encoding, Encoding::Standard);

        assert!(matches!(cfg.set("curve", "P-256"), Err(AbeError::UnknownCurve(_))));
        assert!(matches!(cfg.set("cca", "maybe"), Err(AbeError::InvalidParameter(_))));
        assert!(matches!(cfg.set("compression", "on"), Err(AbeError::InvalidParameter(_))));
    }

    #[test]
    fn duplicate_attributes_are_rejected_at_the_surface() {
        let cfg = cp_cfg();
        let mut rng = AesCtrDrbg::new(b"lib-dup");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        assert!(matches!(
            keygen(
                &cfg,
                &mpk,
                &msk,
                &KeyRequest::Attributes(vec!["a".into(), "a".into()]),
                &mut rng
            ),
            Err(AbeError::InvalidParameter(_))
        ));
    }

    #[cfg(feature = "bn254")]
    #[test]
    fn bn254_end_to_end() {
        let mut cfg = cp_cfg();
        cfg.set("curve", "BN254").unwrap();
        let mut rng = AesCtrDrbg::new(b"lib-bn254");
        let (mpk, msk) = setup(&cfg, &mut rng).unwrap();
        let sk = keygen(
            &cfg,
            &mpk,
            &msk,
            &KeyRequest::Attributes(vec!["a".into()]),
            &mut rng,
        )
        .unwrap();
        let ct = encrypt(&cfg, &mpk, &EncryptTarget::Policy("(a or b)".into()), b"bn", &mut rng)
            .unwrap();
        assert_eq!(decrypt(&mpk, &sk, &ct).unwrap(), b"bn");
    }
}
