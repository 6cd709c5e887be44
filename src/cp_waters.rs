//! Ciphertext-policy KEM (Waters construction)
//!
//! The ciphertext carries a monotone policy; a user key carries an attribute
//! set and decapsulates iff the set satisfies the policy.
//!
//! Shapes (Type-3 group, all pairings G1 × G2):
//!
//! - Setup: `α, a ← Zr`, `g ← G1`, `g2 ← G2`;
//!   `MPK = (g, g^a, g2, e(g, g2)^α)`, `MSK = (α, a)`.
//! - KeyGen(S): `t ← Zr`; `K = g2^{α + a·t}`, `L = g2^t`,
//!   `K_x = H(x)^t` for `x ∈ S`.
//! - Encap(A): `s ← Zr`; `Kgt = e(g, g2)^{α·s}`; LSSS shares `λᵢ` of `s`
//!   over `A`; per leaf `rᵢ ← Zr`, `Cᵢ = (g^a)^{λᵢ} · H(xᵢ)^{−rᵢ}`,
//!   `Dᵢ = g2^{rᵢ}`; `Cprime = g^s`.
//! - Decap: with reconstruction coefficients `ωᵢ`,
//!   `Kgt = e(Cprime, K) / Πᵢ (e(Cᵢ, L) · e(K_{xᵢ}, Dᵢ))^{ωᵢ}`.
//!
//! The RNG draw schedule of `encap` is fixed by the canonical tree order
//! (`s`, then the sharing polynomials, then one `rᵢ` per leaf), so an encap
//! against a reseeded DRBG replays bit-for-bit — the property the CCA
//! wrapper checks.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ark_ff::Zero;
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::arith::{
    gt_div, gt_pow, hash_attribute_to_g1, multi_pairing, pairing, rand_g1, rand_g2, rand_zr, Gt,
    Zr, G1, G2,
};
use crate::curves::CurveBackend;
use crate::lsss;
use crate::policy::{AttributeList, LeafId, Policy};
use crate::wire::{Container, Encoding, SchemeId, LABEL_ATTRS, LABEL_POLICY};
use crate::AbeError;

/// Master public key of the ciphertext-policy scheme.
#[derive(Debug, Clone)]
pub struct CpMasterPublicKey<B: CurveBackend> {
    pub g: G1<B>,
    pub g_a: G1<B>,
    pub g2: G2<B>,
    pub e_gg_alpha: Gt<B>,
}

/// Master secret key. Scalars are zeroed on drop.
#[derive(Debug)]
pub struct CpMasterSecretKey<B: CurveBackend> {
    alpha: Zr<B>,
    a: Zr<B>,
}

impl<B: CurveBackend> Drop for CpMasterSecretKey<B> {
    fn drop(&mut self) {
        self.alpha = Zr::<B>::zero();
        self.a = Zr::<B>::zero();
    }
}

/// User decryption key for an attribute set.
#[derive(Debug, Clone)]
pub struct CpUserKey<B: CurveBackend> {
    pub attrs: AttributeList,
    pub k: G2<B>,
    pub l: G2<B>,
    pub k_x: BTreeMap<String, G1<B>>,
}

/// KEM ciphertext: the policy plus its per-leaf components.
#[derive(Debug, Clone)]
pub struct CpCiphertext<B: CurveBackend> {
    pub policy: Policy,
    pub cprime: G1<B>,
    pub c: BTreeMap<LeafId, G1<B>>,
    pub d: BTreeMap<LeafId, G2<B>>,
}

/// Generate a master key pair.
pub fn setup<B: CurveBackend>(
    rng: &mut (impl RngCore + CryptoRng),
) -> (CpMasterPublicKey<B>, CpMasterSecretKey<B>) {
    let alpha = rand_zr::<B>(rng);
    let a = rand_zr::<B>(rng);
    let g = rand_g1::<B>(rng);
    let g2 = rand_g2::<B>(rng);
    let e_gg_alpha = gt_pow::<B>(pairing::<B>(g, g2), &alpha);
    debug!(curve = B::ID.name(), "cp-waters setup");
    (CpMasterPublicKey { g, g_a: g * a, g2, e_gg_alpha }, CpMasterSecretKey { alpha, a })
}

/// Issue a user key for `attrs`.
pub fn keygen<B: CurveBackend>(
    mpk: &CpMasterPublicKey<B>,
    msk: &CpMasterSecretKey<B>,
    attrs: &AttributeList,
    rng: &mut (impl RngCore + CryptoRng),
) -> CpUserKey<B> {
    let t = rand_zr::<B>(rng);
    let k = mpk.g2 * (msk.alpha + msk.a * t);
    let l = mpk.g2 * t;
    let mut k_x = BTreeMap::new();
    for x in attrs.iter() {
        k_x.insert(x.to_string(), hash_attribute_to_g1::<B>(x) * t);
    }
    debug!(attrs = attrs.len(), "cp-waters keygen");
    CpUserKey { attrs: attrs.clone(), k, l, k_x }
}

/// Encapsulate a session key under `policy`.
pub fn encap<B: CurveBackend>(
    mpk: &CpMasterPublicKey<B>,
    policy: &Policy,
    rng: &mut (impl RngCore + CryptoRng),
) -> (CpCiphertext<B>, Gt<B>) {
    let s = rand_zr::<B>(rng);
    let kgt = gt_pow::<B>(mpk.e_gg_alpha, &s);
    let shares = lsss::share::<B>(policy, &s, rng);
    let mut c = BTreeMap::new();
    let mut d = BTreeMap::new();
    for (id, attr) in policy.leaves() {
        let lambda = shares[&id];
        let r_i = rand_zr::<B>(rng);
        c.insert(id, mpk.g_a * lambda - hash_attribute_to_g1::<B>(&attr) * r_i);
        d.insert(id, mpk.g2 * r_i);
    }
    let cprime = mpk.g * s;
    debug!(policy = policy.canonical(), leaves = c.len(), "cp-waters encap");
    (CpCiphertext { policy: policy.clone(), cprime, c, d }, kgt)
}

/// Decapsulate; fails with [`AbeError::PolicyUnsatisfied`] when the key's
/// attributes do not satisfy the ciphertext policy.
pub fn decap<B: CurveBackend>(
    sk: &CpUserKey<B>,
    ct: &CpCiphertext<B>,
) -> Result<Gt<B>, AbeError> {
    let omega = lsss::coefficients::<B>(&ct.policy, &sk.attrs)?;
    let leaf_names: BTreeMap<LeafId, String> = ct.policy.leaves().into_iter().collect();
    let mut pairs = Vec::with_capacity(2 * omega.len());
    for (id, w) in &omega {
        let c_i = ct.c.get(id).ok_or(AbeError::DecryptionFailed)?;
        let d_i = ct.d.get(id).ok_or(AbeError::DecryptionFailed)?;
        let attr = leaf_names.get(id).ok_or(AbeError::DecryptionFailed)?;
        let k_x = sk.k_x.get(attr).ok_or(AbeError::PolicyUnsatisfied)?;
        pairs.push((*c_i * *w, sk.l));
        pairs.push((*k_x * *w, *d_i));
    }
    let aggregated = multi_pairing::<B>(&pairs);
    debug!(leaves = omega.len(), "cp-waters decap");
    Ok(gt_div::<B>(pairing::<B>(ct.cprime, sk.k), aggregated))
}

// ---------------------------------------------------------------------------
// Container codecs (§ wire format)
// ---------------------------------------------------------------------------

/// Label of the per-leaf G1 component.
fn c_label(id: LeafId) -> String {
    format!("C_{id}")
}

/// Label of the per-leaf G2 component.
fn d_label(id: LeafId) -> String {
    format!("D_{id}")
}

pub fn mpk_to_container<B: CurveBackend>(
    mpk: &CpMasterPublicKey<B>,
    enc: Encoding,
) -> Container {
    let mut c = Container::new(SchemeId::CpWaters);
    c.put_curve::<B>();
    c.put_g1::<B>("g", &mpk.g, enc);
    c.put_g1::<B>("gA", &mpk.g_a, enc);
    c.put_g2::<B>("g2", &mpk.g2, enc);
    c.put_gt::<B>("egg2alpha", &mpk.e_gg_alpha, enc);
    c
}

pub fn mpk_from_container<B: CurveBackend>(
    c: &Container,
) -> Result<CpMasterPublicKey<B>, AbeError> {
    check_curve::<B>(c)?;
    Ok(CpMasterPublicKey {
        g: c.get_g1::<B>("g")?,
        g_a: c.get_g1::<B>("gA")?,
        g2: c.get_g2::<B>("g2")?,
        e_gg_alpha: c.get_gt::<B>("egg2alpha")?,
    })
}

pub fn msk_to_container<B: CurveBackend>(msk: &CpMasterSecretKey<B>) -> Container {
    let mut c = Container::new(SchemeId::CpWaters);
    c.put_curve::<B>();
    c.put_zr::<B>("alpha", &msk.alpha);
    c.put_zr::<B>("a", &msk.a);
    c
}

pub fn msk_from_container<B: CurveBackend>(
    c: &Container,
) -> Result<CpMasterSecretKey<B>, AbeError> {
    check_curve::<B>(c)?;
    Ok(CpMasterSecretKey { alpha: c.get_zr::<B>("alpha")?, a: c.get_zr::<B>("a")? })
}

pub fn sk_to_container<B: CurveBackend>(sk: &CpUserKey<B>, enc: Encoding) -> Container {
    let mut c = Container::new(SchemeId::CpWaters);
    c.put_curve::<B>();
    c.put_g2::<B>("K", &sk.k, enc);
    c.put_g2::<B>("L", &sk.l, enc);
    for (x, k_x) in &sk.k_x {
        c.put_g1::<B>(&format!("K_{x}"), k_x, enc);
    }
    c.put_str(LABEL_ATTRS, &sk.attrs.joined());
    c
}

pub fn sk_from_container<B: CurveBackend>(c: &Container) -> Result<CpUserKey<B>, AbeError> {
    check_curve::<B>(c)?;
    let attrs = AttributeList::from_joined(c.get_str(LABEL_ATTRS)?)?;
    let mut k_x = BTreeMap::new();
    for x in attrs.iter() {
        k_x.insert(x.to_string(), c.get_g1::<B>(&format!("K_{x}"))?);
    }
    Ok(CpUserKey { attrs, k: c.get_g2::<B>("K")?, l: c.get_g2::<B>("L")?, k_x })
}

/// Serialize a KEM ciphertext. `scheme` distinguishes the bare KEM container
/// from the CCA-wrapped one (which adds `_ED` on top of these entries).
pub fn ct_to_container<B: CurveBackend>(
    ct: &CpCiphertext<B>,
    enc: Encoding,
    scheme: SchemeId,
) -> Container {
    let mut c = Container::new(scheme);
    c.put_curve::<B>();
    c.put_str(LABEL_POLICY, ct.policy.canonical());
    c.put_g1::<B>("Cprime", &ct.cprime, enc);
    for (id, e) in &ct.c {
        c.put_g1::<B>(&c_label(*id), e, enc);
    }
    for (id, e) in &ct.d {
        c.put_g2::<B>(&d_label(*id), e, enc);
    }
    c
}

pub fn ct_from_container<B: CurveBackend>(c: &Container) -> Result<CpCiphertext<B>, AbeError> {
    check_curve::<B>(c)?;
    let policy = Policy::parse(c.get_str(LABEL_POLICY)?)?;
    let mut comp_c = BTreeMap::new();
    let mut comp_d = BTreeMap::new();
    for (id, _) in policy.leaves() {
        comp_c.insert(id, c.get_g1::<B>(&c_label(id))?);
        comp_d.insert(id, c.get_g2::<B>(&d_label(id))?);
    }
    Ok(CpCiphertext { policy, cprime: c.get_g1::<B>("Cprime")?, c: comp_c, d: comp_d })
}

pub(crate) fn check_curve<B: CurveBackend>(c: &Container) -> Result<(), AbeError> {
    let got = c.curve_byte()?;
    if got != B::ID as u8 {
        return Err(AbeError::Serialization(crate::wire::WireError::CurveMismatch {
            expected: B::ID as u8,
            got,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::gt_to_bytes;
    use crate::curves::Bls12381;
    use crate::drbg::AesCtrDrbg;

    type B = Bls12381;

    fn smoke_keys(seed: &[u8]) -> (CpMasterPublicKey<B>, CpMasterSecretKey<B>) {
        setup::<B>(&mut AesCtrDrbg::new(seed))
    }

    #[test]
    fn satisfying_attributes_recover_the_session_key() {
        let mut rng = AesCtrDrbg::new(b"cp-smoke");
        let (mpk, msk) = setup::<B>(&mut rng);
        let policy = Policy::parse("((a and b) or c)").unwrap();
        let sk = keygen::<B>(&mpk, &msk, &AttributeList::new(["a", "b"]).unwrap(), &mut rng);
        let (ct, kgt) = encap::<B>(&mpk, &policy, &mut rng);
        let recovered = decap::<B>(&sk, &ct).unwrap();
        assert_eq!(gt_to_bytes::<B>(&recovered), gt_to_bytes::<B>(&kgt));

        // the single-leaf branch works too
        let sk_c = keygen::<B>(&mpk, &msk, &AttributeList::new(["c"]).unwrap(), &mut rng);
        let recovered = decap::<B>(&sk_c, &ct).unwrap();
        assert_eq!(gt_to_bytes::<B>(&recovered), gt_to_bytes::<B>(&kgt));
    }

    #[test]
    fn unsatisfying_attributes_are_rejected() {
        let mut rng = AesCtrDrbg::new(b"cp-unsat");
        let (mpk, msk) = setup::<B>(&mut rng);
        let policy = Policy::parse("(role:admin and dept:IT)").unwrap();
        let sk = keygen::<B>(&mpk, &msk, &AttributeList::new(["role:guest"]).unwrap(), &mut rng);
        let (ct, _) = encap::<B>(&mpk, &policy, &mut rng);
        assert!(matches!(decap::<B>(&sk, &ct), Err(AbeError::PolicyUnsatisfied)));
    }

    #[test]
    fn general_threshold_policies_decapsulate() {
        let mut rng = AesCtrDrbg::new(b"cp-threshold");
        let (mpk, msk) = setup::<B>(&mut rng);
        let policy = Policy::parse("(2 of {a, b, c})").unwrap();
        let (ct, kgt) = encap::<B>(&mpk, &policy, &mut rng);
        for held in [["a", "b"], ["a", "c"], ["b", "c"]] {
            let sk = keygen::<B>(&mpk, &msk, &AttributeList::new(held).unwrap(), &mut rng);
            let got = decap::<B>(&sk, &ct).unwrap();
            assert_eq!(gt_to_bytes::<B>(&got), gt_to_bytes::<B>(&kgt));
        }
    }

    #[test]
    fn encap_is_deterministic_under_a_fixed_seed() {
        let mut setup_rng = AesCtrDrbg::new(b"cp-det-setup");
        let (mpk, _msk) = setup::<B>(&mut setup_rng);
        let policy = Policy::parse("x").unwrap();

        let (ct1, k1) = encap::<B>(&mpk, &policy, &mut AesCtrDrbg::new(&[0u8; 32]));
        let (ct2, k2) = encap::<B>(&mpk, &policy, &mut AesCtrDrbg::new(&[0u8; 32]));
        let b1 = ct_to_container::<B>(&ct1, Encoding::Legacy, SchemeId::CpWaters)
            .to_bytes()
            .unwrap();
        let b2 = ct_to_container::<B>(&ct2, Encoding::Legacy, SchemeId::CpWaters)
            .to_bytes()
            .unwrap();
        assert_eq!(b1.len(), b2.len());
        assert_eq!(b1, b2);
        assert_eq!(gt_to_bytes::<B>(&k1), gt_to_bytes::<B>(&k2));
    }

    #[test]
    fn containers_round_trip_every_object() {
        let mut rng = AesCtrDrbg::new(b"cp-wire");
        let (mpk, msk) = setup::<B>(&mut rng);
        let attrs = AttributeList::new(["a", "b"]).unwrap();
        let sk = keygen::<B>(&mpk, &msk, &attrs, &mut rng);
        let policy = Policy::parse("(a and b)").unwrap();
        let (ct, kgt) = encap::<B>(&mpk, &policy, &mut rng);

        for enc in [Encoding::Legacy, Encoding::Standard] {
            let c = mpk_to_container::<B>(&mpk, enc);
            let bytes = c.to_bytes().unwrap();
            let back = mpk_from_container::<B>(&Container::from_bytes(&bytes).unwrap()).unwrap();
            assert_eq!(back.g, mpk.g);
            assert_eq!(back.g_a, mpk.g_a);
            assert_eq!(back.g2, mpk.g2);
            assert_eq!(gt_to_bytes::<B>(&back.e_gg_alpha), gt_to_bytes::<B>(&mpk.e_gg_alpha));

            let c = sk_to_container::<B>(&sk, enc);
            let back = sk_from_container::<B>(&Container::from_bytes(&c.to_bytes().unwrap()).unwrap())
                .unwrap();
            assert_eq!(back.attrs, sk.attrs);
            assert_eq!(back.k, sk.k);
            assert_eq!(back.l, sk.l);
            assert_eq!(back.k_x, sk.k_x);

            let c = ct_to_container::<B>(&ct, enc, SchemeId::CpWaters);
            let back = ct_from_container::<B>(&Container::from_bytes(&c.to_bytes().unwrap()).unwrap())
                .unwrap();
            assert_eq!(back.policy, ct.policy);
            assert_eq!(back.cprime, ct.cprime);
            assert_eq!(back.c, ct.c);
            assert_eq!(back.d, ct.d);
            // the round-tripped ciphertext still decapsulates
            let got = decap::<B>(&sk, &back).unwrap();
            assert_eq!(gt_to_bytes::<B>(&got), gt_to_bytes::<B>(&kgt));
        }

        let c = msk_to_container::<B>(&msk);
        let back = msk_from_container::<B>(&Container::from_bytes(&c.to_bytes().unwrap()).unwrap())
            .unwrap();
        assert_eq!(back.alpha, msk.alpha);
        assert_eq!(back.a, msk.a);
    }

    #[test]
    fn key_from_a_different_master_pair_fails_soundly() {
        let (mpk1, _msk1) = smoke_keys(b"master-one");
        let (_mpk2, msk2) = smoke_keys(b"master-two");
        let mut rng = AesCtrDrbg::new(b"cp-cross");
        let attrs = AttributeList::new(["a"]).unwrap();
        // key minted under the wrong master secret
        let sk = keygen::<B>(&mpk1, &msk2, &attrs, &mut rng);
        let policy = Policy::parse("a").unwrap();
        let (ct, kgt) = encap::<B>(&mpk1, &policy, &mut rng);
        let got = decap::<B>(&sk, &ct).unwrap();
        assert_ne!(gt_to_bytes::<B>(&got), gt_to_bytes::<B>(&kgt));
    }

    #[test]
    fn curve_mismatch_is_detected_on_parse() {
        #[cfg(feature = "bn254")]
        {
            let mut rng = AesCtrDrbg::new(b"cp-cross-curve");
            let (mpk, _) = setup::<crate::curves::Bn254>(&mut rng);
            let c = mpk_to_container::<crate::curves::Bn254>(&mpk, Encoding::Legacy);
            let bytes = c.to_bytes().unwrap();
            let parsed = Container::from_bytes(&bytes).unwrap();
            assert!(mpk_from_container::<B>(&parsed).is_err());
        }
    }
}
