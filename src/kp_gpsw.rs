//! Key-policy KEM (Goyal–Pandey–Sahai–Waters construction)
//!
//! Dual of the ciphertext-policy scheme: the **key** carries the monotone
//! policy and the **ciphertext** carries an attribute set. The same LSSS
//! engine shares the master secret `α` across the policy tree at key
//! generation time.
//!
//! Shapes (small-universe construction with hashed attributes):
//!
//! - Setup: `α ← Zr`, `g ← G1`, `g2 ← G2`;
//!   `MPK = (g, g2, e(g, g2)^α)`, `MSK = α`.
//! - KeyGen(A): LSSS shares `λᵢ` of `α` over `A`; per leaf `rᵢ ← Zr`,
//!   `Dᵢ = g^{λᵢ} · H(xᵢ)^{rᵢ}` and `Rᵢ = g2^{rᵢ}`.
//! - Encap(S): `s ← Zr`; `Kgt = e(g, g2)^{α·s}`; `Eprime = g2^s`;
//!   `E_x = H(x)^s` for `x ∈ S`.
//! - Decap: with reconstruction coefficients `ωᵢ`,
//!   `Kgt = Πᵢ (e(Dᵢ, Eprime) / e(E_{xᵢ}, Rᵢ))^{ωᵢ}`.
//!
//! Encap draws `s` and nothing else, with ciphertext components enumerated
//! in canonical attribute order; the draw schedule is again a pure function
//! of the inputs.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ark_ff::Zero;
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::arith::{
    gt_pow, hash_attribute_to_g1, multi_pairing, pairing, rand_g1, rand_g2, rand_zr, Gt, Zr, G1,
    G2,
};
use crate::cp_waters::check_curve;
use crate::curves::CurveBackend;
use crate::lsss;
use crate::policy::{AttributeList, LeafId, Policy};
use crate::wire::{Container, Encoding, SchemeId, LABEL_ATTRS, LABEL_POLICY};
use crate::AbeError;

/// Master public key of the key-policy scheme.
#[derive(Debug, Clone)]
pub struct KpMasterPublicKey<B: CurveBackend> {
    pub g: G1<B>,
    pub g2: G2<B>,
    pub e_gg_alpha: Gt<B>,
}

/// Master secret key. The scalar is zeroed on drop.
#[derive(Debug)]
pub struct KpMasterSecretKey<B: CurveBackend> {
    alpha: Zr<B>,
}

impl<B: CurveBackend> Drop for KpMasterSecretKey<B> {
    fn drop(&mut self) {
        self.alpha = Zr::<B>::zero();
    }
}

/// User decryption key: shares of `α` spread over the policy leaves.
#[derive(Debug, Clone)]
pub struct KpUserKey<B: CurveBackend> {
    pub policy: Policy,
    pub d: BTreeMap<LeafId, G1<B>>,
    pub r: BTreeMap<LeafId, G2<B>>,
}

/// KEM ciphertext: the attribute set and its components.
#[derive(Debug, Clone)]
pub struct KpCiphertext<B: CurveBackend> {
    pub attrs: AttributeList,
    pub eprime: G2<B>,
    pub e_x: BTreeMap<String, G1<B>>,
}

/// Generate a master key pair.
pub fn setup<B: CurveBackend>(
    rng: &mut (impl RngCore + CryptoRng),
) -> (KpMasterPublicKey<B>, KpMasterSecretKey<B>) {
    let alpha = rand_zr::<B>(rng);
    let g = rand_g1::<B>(rng);
    let g2 = rand_g2::<B>(rng);
    let e_gg_alpha = gt_pow::<B>(pairing::<B>(g, g2), &alpha);
    debug!(curve = B::ID.name(), "kp-gpsw setup");
    (KpMasterPublicKey { g, g2, e_gg_alpha }, KpMasterSecretKey { alpha })
}

/// Issue a user key whose decryption capability is `policy`.
pub fn keygen<B: CurveBackend>(
    mpk: &KpMasterPublicKey<B>,
    msk: &KpMasterSecretKey<B>,
    policy: &Policy,
    rng: &mut (impl RngCore + CryptoRng),
) -> KpUserKey<B> {
    let shares = lsss::share::<B>(policy, &msk.alpha, rng);
    let mut d = BTreeMap::new();
    let mut r = BTreeMap::new();
    for (id, attr) in policy.leaves() {
        let lambda = shares[&id];
        let r_i = rand_zr::<B>(rng);
        d.insert(id, mpk.g * lambda + hash_attribute_to_g1::<B>(&attr) * r_i);
        r.insert(id, mpk.g2 * r_i);
    }
    debug!(policy = policy.canonical(), leaves = d.len(), "kp-gpsw keygen");
    KpUserKey { policy: policy.clone(), d, r }
}

/// Encapsulate a session key under the attribute set `attrs`.
pub fn encap<B: CurveBackend>(
    mpk: &KpMasterPublicKey<B>,
    attrs: &AttributeList,
    rng: &mut (impl RngCore + CryptoRng),
) -> (KpCiphertext<B>, Gt<B>) {
    let s = rand_zr::<B>(rng);
    let kgt = gt_pow::<B>(mpk.e_gg_alpha, &s);
    let eprime = mpk.g2 * s;
    let mut e_x = BTreeMap::new();
    for x in attrs.iter() {
        e_x.insert(x.to_string(), hash_attribute_to_g1::<B>(x) * s);
    }
    debug!(attrs = attrs.len(), "kp-gpsw encap");
    (KpCiphertext { attrs: attrs.clone(), eprime, e_x }, kgt)
}

/// Decapsulate; fails with [`AbeError::PolicyUnsatisfied`] when the
/// ciphertext attributes do not satisfy the key policy.
pub fn decap<B: CurveBackend>(
    sk: &KpUserKey<B>,
    ct: &KpCiphertext<B>,
) -> Result<Gt<B>, AbeError> {
    let omega = lsss::coefficients::<B>(&sk.policy, &ct.attrs)?;
    let leaf_names: BTreeMap<LeafId, String> = sk.policy.leaves().into_iter().collect();
    let mut pairs = Vec::with_capacity(2 * omega.len());
    for (id, w) in &omega {
        let d_i = sk.d.get(id).ok_or(AbeError::DecryptionFailed)?;
        let r_i = sk.r.get(id).ok_or(AbeError::DecryptionFailed)?;
        let attr = leaf_names.get(id).ok_or(AbeError::DecryptionFailed)?;
        let e_i = ct.e_x.get(attr).ok_or(AbeError::PolicyUnsatisfied)?;
        pairs.push((*d_i * *w, ct.eprime));
        pairs.push((*e_i * -*w, *r_i));
    }
    debug!(leaves = omega.len(), "kp-gpsw decap");
    Ok(multi_pairing::<B>(&pairs))
}

// ---------------------------------------------------------------------------
// Container codecs (§ wire format)
// ---------------------------------------------------------------------------

fn d_label(id: LeafId) -> String {
    format!("D_{id}")
}

fn r_label(id: LeafId) -> String {
    format!("R_{id}")
}

fn e_label(attr: &str) -> String {
    format!("E_{attr}")
}

pub fn mpk_to_container<B: CurveBackend>(
    mpk: &KpMasterPublicKey<B>,
    enc: Encoding,
) -> Container {
    let mut c = Container::new(SchemeId::KpGpsw);
    c.put_curve::<B>();
    c.put_g1::<B>("g", &mpk.g, enc);
    c.put_g2::<B>("g2", &mpk.g2, enc);
    c.put_gt::<B>("egg2alpha", &mpk.e_gg_alpha, enc);
    c
}

pub fn mpk_from_container<B: CurveBackend>(
    c: &Container,
) -> Result<KpMasterPublicKey<B>, AbeError> {
    check_curve::<B>(c)?;
    Ok(KpMasterPublicKey {
        g: c.get_g1::<B>("g")?,
        g2: c.get_g2::<B>("g2")?,
        e_gg_alpha: c.get_gt::<B>("egg2alpha")?,
    })
}

pub fn msk_to_container<B: CurveBackend>(msk: &KpMasterSecretKey<B>) -> Container {
    let mut c = Container::new(SchemeId::KpGpsw);
    c.put_curve::<B>();
    c.put_zr::<B>("alpha", &msk.alpha);
    c
}

pub fn msk_from_container<B: CurveBackend>(
    c: &Container,
) -> Result<KpMasterSecretKey<B>, AbeError> {
    check_curve::<B>(c)?;
    Ok(KpMasterSecretKey { alpha: c.get_zr::<B>("alpha")? })
}

pub fn sk_to_container<B: CurveBackend>(sk: &KpUserKey<B>, enc: Encoding) -> Container {
    let mut c = Container::new(SchemeId::KpGpsw);
    c.put_curve::<B>();
    c.put_str(LABEL_POLICY, sk.policy.canonical());
    for (id, e) in &sk.d {
        c.put_g1::<B>(&d_label(*id), e, enc);
    }
    for (id, e) in &sk.r {
        c.put_g2::<B>(&r_label(*id), e, enc);
    }
    c
}

pub fn sk_from_container<B: CurveBackend>(c: &Container) -> Result<KpUserKey<B>, AbeError> {
    check_curve::<B>(c)?;
    let policy = Policy::parse(c.get_str(LABEL_POLICY)?)?;
    let mut d = BTreeMap::new();
    let mut r = BTreeMap::new();
    for (id, _) in policy.leaves() {
        d.insert(id, c.get_g1::<B>(&d_label(id))?);
        r.insert(id, c.get_g2::<B>(&r_label(id))?);
    }
    Ok(KpUserKey { policy, d, r })
}

/// Serialize a KEM ciphertext. `scheme` distinguishes the bare KEM container
/// from the CCA-wrapped one.
pub fn ct_to_container<B: CurveBackend>(
    ct: &KpCiphertext<B>,
    enc: Encoding,
    scheme: SchemeId,
) -> Container {
    let mut c = Container::new(scheme);
    c.put_curve::<B>();
    c.put_str(LABEL_ATTRS, &ct.attrs.joined());
    c.put_g2::<B>("Eprime", &ct.eprime, enc);
    for (x, e) in &ct.e_x {
        c.put_g1::<B>(&e_label(x), e, enc);
    }
    c
}

pub fn ct_from_container<B: CurveBackend>(c: &Container) -> Result<KpCiphertext<B>, AbeError> {
    check_curve::<B>(c)?;
    let attrs = AttributeList::from_joined(c.get_str(LABEL_ATTRS)?)?;
    let mut e_x = BTreeMap::new();
    for x in attrs.iter() {
        e_x.insert(x.to_string(), c.get_g1::<B>(&e_label(x))?);
    }
    Ok(KpCiphertext { attrs, eprime: c.get_g2::<B>("Eprime")?, e_x })
}
