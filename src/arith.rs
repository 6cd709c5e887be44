//! Group arithmetic helpers and the determinism contract
//!
//! Thin, explicit helpers over the backend's pairing engine. Everything that
//! consumes randomness in this crate funnels through the two rules below;
//! they are what makes the CCA re-encryption check possible at all.
//!
//! ## Determinism contract
//!
//! - **Scalars.** `rand_zr` draws exactly `ceil(log2 r / 8)` bytes from the
//!   caller's RNG and reduces them little-endian mod `r`. No rejection
//!   sampling, no extra draws, no hidden entropy.
//! - **Group elements.** `rand_g1`/`rand_g2` compute `base^s` where `s` is a
//!   `rand_zr` scalar and `base` is a fixed point derived by hashing a
//!   domain-separated tag into the group. Sampling therefore never depends
//!   on a canonical generator, whose choice is not portable across backends.
//!
//! Two invocations against RNGs in the same state produce byte-identical
//! elements; the test module pins this.
//!
//! ## Notation
//!
//! arkworks writes all groups additively; the schemes in this crate are
//! usually written multiplicatively on paper. The GT helpers
//! (`gt_mul`/`gt_div`/`gt_pow`/`gt_inv`/`gt_identity`) bridge the two so the
//! scheme modules read like the constructions they implement. The GT
//! identity is always produced explicitly; an all-zero GT buffer is not a
//! valid element.

#![forbid(unsafe_code)]

use ark_ec::pairing::{Pairing, PairingOutput};
use ark_ff::{BigInteger, PrimeField, Zero};
use ark_serialize::CanonicalSerialize;
use rand::{CryptoRng, RngCore};

use crate::curves::CurveBackend;

/// Scalar field of the backend's pairing engine (`Zr` in the schemes).
pub type Zr<B> = <<B as CurveBackend>::E as Pairing>::ScalarField;
/// First source group, projective form.
pub type G1<B> = <<B as CurveBackend>::E as Pairing>::G1;
/// Second source group, projective form.
pub type G2<B> = <<B as CurveBackend>::E as Pairing>::G2;
/// First source group, affine form (serialization boundary).
pub type G1Aff<B> = <<B as CurveBackend>::E as Pairing>::G1Affine;
/// Second source group, affine form (serialization boundary).
pub type G2Aff<B> = <<B as CurveBackend>::E as Pairing>::G2Affine;
/// Target group of the pairing.
pub type Gt<B> = PairingOutput<<B as CurveBackend>::E>;

/// Domain tag for hashing attribute strings into G1.
pub const ATTRIBUTE_DOMAIN: &[u8] = b"attribute";
/// Domain tag for the fixed G1 sampling base.
const G1_BASE_DOMAIN: &[u8] = b"sampling-base-g1";
/// Domain tag for the fixed G2 sampling base.
const G2_BASE_DOMAIN: &[u8] = b"sampling-base-g2";

/// `ceil(log2 r / 8)`: the number of RNG bytes one scalar draw consumes.
pub fn scalar_byte_len<B: CurveBackend>() -> usize {
    ((Zr::<B>::MODULUS_BIT_SIZE as usize) + 7) / 8
}

/// Draw a scalar from the RNG per the determinism contract.
pub fn rand_zr<B: CurveBackend>(rng: &mut (impl RngCore + CryptoRng)) -> Zr<B> {
    let mut buf = vec![0u8; scalar_byte_len::<B>()];
    rng.fill_bytes(&mut buf);
    Zr::<B>::from_le_bytes_mod_order(&buf)
}

/// Construct a scalar from a little-endian byte buffer, reduced mod `r`.
pub fn zr_from_le_bytes<B: CurveBackend>(bytes: &[u8]) -> Zr<B> {
    Zr::<B>::from_le_bytes_mod_order(bytes)
}

/// Minimal big-endian encoding of a scalar: leading zero bytes stripped.
///
/// The zero scalar encodes as the empty string. This is the wire form; the
/// checked inverse lives in [`crate::wire`].
pub fn zr_to_minimal_be<B: CurveBackend>(x: &Zr<B>) -> Vec<u8> {
    let bytes = x.into_bigint().to_bytes_be();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Fixed G1 point under which `rand_g1` exponentiates.
pub fn sampling_base_g1<B: CurveBackend>() -> G1<B> {
    B::hash_to_g1(G1_BASE_DOMAIN, b"base")
}

/// Fixed G2 point under which `rand_g2` exponentiates.
pub fn sampling_base_g2<B: CurveBackend>() -> G2<B> {
    B::hash_to_g2(G2_BASE_DOMAIN, b"base")
}

/// Sample a G1 element as `base^s` with `s` drawn via `rand_zr`.
pub fn rand_g1<B: CurveBackend>(rng: &mut (impl RngCore + CryptoRng)) -> G1<B> {
    sampling_base_g1::<B>() * rand_zr::<B>(rng)
}

/// Sample a G2 element as `base^s` with `s` drawn via `rand_zr`.
pub fn rand_g2<B: CurveBackend>(rng: &mut (impl RngCore + CryptoRng)) -> G2<B> {
    sampling_base_g2::<B>() * rand_zr::<B>(rng)
}

/// Hash an attribute string into G1 (`H1` in the schemes).
pub fn hash_attribute_to_g1<B: CurveBackend>(attr: &str) -> G1<B> {
    B::hash_to_g1(ATTRIBUTE_DOMAIN, attr.as_bytes())
}

/// The bilinear map `e: G1 × G2 → GT`.
pub fn pairing<B: CurveBackend>(g: G1<B>, h: G2<B>) -> Gt<B> {
    <B::E as Pairing>::pairing(g, h)
}

/// Product of pairings `Π e(gᵢ, hᵢ)`.
///
/// Functionally equivalent to folding [`pairing`] over the pairs; the
/// backend may share the final exponentiation. The equivalence is
/// byte-exact and pinned by a test.
pub fn multi_pairing<B: CurveBackend>(pairs: &[(G1<B>, G2<B>)]) -> Gt<B> {
    <B::E as Pairing>::multi_pairing(
        pairs.iter().map(|(g, _)| *g),
        pairs.iter().map(|(_, h)| *h),
    )
}

// ---------------------------------------------------------------------------
// GT, multiplicatively
// ---------------------------------------------------------------------------

/// The multiplicative identity of GT, produced explicitly.
pub fn gt_identity<B: CurveBackend>() -> Gt<B> {
    Gt::<B>::zero()
}

/// Whether `x` is the multiplicative identity.
pub fn gt_is_identity<B: CurveBackend>(x: &Gt<B>) -> bool {
    x.is_zero()
}

/// `a · b` in GT.
pub fn gt_mul<B: CurveBackend>(a: Gt<B>, b: Gt<B>) -> Gt<B> {
    a + b
}

/// `a / b` in GT.
pub fn gt_div<B: CurveBackend>(a: Gt<B>, b: Gt<B>) -> Gt<B> {
    a - b
}

/// `x⁻¹` in GT.
pub fn gt_inv<B: CurveBackend>(x: Gt<B>) -> Gt<B> {
    -x
}

/// `x^e` in GT.
pub fn gt_pow<B: CurveBackend>(x: Gt<B>, e: &Zr<B>) -> Gt<B> {
    x * *e
}

/// Canonical full (12·field) serialization of a GT element.
///
/// This is the byte string fed to the KDF when deriving AEAD keys, so it
/// must be stable across backends and releases.
pub fn gt_to_bytes<B: CurveBackend>(x: &Gt<B>) -> Vec<u8> {
    let mut out = Vec::new();
    x.serialize_uncompressed(&mut out)
        .expect("GT serialization into a Vec cannot fail");
    out
}
