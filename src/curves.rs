//! Curve catalog and pairing backends
//!
//! This module is the **single switch point** for the bilinear-group
//! arithmetic the rest of the crate programs against. A backend is a
//! zero-sized type implementing [`CurveBackend`]; every scheme routine is
//! generic over one and receives no other source of curve state. There are
//! no process-wide singletons and no hidden generators: what a backend
//! contributes beyond the arkworks `Pairing` engine is its catalog identity,
//! its deterministic hash-to-curve maps, and its family wire encoding for
//! the standard framing.
//!
//! ## Catalog
//!
//! | id | name | field bytes | standard encoding | status |
//! |----|------|-------------|-------------------|--------|
//! | `0x01` | `BLS12_381` | 48 | ZCash compressed points | preferred (128-bit) |
//! | `0x02` | `BN254` | 32 | Ethereum uncompressed pairs | legacy (100-bit) |
//!
//! Lookup failures surface as [`AbeError::UnknownCurve`](crate::AbeError).
//!
//! ## Hash-to-curve
//!
//! The map is SHA-256 try-and-increment: digest the domain tag, the message
//! and a counter; interpret the digest as a base-field element; lift to the
//! curve choosing the `y` root by a digest bit; clear the cofactor. The map
//! is deterministic, depends only on its inputs, and lands in the
//! prime-order subgroup. Both source groups get one (G2 is needed to derive
//! the fixed sampling bases used by group randomization).

#![forbid(unsafe_code)]

use ark_ec::pairing::Pairing;
use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, Fp2, Fp2Config, PrimeField, Zero};
use sha2::{Digest, Sha256};

use crate::wire::{format, WireError};
use crate::AbeError;

/// Catalog identifier for a supported pairing curve.
///
/// The discriminant is the 1-byte curve id carried in wire headers and
/// container `curve` entries; reordering or renumbering variants breaks the
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CurveId {
    /// BLS12-381, the preferred curve (ZCash family encodings).
    Bls12_381 = 0x01,
    /// BN254, kept for legacy ciphertexts (Ethereum family encodings).
    Bn254 = 0x02,
}

impl CurveId {
    /// Resolve a short textual curve identifier (`"BLS12_381"`, `"BN254"`).
    pub fn from_name(name: &str) -> Result<Self, AbeError> {
        match name {
            "BLS12_381" => Ok(CurveId::Bls12_381),
            "BN254" => Ok(CurveId::Bn254),
            other => Err(AbeError::UnknownCurve(other.to_string())),
        }
    }

    /// Resolve the wire-format curve id byte.
    pub fn from_byte(b: u8) -> Result<Self, AbeError> {
        match b {
            0x01 => Ok(CurveId::Bls12_381),
            0x02 => Ok(CurveId::Bn254),
            other => Err(AbeError::UnknownCurve(format!("0x{:02x}", other))),
        }
    }

    /// Canonical catalog name.
    pub fn name(self) -> &'static str {
        match self {
            CurveId::Bls12_381 => "BLS12_381",
            CurveId::Bn254 => "BN254",
        }
    }

    /// Catalog record with the serialization widths for this curve.
    pub fn params(self) -> &'static CurveParams {
        match self {
            CurveId::Bls12_381 => &BLS12_381_PARAMS,
            CurveId::Bn254 => &BN254_PARAMS,
        }
    }
}

/// Serialization geometry of one catalog curve.
///
/// All widths are in bytes and derive from the base-field width: G1
/// uncompressed is `2·field`, G2 uncompressed `4·field`, GT full `12·field`
/// and GT cyclotomic-compressed `8·field` (8 of the 12 Fp coordinates).
#[derive(Debug, Clone, Copy)]
pub struct CurveParams {
    pub id: CurveId,
    pub field_bytes: usize,
    pub scalar_bytes: usize,
    pub g1_compressed: usize,
    pub g1_uncompressed: usize,
    pub g2_compressed: usize,
    pub g2_uncompressed: usize,
    pub gt_full: usize,
    pub gt_cyclotomic: usize,
}

const fn params_for(id: CurveId, field_bytes: usize, scalar_bytes: usize) -> CurveParams {
    CurveParams {
        id,
        field_bytes,
        scalar_bytes,
        g1_compressed: field_bytes,
        g1_uncompressed: 2 * field_bytes,
        g2_compressed: 2 * field_bytes,
        g2_uncompressed: 4 * field_bytes,
        gt_full: 12 * field_bytes,
        gt_cyclotomic: 8 * field_bytes,
    }
}

static BLS12_381_PARAMS: CurveParams = params_for(CurveId::Bls12_381, 48, 32);
static BN254_PARAMS: CurveParams = params_for(CurveId::Bn254, 32, 32);

/// A concrete pairing backend.
///
/// One zero-sized implementation exists per catalog curve. Divergent shapes
/// (base-field towers, cofactors, encodings) stay inside the implementation;
/// callers only see the arkworks `Pairing` engine plus the hash maps and the
/// family wire codec.
///
/// Backends carry **no state**. Every routine that needs randomness takes an
/// explicit `RngCore + CryptoRng`; nothing here may consult a system CSPRNG.
pub trait CurveBackend: 'static + Sized {
    /// The arkworks pairing engine.
    type E: Pairing;

    /// Catalog identity of this backend.
    const ID: CurveId;

    /// Wire `format` byte used by this curve's standard framing.
    const STANDARD_FORMAT: u8;

    /// Hash a domain-separated message into the prime-order subgroup of G1.
    fn hash_to_g1(domain: &[u8], msg: &[u8]) -> <Self::E as Pairing>::G1;

    /// Hash a domain-separated message into the prime-order subgroup of G2.
    fn hash_to_g2(domain: &[u8], msg: &[u8]) -> <Self::E as Pairing>::G2;

    /// Family encoding of a G1 point for the standard framing.
    /// Returns `(flags, payload)`; the caller writes the 9-byte header.
    fn g1_standard_payload(p: &<Self::E as Pairing>::G1Affine) -> (u8, Vec<u8>);

    /// Inverse of [`Self::g1_standard_payload`], with curve and subgroup
    /// validation.
    fn g1_from_standard_payload(
        flags: u8,
        payload: &[u8],
    ) -> Result<<Self::E as Pairing>::G1Affine, WireError>;

    /// Family encoding of a G2 point for the standard framing.
    fn g2_standard_payload(p: &<Self::E as Pairing>::G2Affine) -> (u8, Vec<u8>);

    /// Inverse of [`Self::g2_standard_payload`], with curve and subgroup
    /// validation.
    fn g2_from_standard_payload(
        flags: u8,
        payload: &[u8],
    ) -> Result<<Self::E as Pairing>::G2Affine, WireError>;
}

// ---------------------------------------------------------------------------
// SHA-256 try-and-increment over short-Weierstrass curves
// ---------------------------------------------------------------------------

fn h2c_digest(domain: &[u8], msg: &[u8], ctr: u32, limb: u8) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(b"myabe-h2c:");
    h.update((domain.len() as u64).to_be_bytes());
    h.update(domain);
    h.update((msg.len() as u64).to_be_bytes());
    h.update(msg);
    h.update(ctr.to_be_bytes());
    h.update([limb]);
    h.finalize().into()
}

/// Try-and-increment for curves whose base field is a prime field (G1).
fn hash_to_sw_curve<P>(domain: &[u8], msg: &[u8]) -> Projective<P>
where
    P: SWCurveConfig,
    P::BaseField: PrimeField,
{
    for ctr in 0u32..=u32::MAX {
        let d = h2c_digest(domain, msg, ctr, 0);
        let x = P::BaseField::from_be_bytes_mod_order(&d);
        let greatest = d[31] & 1 == 1;
        if let Some(p) = Affine::<P>::get_point_from_x_unchecked(x, greatest) {
            let q = p.mul_by_cofactor_to_group();
            if !q.is_zero() {
                return q;
            }
        }
    }
    unreachable!("try-and-increment exhausted the counter space")
}

/// Try-and-increment for curves over a quadratic extension field (G2).
fn hash_to_sw_curve_ext2<P, C>(domain: &[u8], msg: &[u8]) -> Projective<P>
where
    C: Fp2Config,
    P: SWCurveConfig<BaseField = Fp2<C>>,
{
    for ctr in 0u32..=u32::MAX {
        let d0 = h2c_digest(domain, msg, ctr, 0);
        let d1 = h2c_digest(domain, msg, ctr, 1);
        let c0 = C::Fp::from_be_bytes_mod_order(&d0);
        let c1 = C::Fp::from_be_bytes_mod_order(&d1);
        let x = Fp2::<C>::new(c0, c1);
        let greatest = d0[31] & 1 == 1;
        if let Some(p) = Affine::<P>::get_point_from_x_unchecked(x, greatest) {
            let q = p.mul_by_cofactor_to_group();
            if !q.is_zero() {
                return q;
            }
        }
    }
    unreachable!("try-and-increment exhausted the counter space")
}

// ---------------------------------------------------------------------------
// Big-endian field codecs shared by the family encodings
// ---------------------------------------------------------------------------

/// Fixed-width big-endian bytes of a prime-field element.
fn fe_to_be<F: PrimeField>(x: &F, width: usize) -> Vec<u8> {
    let raw = x.into_bigint().to_bytes_be();
    let first = raw.iter().position(|&b| b != 0).unwrap_or(raw.len());
    let trimmed = &raw[first..];
    let mut out = vec![0u8; width];
    out[width - trimmed.len()..].copy_from_slice(trimmed);
    out
}

/// Parse a fixed-width big-endian prime-field element, rejecting
/// non-canonical (`>= p`) values.
fn fe_from_be<F: PrimeField>(bytes: &[u8]) -> Result<F, WireError> {
    let x = F::from_be_bytes_mod_order(bytes);
    if fe_to_be(&x, bytes.len()) != bytes {
        return Err(WireError::InvalidPoint);
    }
    Ok(x)
}

/// Pick the SW curve point with the given x whose `y` has the given
/// "lexicographically largest" bit, per the big-endian byte order of `y`.
fn sw_point_with_sign<P: SWCurveConfig>(
    x: P::BaseField,
    want_greatest: bool,
    y_be: impl Fn(&P::BaseField) -> Vec<u8>,
) -> Result<Affine<P>, WireError> {
    let p = Affine::<P>::get_point_from_x_unchecked(x, false).ok_or(WireError::InvalidPoint)?;
    let (_, y) = p.xy().ok_or(WireError::InvalidPoint)?;
    let is_greatest = y_be(y) > y_be(&-*y);
    let p = if is_greatest == want_greatest { p } else { -p };
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(WireError::InvalidPoint);
    }
    Ok(p)
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// BLS12-381 backend (preferred).
#[cfg(feature = "bls12_381")]
#[derive(Debug, Clone, Copy)]
pub struct Bls12381;

#[cfg(feature = "bls12_381")]
mod bls12_381_impl {
    use super::*;
    use ark_bls12_381::{Fq, Fq2};

    const FIELD: usize = 48;
    // ZCash point-encoding bits, carried in the top byte of the payload.
    const BIT_COMPRESSED: u8 = 0x80;
    const BIT_INFINITY: u8 = 0x40;
    const BIT_SORT: u8 = 0x20;

    fn fq2_be(x: &Fq2) -> Vec<u8> {
        // ZCash orders the extension as c1 ‖ c0
        let mut out = fe_to_be(&x.c1, FIELD);
        out.extend(fe_to_be(&x.c0, FIELD));
        out
    }

    impl CurveBackend for Bls12381 {
        type E = ark_bls12_381::Bls12_381;

        const ID: CurveId = CurveId::Bls12_381;
        const STANDARD_FORMAT: u8 = format::ZCASH_BLS12;

        fn hash_to_g1(domain: &[u8], msg: &[u8]) -> <Self::E as Pairing>::G1 {
            hash_to_sw_curve::<ark_bls12_381::g1::Config>(domain, msg)
        }

        fn hash_to_g2(domain: &[u8], msg: &[u8]) -> <Self::E as Pairing>::G2 {
            hash_to_sw_curve_ext2::<ark_bls12_381::g2::Config, ark_bls12_381::Fq2Config>(
                domain, msg,
            )
        }

        fn g1_standard_payload(p: &ark_bls12_381::G1Affine) -> (u8, Vec<u8>) {
            let mut out = vec![0u8; FIELD];
            let mut flags = crate::wire::flag::COMPRESSION;
            match p.xy() {
                Some((x, y)) => {
                    out.copy_from_slice(&fe_to_be(x, FIELD));
                    if fe_to_be(y, FIELD) > fe_to_be(&-*y, FIELD) {
                        out[0] |= BIT_SORT;
                        flags |= crate::wire::flag::Y_SIGN;
                    }
                }
                None => {
                    out[0] |= BIT_INFINITY;
                    flags |= crate::wire::flag::INFINITY;
                }
            }
            out[0] |= BIT_COMPRESSED;
            (flags, out)
        }

        fn g1_from_standard_payload(
            flags: u8,
            payload: &[u8],
        ) -> Result<ark_bls12_381::G1Affine, WireError> {
            if payload.len() != FIELD {
                return Err(WireError::LengthMismatch { expected: FIELD, got: payload.len() });
            }
            let infinity =
                payload[0] & BIT_INFINITY != 0 || flags & crate::wire::flag::INFINITY != 0;
            if infinity {
                return Ok(ark_bls12_381::G1Affine::zero());
            }
            let mut body = payload.to_vec();
            let sort = body[0] & BIT_SORT != 0;
            body[0] &= !(BIT_COMPRESSED | BIT_INFINITY | BIT_SORT);
            let x: Fq = fe_from_be(&body)?;
            sw_point_with_sign::<ark_bls12_381::g1::Config>(x, sort, |y| fe_to_be(y, FIELD))
        }

        fn g2_standard_payload(p: &ark_bls12_381::G2Affine) -> (u8, Vec<u8>) {
            let mut out = vec![0u8; 2 * FIELD];
            let mut flags = crate::wire::flag::COMPRESSION;
            match p.xy() {
                Some((x, y)) => {
                    out.copy_from_slice(&fq2_be(x));
                    if fq2_be(y) > fq2_be(&-*y) {
                        out[0] |= BIT_SORT;
                        flags |= crate::wire::flag::Y_SIGN;
                    }
                }
                None => {
                    out[0] |= BIT_INFINITY;
                    flags |= crate::wire::flag::INFINITY;
                }
            }
            out[0] |= BIT_COMPRESSED;
            (flags, out)
        }

        fn g2_from_standard_payload(
            flags: u8,
            payload: &[u8],
        ) -> Result<ark_bls12_381::G2Affine, WireError> {
            if payload.len() != 2 * FIELD {
                return Err(WireError::LengthMismatch {
                    expected: 2 * FIELD,
                    got: payload.len(),
                });
            }
            let infinity =
                payload[0] & BIT_INFINITY != 0 || flags & crate::wire::flag::INFINITY != 0;
            if infinity {
                return Ok(ark_bls12_381::G2Affine::zero());
            }
            let mut body = payload.to_vec();
            let sort = body[0] & BIT_SORT != 0;
            body[0] &= !(BIT_COMPRESSED | BIT_INFINITY | BIT_SORT);
            let c1: Fq = fe_from_be(&body[..FIELD])?;
            let c0: Fq = fe_from_be(&body[FIELD..])?;
            let x = Fq2::new(c0, c1);
            sw_point_with_sign::<ark_bls12_381::g2::Config>(x, sort, fq2_be)
        }
    }
}

/// BN254 backend (legacy).
#[cfg(feature = "bn254")]
#[derive(Debug, Clone, Copy)]
pub struct Bn254;

#[cfg(feature = "bn254")]
mod bn254_impl {
    use super::*;
    use ark_bn254::{Fq, Fq2};

    const FIELD: usize = 32;

    fn fq2_be(x: &Fq2) -> Vec<u8> {
        // Ethereum ABI orders the extension as imaginary ‖ real (c1 ‖ c0)
        let mut out = fe_to_be(&x.c1, FIELD);
        out.extend(fe_to_be(&x.c0, FIELD));
        out
    }

    impl CurveBackend for Bn254 {
        type E = ark_bn254::Bn254;

        const ID: CurveId = CurveId::Bn254;
        const STANDARD_FORMAT: u8 = format::ETHEREUM_BN254;

        fn hash_to_g1(domain: &[u8], msg: &[u8]) -> <Self::E as Pairing>::G1 {
            hash_to_sw_curve::<ark_bn254::g1::Config>(domain, msg)
        }

        fn hash_to_g2(domain: &[u8], msg: &[u8]) -> <Self::E as Pairing>::G2 {
            hash_to_sw_curve_ext2::<ark_bn254::g2::Config, ark_bn254::Fq2Config>(domain, msg)
        }

        fn g1_standard_payload(p: &ark_bn254::G1Affine) -> (u8, Vec<u8>) {
            // uncompressed big-endian (x, y); infinity is the (0, 0) pair
            match p.xy() {
                Some((x, y)) => {
                    let mut out = fe_to_be(x, FIELD);
                    out.extend(fe_to_be(y, FIELD));
                    (0, out)
                }
                None => (crate::wire::flag::INFINITY, vec![0u8; 2 * FIELD]),
            }
        }

        fn g1_from_standard_payload(
            flags: u8,
            payload: &[u8],
        ) -> Result<ark_bn254::G1Affine, WireError> {
            if payload.len() != 2 * FIELD {
                return Err(WireError::LengthMismatch {
                    expected: 2 * FIELD,
                    got: payload.len(),
                });
            }
            if flags & crate::wire::flag::INFINITY != 0 || payload.iter().all(|&b| b == 0) {
                return Ok(ark_bn254::G1Affine::zero());
            }
            let x: Fq = fe_from_be(&payload[..FIELD])?;
            let y: Fq = fe_from_be(&payload[FIELD..])?;
            let p = ark_bn254::G1Affine::new_unchecked(x, y);
            if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
                return Err(WireError::InvalidPoint);
            }
            Ok(p)
        }

        fn g2_standard_payload(p: &ark_bn254::G2Affine) -> (u8, Vec<u8>) {
            match p.xy() {
                Some((x, y)) => {
                    let mut out = fq2_be(x);
                    out.extend(fq2_be(y));
                    (0, out)
                }
                None => (crate::wire::flag::INFINITY, vec![0u8; 4 * FIELD]),
            }
        }

        fn g2_from_standard_payload(
            flags: u8,
            payload: &[u8],
        ) -> Result<ark_bn254::G2Affine, WireError> {
            if payload.len() != 4 * FIELD {
                return Err(WireError::LengthMismatch {
                    expected: 4 * FIELD,
                    got: payload.len(),
                });
            }
            if flags & crate::wire::flag::INFINITY != 0 || payload.iter().all(|&b| b == 0) {
                return Ok(ark_bn254::G2Affine::zero());
            }
            let xc1: Fq = fe_from_be(&payload[..FIELD])?;
            let xc0: Fq = fe_from_be(&payload[FIELD..2 * FIELD])?;
            let yc1: Fq = fe_from_be(&payload[2 * FIELD..3 * FIELD])?;
            let yc0: Fq = fe_from_be(&payload[3 * FIELD..])?;
            let p = ark_bn254::G2Affine::new_unchecked(Fq2::new(xc0, xc1), Fq2::new(yc0, yc1));
            if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
                return Err(WireError::InvalidPoint);
            }
            Ok(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::CurveGroup;

    #[test]
    fn catalog_resolves_names_and_bytes() {
        assert_eq!(CurveId::from_name("BLS12_381").unwrap(), CurveId::Bls12_381);
        assert_eq!(CurveId::from_name("BN254").unwrap(), CurveId::Bn254);
        assert!(matches!(
            CurveId::from_name("P-521"),
            Err(AbeError::UnknownCurve(_))
        ));
        for id in [CurveId::Bls12_381, CurveId::Bn254] {
            assert_eq!(CurveId::from_byte(id as u8).unwrap(), id);
        }
        assert!(CurveId::from_byte(0x7f).is_err());
    }

    #[test]
    fn catalog_widths_follow_field_size() {
        let p = CurveId::Bls12_381.params();
        assert_eq!(p.field_bytes, 48);
        assert_eq!(p.g1_uncompressed, 96);
        assert_eq!(p.g2_uncompressed, 192);
        assert_eq!(p.gt_full, 576);
        assert_eq!(p.gt_cyclotomic, 384);
        let p = CurveId::Bn254.params();
        assert_eq!(p.field_bytes, 32);
        assert_eq!(p.g1_uncompressed, 64);
    }

    #[cfg(feature = "bls12_381")]
    #[test]
    fn hash_to_g1_is_deterministic_and_on_curve() {
        let a = Bls12381::hash_to_g1(b"attr", b"role:admin");
        let b = Bls12381::hash_to_g1(b"attr", b"role:admin");
        assert_eq!(a, b);
        let aff = a.into_affine();
        assert!(aff.is_on_curve());
        assert!(aff.is_in_correct_subgroup_assuming_on_curve());
    }

    #[cfg(feature = "bls12_381")]
    #[test]
    fn hash_to_g1_separates_domains_and_messages() {
        let a = Bls12381::hash_to_g1(b"attr", b"x");
        let b = Bls12381::hash_to_g1(b"base", b"x");
        let c = Bls12381::hash_to_g1(b"attr", b"y");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[cfg(feature = "bn254")]
    #[test]
    fn hash_to_g2_lands_in_subgroup() {
        let q = Bn254::hash_to_g2(b"g2-base", b"seed");
        let aff = q.into_affine();
        assert!(aff.is_on_curve());
        assert!(aff.is_in_correct_subgroup_assuming_on_curve());
    }

    #[cfg(feature = "bls12_381")]
    #[test]
    fn bls_family_payload_round_trips() {
        let p = Bls12381::hash_to_g1(b"t", b"p").into_affine();
        let (flags, payload) = Bls12381::g1_standard_payload(&p);
        assert_eq!(payload.len(), 48);
        assert_eq!(Bls12381::g1_from_standard_payload(flags, &payload).unwrap(), p);

        let q = Bls12381::hash_to_g2(b"t", b"q").into_affine();
        let (flags, payload) = Bls12381::g2_standard_payload(&q);
        assert_eq!(payload.len(), 96);
        assert_eq!(Bls12381::g2_from_standard_payload(flags, &payload).unwrap(), q);

        let inf = ark_bls12_381::G1Affine::zero();
        let (flags, payload) = Bls12381::g1_standard_payload(&inf);
        assert_eq!(Bls12381::g1_from_standard_payload(flags, &payload).unwrap(), inf);
    }

    #[cfg(feature = "bn254")]
    #[test]
    fn ethereum_family_payload_round_trips() {
        let p = Bn254::hash_to_g1(b"t", b"p").into_affine();
        let (flags, payload) = Bn254::g1_standard_payload(&p);
        assert_eq!(payload.len(), 64);
        assert_eq!(Bn254::g1_from_standard_payload(flags, &payload).unwrap(), p);

        let q = Bn254::hash_to_g2(b"t", b"q").into_affine();
        let (flags, payload) = Bn254::g2_standard_payload(&q);
        assert_eq!(payload.len(), 128);
        assert_eq!(Bn254::g2_from_standard_payload(flags, &payload).unwrap(), q);
    }

    #[cfg(feature = "bn254")]
    #[test]
    fn off_curve_ethereum_payload_is_rejected() {
        let mut payload = vec![0u8; 64];
        payload[31] = 1; // x = 1, y = 0 is not on the curve
        assert!(matches!(
            Bn254::g1_from_standard_payload(0, &payload),
            Err(WireError::InvalidPoint)
        ));
    }
}
