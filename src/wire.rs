//! Bit-exact wire format: element framing and containers
//!
//! Two layers, both byte-stable across releases — the CCA re-encryption
//! check compares serialized ciphertexts, so every codec here must satisfy
//! the round-trip law `decode(encode(x)) == x` *and* re-encode to identical
//! bytes.
//!
//! ## Element framing
//!
//! Every element is `[tag:u8][len:varint][body]` with tags `0x01` Zr,
//! `0x02` G1, `0x03` G2, `0x04` GT, `0x05` opaque bytes. Scalars are always
//! minimal big-endian (leading zeros stripped; zero is empty). Group
//! elements come in two framings:
//!
//! - **legacy**: the backend's native compressed form (arkworks canonical);
//! - **standard**: a 9-byte header `"OABE" ‖ version ‖ elem_type ‖ curve_id
//!   ‖ format ‖ flags` followed by the curve family's payload (ZCash
//!   compressed points for BLS12-381, Ethereum uncompressed pairs for
//!   BN254). Decoders pick the framing by peeking the magic.
//!
//! GT travels as the full 12·field encoding; the cyclotomic-compressed form
//! is recognized in the flags but decompression is unimplemented pending
//! reference vectors, and decoding such an element fails.
//!
//! ## Containers
//!
//! Ciphertexts and keys are `[scheme_id:u8][count:u8][entry]*`, each entry a
//! length-prefixed UTF-8 label followed by one framed element. Entries are
//! sorted by label (byte order) on the wire, duplicate labels are rejected,
//! and structural equality is per-label, per-element bytes — the unit the
//! CCA comparison walks.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ark_ec::CurveGroup;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::arith::{zr_to_minimal_be, G1Aff, G2Aff, Gt, Zr, G1, G2};
use crate::curves::CurveBackend;

/// Magic prefix of the standard per-element framing.
pub const MAGIC: &[u8; 4] = b"OABE";
/// Standard framing version.
pub const VERSION: u8 = 2;

/// `format` byte values of the standard framing.
pub mod format {
    pub const SEC1: u8 = 0x01;
    pub const ZCASH_BLS12: u8 = 0x02;
    pub const ETHEREUM_BN254: u8 = 0x03;
    pub const IETF_PAIRING: u8 = 0x04;
}

/// `flags` bits of the standard framing.
pub mod flag {
    pub const COMPRESSION: u8 = 0x01;
    pub const INFINITY: u8 = 0x02;
    pub const Y_SIGN: u8 = 0x04;
    pub const CYCLOTOMIC: u8 = 0x08;
}

/// Common container entry labels.
pub const LABEL_CURVE: &str = "curve";
pub const LABEL_POLICY: &str = "policy";
pub const LABEL_ATTRS: &str = "attrs";
pub const LABEL_PAYLOAD: &str = "_ED";

/// Serialization failures. Deserializers never return partially-decoded
/// values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("varint length does not fit")]
    VarintOverflow,
    #[error("container holds {0} entries, limit is 255")]
    TooManyEntries(usize),
    #[error("unknown element tag 0x{0:02x}")]
    BadTag(u8),
    #[error("unsupported framing version {0}")]
    BadVersion(u8),
    #[error("element type mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    ElemTypeMismatch { expected: u8, got: u8 },
    #[error("curve mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    CurveMismatch { expected: u8, got: u8 },
    #[error("wire format mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    FormatMismatch { expected: u8, got: u8 },
    #[error("length mismatch: expected {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("scalar body is not minimal big-endian")]
    NonCanonicalScalar,
    #[error("invalid or out-of-subgroup curve point")]
    InvalidPoint,
    #[error("invalid target-group element")]
    InvalidElement,
    #[error("GT cyclotomic decompression is unimplemented")]
    CyclotomicUnimplemented,
    #[error("unknown scheme discriminator 0x{0:02x}")]
    UnknownScheme(u8),
    #[error("duplicate container label `{0}`")]
    DuplicateLabel(String),
    #[error("malformed container label")]
    BadLabel,
    #[error("trailing bytes after container")]
    TrailingBytes,
    #[error("missing container entry `{0}`")]
    MissingEntry(String),
    #[error("container entry `{0}` has the wrong element kind")]
    WrongKind(String),
    #[error("container entry is not valid UTF-8")]
    BadUtf8,
}

/// Per-element tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementTag {
    Scalar = 0x01,
    G1 = 0x02,
    G2 = 0x03,
    Gt = 0x04,
    Bytes = 0x05,
}

impl ElementTag {
    fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0x01 => Ok(ElementTag::Scalar),
            0x02 => Ok(ElementTag::G1),
            0x03 => Ok(ElementTag::G2),
            0x04 => Ok(ElementTag::Gt),
            0x05 => Ok(ElementTag::Bytes),
            other => Err(WireError::BadTag(other)),
        }
    }
}

/// Which group-element framing to emit. Decoders detect the framing
/// themselves, so this only affects encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Backend-native compressed bytes.
    #[default]
    Legacy,
    /// 9-byte `OABE` header + family payload.
    Standard,
}

/// One-byte scheme discriminator of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchemeId {
    CpWaters = 0x01,
    KpGpsw = 0x02,
    CpWatersCca = 0x11,
    KpGpswCca = 0x12,
}

impl SchemeId {
    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0x01 => Ok(SchemeId::CpWaters),
            0x02 => Ok(SchemeId::KpGpsw),
            0x11 => Ok(SchemeId::CpWatersCca),
            0x12 => Ok(SchemeId::KpGpswCca),
            other => Err(WireError::UnknownScheme(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Primitives: varint and a bounds-checked reader
// ---------------------------------------------------------------------------

fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        let b = *self.buf.get(self.pos).ok_or(WireError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::VarintOverflow)?;
        if end > self.buf.len() {
            return Err(WireError::UnexpectedEof);
        }
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn varint(&mut self) -> Result<u64, WireError> {
        let mut v: u64 = 0;
        let mut shift = 0u32;
        loop {
            let b = self.u8()?;
            if shift >= 64 || (shift == 63 && b > 1) {
                return Err(WireError::VarintOverflow);
            }
            v |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(v);
            }
            shift += 7;
        }
    }

    fn done(&self) -> bool {
        self.pos == self.buf.len()
    }
}

// ---------------------------------------------------------------------------
// Element bodies
// ---------------------------------------------------------------------------

fn standard_header(elem: ElementTag, curve: u8, fmt: u8, flags: u8) -> [u8; 9] {
    let mut h = [0u8; 9];
    h[..4].copy_from_slice(MAGIC);
    h[4] = VERSION;
    h[5] = elem as u8;
    h[6] = curve;
    h[7] = fmt;
    h[8] = flags;
    h
}

/// Parsed standard header (payload follows).
struct StdHeader {
    elem_type: u8,
    curve: u8,
    format: u8,
    flags: u8,
}

fn parse_standard_header(r: &mut Reader<'_>) -> Result<StdHeader, WireError> {
    let magic = r.take(4)?;
    debug_assert_eq!(magic, MAGIC);
    let version = r.u8()?;
    if version != VERSION {
        return Err(WireError::BadVersion(version));
    }
    Ok(StdHeader { elem_type: r.u8()?, curve: r.u8()?, format: r.u8()?, flags: r.u8()? })
}

fn check_header<B: CurveBackend>(h: &StdHeader, expected: ElementTag) -> Result<(), WireError> {
    if h.elem_type != expected as u8 {
        return Err(WireError::ElemTypeMismatch { expected: expected as u8, got: h.elem_type });
    }
    if h.curve != B::ID as u8 {
        return Err(WireError::CurveMismatch { expected: B::ID as u8, got: h.curve });
    }
    if h.format != B::STANDARD_FORMAT {
        return Err(WireError::FormatMismatch { expected: B::STANDARD_FORMAT, got: h.format });
    }
    Ok(())
}

/// Minimal big-endian scalar body (framing-independent).
pub fn encode_zr<B: CurveBackend>(x: &Zr<B>) -> Vec<u8> {
    zr_to_minimal_be::<B>(x)
}

/// Checked inverse of [`encode_zr`]: the body must be the unique minimal
/// encoding of a value in `[0, r)`.
pub fn decode_zr<B: CurveBackend>(body: &[u8]) -> Result<Zr<B>, WireError> {
    if body.first() == Some(&0) {
        return Err(WireError::NonCanonicalScalar);
    }
    let x = crate::arith::zr_from_le_bytes::<B>(&{
        let mut le = body.to_vec();
        le.reverse();
        le
    });
    if zr_to_minimal_be::<B>(&x) != body {
        return Err(WireError::NonCanonicalScalar);
    }
    Ok(x)
}

/// Encode a G1 element body under the chosen framing.
pub fn encode_g1<B: CurveBackend>(p: &G1<B>, enc: Encoding) -> Vec<u8> {
    let aff = p.into_affine();
    match enc {
        Encoding::Legacy => {
            let mut out = Vec::new();
            aff.serialize_compressed(&mut out)
                .expect("point serialization into a Vec cannot fail");
            out
        }
        Encoding::Standard => {
            let (flags, payload) = B::g1_standard_payload(&aff);
            let mut out =
                standard_header(ElementTag::G1, B::ID as u8, B::STANDARD_FORMAT, flags).to_vec();
            out.extend(payload);
            out
        }
    }
}

/// Decode a G1 element body, detecting the framing by the magic prefix.
/// Points are validated (on curve, in subgroup).
pub fn decode_g1<B: CurveBackend>(body: &[u8]) -> Result<G1<B>, WireError> {
    if body.starts_with(MAGIC) {
        let mut r = Reader::new(body);
        let h = parse_standard_header(&mut r)?;
        check_header::<B>(&h, ElementTag::G1)?;
        let aff = B::g1_from_standard_payload(h.flags, r.take(body.len() - r.pos)?)?;
        Ok(aff.into())
    } else {
        let mut slice = body;
        let aff =
            G1Aff::<B>::deserialize_compressed(&mut slice).map_err(|_| WireError::InvalidPoint)?;
        if !slice.is_empty() {
            return Err(WireError::TrailingBytes);
        }
        Ok(aff.into())
    }
}

/// Encode a G2 element body under the chosen framing.
pub fn encode_g2<B: CurveBackend>(p: &G2<B>, enc: Encoding) -> Vec<u8> {
    let aff = p.into_affine();
    match enc {
        Encoding::Legacy => {
            let mut out = Vec::new();
            aff.serialize_compressed(&mut out)
                .expect("point serialization into a Vec cannot fail");
            out
        }
        Encoding::Standard => {
            let (flags, payload) = B::g2_standard_payload(&aff);
            let mut out =
                standard_header(ElementTag::G2, B::ID as u8, B::STANDARD_FORMAT, flags).to_vec();
            out.extend(payload);
            out
        }
    }
}

/// Decode a G2 element body, detecting the framing by the magic prefix.
pub fn decode_g2<B: CurveBackend>(body: &[u8]) -> Result<G2<B>, WireError> {
    if body.starts_with(MAGIC) {
        let mut r = Reader::new(body);
        let h = parse_standard_header(&mut r)?;
        check_header::<B>(&h, ElementTag::G2)?;
        let aff = B::g2_from_standard_payload(h.flags, r.take(body.len() - r.pos)?)?;
        Ok(aff.into())
    } else {
        let mut slice = body;
        let aff =
            G2Aff::<B>::deserialize_compressed(&mut slice).map_err(|_| WireError::InvalidPoint)?;
        if !slice.is_empty() {
            return Err(WireError::TrailingBytes);
        }
        Ok(aff.into())
    }
}

/// Encode a GT element body (full 12·field form) under the chosen framing.
pub fn encode_gt<B: CurveBackend>(x: &Gt<B>, enc: Encoding) -> Vec<u8> {
    let mut payload = Vec::new();
    x.serialize_uncompressed(&mut payload)
        .expect("GT serialization into a Vec cannot fail");
    match enc {
        Encoding::Legacy => payload,
        Encoding::Standard => {
            let mut out =
                standard_header(ElementTag::Gt, B::ID as u8, B::STANDARD_FORMAT, 0).to_vec();
            out.extend(payload);
            out
        }
    }
}

/// Decode a GT element body. A set CYCLOTOMIC flag fails with
/// [`WireError::CyclotomicUnimplemented`].
pub fn decode_gt<B: CurveBackend>(body: &[u8]) -> Result<Gt<B>, WireError> {
    let payload = if body.starts_with(MAGIC) {
        let mut r = Reader::new(body);
        let h = parse_standard_header(&mut r)?;
        check_header::<B>(&h, ElementTag::Gt)?;
        if h.flags & flag::CYCLOTOMIC != 0 {
            return Err(WireError::CyclotomicUnimplemented);
        }
        r.take(body.len() - r.pos)?
    } else {
        body
    };
    let mut slice = payload;
    let x =
        Gt::<B>::deserialize_uncompressed(&mut slice).map_err(|_| WireError::InvalidElement)?;
    if !slice.is_empty() {
        return Err(WireError::TrailingBytes);
    }
    Ok(x)
}

/// Decompress a cyclotomic-compressed GT payload (8 of 12 Fp coordinates).
///
/// Unimplemented until reference vectors from an independent implementation
/// are agreed; the flag is parsed and rejected in the meantime.
pub fn cyclotomic_decompress<B: CurveBackend>(_payload: &[u8]) -> Result<Gt<B>, WireError> {
    Err(WireError::CyclotomicUnimplemented)
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// A framed container entry: element tag plus its serialized body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub tag: ElementTag,
    pub body: Vec<u8>,
}

impl Entry {
    /// Framing this entry was written with, detected by the magic prefix.
    pub fn encoding(&self) -> Encoding {
        if self.body.starts_with(MAGIC) {
            Encoding::Standard
        } else {
            Encoding::Legacy
        }
    }
}

/// Tagged label→element map; the unit of serialization for keys and
/// ciphertexts. Labels iterate in byte order, which is also the wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    scheme: SchemeId,
    entries: BTreeMap<String, Entry>,
}

impl Container {
    pub fn new(scheme: SchemeId) -> Self {
        Self { scheme, entries: BTreeMap::new() }
    }

    pub fn scheme(&self) -> SchemeId {
        self.scheme
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry(&self, label: &str) -> Option<&Entry> {
        self.entries.get(label)
    }

    pub fn entry_mut(&mut self, label: &str) -> Option<&mut Entry> {
        self.entries.get_mut(label)
    }

    fn put(&mut self, label: &str, tag: ElementTag, body: Vec<u8>) {
        self.entries.insert(label.to_string(), Entry { tag, body });
    }

    pub fn put_zr<B: CurveBackend>(&mut self, label: &str, x: &Zr<B>) {
        self.put(label, ElementTag::Scalar, encode_zr::<B>(x));
    }

    pub fn put_g1<B: CurveBackend>(&mut self, label: &str, p: &G1<B>, enc: Encoding) {
        self.put(label, ElementTag::G1, encode_g1::<B>(p, enc));
    }

    pub fn put_g2<B: CurveBackend>(&mut self, label: &str, p: &G2<B>, enc: Encoding) {
        self.put(label, ElementTag::G2, encode_g2::<B>(p, enc));
    }

    pub fn put_gt<B: CurveBackend>(&mut self, label: &str, x: &Gt<B>, enc: Encoding) {
        self.put(label, ElementTag::Gt, encode_gt::<B>(x, enc));
    }

    pub fn put_bytes(&mut self, label: &str, bytes: &[u8]) {
        self.put(label, ElementTag::Bytes, bytes.to_vec());
    }

    pub fn put_str(&mut self, label: &str, s: &str) {
        self.put_bytes(label, s.as_bytes());
    }

    /// Record the backend's catalog id under the `curve` label.
    pub fn put_curve<B: CurveBackend>(&mut self) {
        self.put_bytes(LABEL_CURVE, &[B::ID as u8]);
    }

    fn fetch(&self, label: &str, tag: ElementTag) -> Result<&Entry, WireError> {
        let e = self
            .entries
            .get(label)
            .ok_or_else(|| WireError::MissingEntry(label.to_string()))?;
        if e.tag != tag {
            return Err(WireError::WrongKind(label.to_string()));
        }
        Ok(e)
    }

    pub fn get_zr<B: CurveBackend>(&self, label: &str) -> Result<Zr<B>, WireError> {
        decode_zr::<B>(&self.fetch(label, ElementTag::Scalar)?.body)
    }

    pub fn get_g1<B: CurveBackend>(&self, label: &str) -> Result<G1<B>, WireError> {
        decode_g1::<B>(&self.fetch(label, ElementTag::G1)?.body)
    }

    pub fn get_g2<B: CurveBackend>(&self, label: &str) -> Result<G2<B>, WireError> {
        decode_g2::<B>(&self.fetch(label, ElementTag::G2)?.body)
    }

    pub fn get_gt<B: CurveBackend>(&self, label: &str) -> Result<Gt<B>, WireError> {
        decode_gt::<B>(&self.fetch(label, ElementTag::Gt)?.body)
    }

    pub fn get_bytes(&self, label: &str) -> Result<&[u8], WireError> {
        Ok(&self.fetch(label, ElementTag::Bytes)?.body)
    }

    pub fn get_str(&self, label: &str) -> Result<&str, WireError> {
        std::str::from_utf8(self.get_bytes(label)?).map_err(|_| WireError::BadUtf8)
    }

    /// Catalog id byte recorded by [`Self::put_curve`].
    pub fn curve_byte(&self) -> Result<u8, WireError> {
        let b = self.get_bytes(LABEL_CURVE)?;
        if b.len() != 1 {
            return Err(WireError::LengthMismatch { expected: 1, got: b.len() });
        }
        Ok(b[0])
    }

    /// Serialize: `[scheme_id][count][entry]*`, entries in label byte order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        if self.entries.len() > u8::MAX as usize {
            return Err(WireError::TooManyEntries(self.entries.len()));
        }
        let mut out = vec![self.scheme as u8, self.entries.len() as u8];
        for (label, entry) in &self.entries {
            if label.is_empty() || !label.is_ascii() {
                return Err(WireError::BadLabel);
            }
            write_varint(&mut out, label.len() as u64);
            out.extend_from_slice(label.as_bytes());
            out.push(entry.tag as u8);
            write_varint(&mut out, entry.body.len() as u64);
            out.extend_from_slice(&entry.body);
        }
        Ok(out)
    }

    /// Deserialize, rejecting duplicates and trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(bytes);
        let scheme = SchemeId::from_byte(r.u8()?)?;
        let count = r.u8()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let label_len = r.varint()? as usize;
            let label =
                std::str::from_utf8(r.take(label_len)?).map_err(|_| WireError::BadLabel)?;
            if label.is_empty() || !label.is_ascii() {
                return Err(WireError::BadLabel);
            }
            let tag = ElementTag::from_byte(r.u8()?)?;
            let body_len = r.varint()? as usize;
            let body = r.take(body_len)?.to_vec();
            if entries.insert(label.to_string(), Entry { tag, body }).is_some() {
                return Err(WireError::DuplicateLabel(label.to_string()));
            }
        }
        if !r.done() {
            return Err(WireError::TrailingBytes);
        }
        Ok(Self { scheme, entries })
    }
}
