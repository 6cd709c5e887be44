//! Linear secret sharing over the policy tree
//!
//! Share generation and reconstruction for monotone threshold trees, in the
//! scalar field of the active backend.
//!
//! - **Sharing.** Every threshold node `(t, children)` carries a random
//!   polynomial of degree `t − 1` whose constant term is the node's secret;
//!   child `j` (1-based, canonical order) receives `f(j)`. Leaves receive
//!   the value passed down. Polynomial coefficients are drawn from the
//!   caller's DRBG *before* recursing, in canonical child order, so the
//!   draw schedule is a pure function of the tree shape.
//! - **Reconstruction.** For a satisfying attribute set the tree is pruned
//!   deterministically (the first `t` satisfied children in canonical
//!   order), and each selected leaf receives the product of the Lagrange
//!   basis values `ℓ_j(0)` along its path. For any consistent share vector,
//!   `Σ ωᵢ·λᵢ` recovers the root secret.
//!
//! A share that happens to be `0` is still a share: it stays in the map and
//! participates in reconstruction. Dropping it would break policies whose
//! polynomials vanish at a child index.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ark_ff::{Field, One, Zero};
use rand::{CryptoRng, RngCore};

use crate::arith::{rand_zr, Zr};
use crate::curves::CurveBackend;
use crate::policy::{AttributeList, LeafId, Policy, PolicyNode};
use crate::AbeError;

/// Split `secret` over the policy leaves. The map contains **every** leaf of
/// the tree, zero shares included, keyed by canonical leaf id.
pub fn share<B: CurveBackend>(
    policy: &Policy,
    secret: &Zr<B>,
    rng: &mut (impl RngCore + CryptoRng),
) -> BTreeMap<LeafId, Zr<B>> {
    let mut shares = BTreeMap::new();
    let mut next_leaf = 1u32;
    share_node::<B>(policy.root(), *secret, rng, &mut next_leaf, &mut shares);
    shares
}

fn share_node<B: CurveBackend>(
    node: &PolicyNode,
    secret: Zr<B>,
    rng: &mut (impl RngCore + CryptoRng),
    next_leaf: &mut u32,
    shares: &mut BTreeMap<LeafId, Zr<B>>,
) {
    match node {
        PolicyNode::Leaf(_) => {
            shares.insert(LeafId(*next_leaf), secret);
            *next_leaf += 1;
        }
        PolicyNode::Threshold { t, children } => {
            // f(0) = secret, degree t-1, coefficients drawn in order
            let mut coeffs = Vec::with_capacity(*t);
            coeffs.push(secret);
            for _ in 1..*t {
                coeffs.push(rand_zr::<B>(rng));
            }
            for (j, child) in children.iter().enumerate() {
                let x = Zr::<B>::from((j + 1) as u64);
                let value = horner::<B>(&coeffs, x);
                share_node::<B>(child, value, rng, next_leaf, shares);
            }
        }
    }
}

fn horner<B: CurveBackend>(coeffs: &[Zr<B>], x: Zr<B>) -> Zr<B> {
    let mut acc = Zr::<B>::zero();
    for c in coeffs.iter().rev() {
        acc = acc * x + c;
    }
    acc
}

/// Reconstruction coefficients `ω` for a satisfying attribute set: for every
/// consistent share vector `λ`, `Σ ωᵢ·λᵢ` equals the shared secret. Only
/// leaves of the (deterministically) pruned subtree appear.
///
/// Returns [`AbeError::PolicyUnsatisfied`] when `attrs` does not satisfy the
/// policy.
pub fn coefficients<B: CurveBackend>(
    policy: &Policy,
    attrs: &AttributeList,
) -> Result<BTreeMap<LeafId, Zr<B>>, AbeError> {
    let mut next_leaf = 1u32;
    let pruned = prune(policy.root(), attrs, &mut next_leaf).ok_or(AbeError::PolicyUnsatisfied)?;
    let mut coeffs = BTreeMap::new();
    accumulate::<B>(&pruned, Zr::<B>::one(), &mut coeffs);
    Ok(coeffs)
}

/// A satisfied subtree: selected children keep their original 1-based index
/// so Lagrange interpolation sees the right x-coordinates.
enum Pruned {
    Leaf(LeafId),
    Node { selected: Vec<(usize, Pruned)> },
}

fn prune(node: &PolicyNode, attrs: &AttributeList, next_leaf: &mut u32) -> Option<Pruned> {
    match node {
        PolicyNode::Leaf(attr) => {
            let id = LeafId(*next_leaf);
            *next_leaf += 1;
            attrs.contains(attr).then_some(Pruned::Leaf(id))
        }
        PolicyNode::Threshold { t, children } => {
            let mut selected = Vec::new();
            for (j, child) in children.iter().enumerate() {
                let sub = prune(child, attrs, next_leaf);
                // leaf numbering must advance through unsatisfied branches
                if selected.len() < *t {
                    if let Some(p) = sub {
                        selected.push((j + 1, p));
                    }
                }
            }
            (selected.len() == *t).then_some(Pruned::Node { selected })
        }
    }
}

fn accumulate<B: CurveBackend>(
    node: &Pruned,
    weight: Zr<B>,
    out: &mut BTreeMap<LeafId, Zr<B>>,
) {
    match node {
        Pruned::Leaf(id) => {
            out.insert(*id, weight);
        }
        Pruned::Node { selected } => {
            let xs: Vec<usize> = selected.iter().map(|(j, _)| *j).collect();
            for (j, child) in selected {
                let l = lagrange_at_zero::<B>(*j, &xs);
                accumulate::<B>(child, weight * l, out);
            }
        }
    }
}

/// `ℓ_j(0) = Π_{m ≠ j} (0 − m) / (j − m)` over the selected indices.
fn lagrange_at_zero<B: CurveBackend>(j: usize, xs: &[usize]) -> Zr<B> {
    let xj = Zr::<B>::from(j as u64);
    let mut acc = Zr::<B>::one();
    for &m in xs {
        if m == j {
            continue;
        }
        let xm = Zr::<B>::from(m as u64);
        let denom = (xj - xm)
            .inverse()
            .expect("selected child indices are distinct");
        acc *= -xm * denom;
    }
    acc
}
