#![deny(missing_docs)]

//! # o3tp-cg — Clebsch–Gordan Coupling Tensors
//!
//! Supplies the coupling tensor `C[i, j, k]` for every degree triple
//! `(l1, l2, l3)`: the unique (up to scale) bilinear map from
//! `(2 l1 + 1) x (2 l2 + 1)` real components to `2 l3 + 1` real components
//! that commutes with rotations.
//!
//! - **SU(2)** (`su2.rs`): complex-basis coefficients from the Racah
//!   formula, both exact (`sign · sqrt(rational)` with big rationals) and
//!   in `f64`.
//!
//! - **Real basis** (`real.rs`): change of basis to real harmonics and
//!   unit-norm normalization. For `l = 1` the components are `(y, z, x)`.
//!
//! - **Cache** (`cache.rs`): [`ClebschGordanCache`], a
//!   `parking_lot::RwLock<HashMap>` memo handing out shared `Arc` tensors.
//!
//! ## Invariants
//!
//! - `C` is all zeros when `l3 ∉ |l1 - l2| ..= l1 + l2`, otherwise its
//!   Frobenius norm is 1.
//! - `Σ_ij C[i, j, k] C[i, j, k'] = δ_kk' / (2 l3 + 1)`.
//! - `C(l2, l1, l3)[j, i, k] = (-1)^(l1 + l2 + l3) C(l1, l2, l3)[i, j, k]`.
//! - Parity and multiplicity never enter: one tensor serves every
//!   `(l1, p1) ⊗ (l2, p2) -> (l3, p1 p2)` path.

pub mod cache;
pub mod real;
pub mod su2;

pub use cache::{ClebschGordanCache, DegreeTriple};
pub use real::{change_of_basis, clebsch_gordan, clebsch_gordan_exact};
pub use su2::{su2_clebsch_gordan, su2_clebsch_gordan_exact, SqrtRational};

use o3tp_core::Irrep;

/// Coupling tensor for three irreps, zero when parity or degree forbids it.
///
/// Unlike [`clebsch_gordan`], which only sees degrees, this also applies the
/// parity half of the selection rule.
pub fn coupling(ir1: Irrep, ir2: Irrep, ir_out: Irrep) -> std::sync::Arc<ndarray::Array3<f64>> {
    if ir1.couples_to(ir2, ir_out) {
        ClebschGordanCache::global().get(ir1.l(), ir2.l(), ir_out.l())
    } else {
        std::sync::Arc::new(ndarray::Array3::zeros((ir1.dim(), ir2.dim(), ir_out.dim())))
    }
}
