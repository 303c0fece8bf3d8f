//! # Real-Basis Coupling Tensors
//!
//! Converts SU(2) coefficients from the complex spherical basis to the real
//! basis in which irreps are stored. For `l = 1` the real basis is ordered
//! `(y, z, x)`.
//!
//! With `Q(l)` the real-to-complex change of basis, the real tensor is
//!
//! ```text
//! R[j, l, m] = Σ_{i,k,n} Q1[i, j] · Q2[k, l] · conj(Q3[n, m]) · C[i, k, n]
//! ```
//!
//! The imaginary part of `R` vanishes identically; the real part is
//! rescaled to unit Frobenius norm.

use ndarray::{Array2, Array3};
use num_complex::Complex64;

use crate::su2::{su2_clebsch_gordan, su2_clebsch_gordan_exact};

/// Imaginary residue above which the basis change is reported as inexact.
const IMAGINARY_TOLERANCE: f64 = 1e-10;

/// The `(2l + 1) x (2l + 1)` change of basis from real to complex harmonics.
///
/// Rows index the complex `m`, columns the real component, both offset by `l`.
pub fn change_of_basis(l: u32) -> Array2<Complex64> {
    let n = 2 * l as usize + 1;
    let li = l as i64;
    let mut q = Array2::<Complex64>::zeros((n, n));
    let s = std::f64::consts::FRAC_1_SQRT_2;

    for m in -li..0 {
        let row = (li + m) as usize;
        q[[row, (li + m.abs()) as usize]] = Complex64::new(s, 0.0);
        q[[row, (li - m.abs()) as usize]] = Complex64::new(0.0, -s);
    }
    q[[l as usize, l as usize]] = Complex64::new(1.0, 0.0);
    for m in 1..=li {
        let row = (li + m) as usize;
        let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
        q[[row, (li + m) as usize]] = Complex64::new(sign * s, 0.0);
        q[[row, (li - m) as usize]] = Complex64::new(0.0, sign * s);
    }

    // Global phase (-i)^l makes the coupling tensors real.
    let phase = match l % 4 {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, -1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, 1.0),
    };
    q.mapv_inplace(|v| v * phase);
    q
}

/// Real coupling tensor for `(l1, l2, l3)` from `f64` Racah coefficients.
///
/// Shape `(2 l1 + 1, 2 l2 + 1, 2 l3 + 1)`, unit Frobenius norm, or all zeros
/// when `l3` is outside `|l1 - l2| ..= l1 + l2`.
pub fn clebsch_gordan(l1: u32, l2: u32, l3: u32) -> Array3<f64> {
    real_coupling(l1, l2, l3, su2_clebsch_gordan)
}

/// Like [`clebsch_gordan`] but built from the exact rational coefficients.
pub fn clebsch_gordan_exact(l1: u32, l2: u32, l3: u32) -> Array3<f64> {
    real_coupling(l1, l2, l3, |j1, m1, j2, m2, j3, m3| {
        su2_clebsch_gordan_exact(j1, m1, j2, m2, j3, m3).to_f64()
    })
}

fn real_coupling(
    l1: u32,
    l2: u32,
    l3: u32,
    su2: impl Fn(u32, i32, u32, i32, u32, i32) -> f64,
) -> Array3<f64> {
    let (n1, n2, n3) = (2 * l1 as usize + 1, 2 * l2 as usize + 1, 2 * l3 as usize + 1);
    if !(l1.abs_diff(l2) <= l3 && l3 <= l1 + l2) {
        return Array3::zeros((n1, n2, n3));
    }

    let complex = Array3::from_shape_fn((n1, n2, n3), |(i, k, n)| {
        let m1 = i as i32 - l1 as i32;
        let m2 = k as i32 - l2 as i32;
        let m3 = n as i32 - l3 as i32;
        Complex64::new(su2(l1, m1, l2, m2, l3, m3), 0.0)
    });
    let (q1, q2, q3) = (change_of_basis(l1), change_of_basis(l2), change_of_basis(l3));

    // Contract one leg at a time: O(n^4) instead of O(n^6).
    let mut t1 = Array3::<Complex64>::zeros((n1, n2, n3));
    for ((j, k, n), v) in t1.indexed_iter_mut() {
        *v = (0..n1).map(|i| q1[[i, j]] * complex[[i, k, n]]).sum();
    }
    let mut t2 = Array3::<Complex64>::zeros((n1, n2, n3));
    for ((j, l, n), v) in t2.indexed_iter_mut() {
        *v = (0..n2).map(|k| q2[[k, l]] * t1[[j, k, n]]).sum();
    }
    let mut real = Array3::<f64>::zeros((n1, n2, n3));
    let mut residue: f64 = 0.0;
    for ((j, l, m), v) in real.indexed_iter_mut() {
        let value: Complex64 = (0..n3).map(|n| q3[[n, m]].conj() * t2[[j, l, n]]).sum();
        residue = residue.max(value.im.abs());
        *v = value.re;
    }
    if residue > IMAGINARY_TOLERANCE {
        tracing::warn!(l1, l2, l3, residue, "real-basis coupling tensor has an imaginary residue");
    }

    let norm = real.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        real.mapv_inplace(|v| v / norm);
    }
    real
}
