//! Shared helpers for the integration tests: random rotations, real Wigner-D
//! matrices in the `(y, z, x)` basis, and block-diagonal group actions on
//! flat irreps vectors.

#![allow(dead_code)]

use ndarray::{Array1, Array2, Ix1};
use o3tp_cg::clebsch_gordan;
use o3tp_core::{IrrepNormalization, Irreps, Parity};
use rand::{Rng, SeedableRng};

/// Uniform random rotation from a normalized Gaussian quaternion.
pub fn random_rotation(seed: u64) -> Array2<f64> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut q = [0.0f64; 4];
    for v in &mut q {
        *v = rng.sample(rand_distr::StandardNormal);
    }
    let n = q.iter().map(|v| v * v).sum::<f64>().sqrt();
    let [w, x, y, z] = q.map(|v| v / n);
    ndarray::array![
        [1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z), 2.0 * (x * z + w * y)],
        [2.0 * (x * y + w * z), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x)],
        [2.0 * (x * z - w * y), 2.0 * (y * z + w * x), 1.0 - 2.0 * (x * x + y * y)],
    ]
}

/// Real Wigner-D matrix of degree `l` for the Cartesian rotation `r`.
///
/// `l = 1` is `r` permuted to `(y, z, x)`. Higher degrees are projected
/// out of `D(l - 1) ⊗ D(1)` with the `(l - 1, 1) -> l` coupling tensor.
pub fn wigner_d(l: u32, r: &Array2<f64>) -> Array2<f64> {
    match l {
        0 => Array2::ones((1, 1)),
        1 => {
            let perm = [1, 2, 0];
            Array2::from_shape_fn((3, 3), |(a, b)| r[[perm[a], perm[b]]])
        }
        _ => {
            let prev = wigner_d(l - 1, r);
            let one = wigner_d(1, r);
            let c = clebsch_gordan(l - 1, 1, l);
            let (da, db, dl) = c.dim();
            let scale = (2 * l + 1) as f64;
            Array2::from_shape_fn((dl, dl), |(m, mp)| {
                let mut acc = 0.0;
                for a in 0..da {
                    for b in 0..db {
                        let cm = c[[a, b, m]];
                        if cm == 0.0 {
                            continue;
                        }
                        for ap in 0..da {
                            for bp in 0..db {
                                acc += cm * prev[[a, ap]] * one[[b, bp]] * c[[ap, bp, mp]];
                            }
                        }
                    }
                }
                scale * acc
            })
        }
    }
}

/// Block-diagonal action of `(r, inversion)` on a flat vector of `irreps`.
pub fn irreps_action(irreps: &Irreps, r: &Array2<f64>, inversion: bool) -> Array2<f64> {
    let n = irreps.dim();
    let mut out = Array2::zeros((n, n));
    let mut offset = 0;
    for block in irreps {
        let d = wigner_d(block.ir.l(), r);
        let sign = if inversion && block.ir.p() == Parity::Odd { -1.0 } else { 1.0 };
        let dim = block.ir.dim();
        for _ in 0..block.mul {
            for i in 0..dim {
                for j in 0..dim {
                    out[[offset + i, offset + j]] = sign * d[[i, j]];
                }
            }
            offset += dim;
        }
    }
    out
}

/// Apply `(r, inversion)` to a flat vector of `irreps`.
pub fn act(irreps: &Irreps, r: &Array2<f64>, inversion: bool, x: &Array1<f64>) -> Array1<f64> {
    irreps_action(irreps, r, inversion).dot(x)
}

/// One flat random sample of `irreps`.
pub fn sample(irreps: &Irreps, key: u64, normalization: IrrepNormalization) -> Array1<f64> {
    irreps
        .randn(key, &[], normalization)
        .into_dimensionality::<Ix1>()
        .expect("randn with empty leading shape is one-dimensional")
}

pub fn irreps(s: &str) -> Irreps {
    s.parse().expect("valid irreps")
}

pub fn assert_close(a: &Array1<f64>, b: &Array1<f64>, tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!((x - y).abs() <= tol, "index {i}: {x} vs {y}");
    }
}
