//! # Keyed Random Sampling
//!
//! Random feature vectors with a prescribed irreps layout. A `u64` key seeds
//! a [`StdRng`], so equal keys always give equal samples.
//!
//! The variance contract matches [`IrrepNormalization`]:
//!
//! - `Component` (and `None`): every component is i.i.d. `N(0, 1)`.
//! - `Norm`: every irrep copy is divided by `sqrt(2l + 1)`, so its expected
//!   squared norm is 1.

use ndarray::{ArrayD, Axis, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::irreps::Irreps;
use crate::normalization::IrrepNormalization;

impl Irreps {
    /// Sample an array of shape `leading_shape + [self.dim()]` from `key`.
    pub fn randn(
        &self,
        key: u64,
        leading_shape: &[usize],
        normalization: IrrepNormalization,
    ) -> ArrayD<f64> {
        let mut rng = StdRng::seed_from_u64(key);
        self.randn_with(&mut rng, leading_shape, normalization)
    }

    /// Sample like [`randn`](Self::randn) from a caller-provided generator.
    pub fn randn_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        leading_shape: &[usize],
        normalization: IrrepNormalization,
    ) -> ArrayD<f64> {
        let mut shape = leading_shape.to_vec();
        shape.push(self.dim());
        let mut x = ArrayD::from_shape_simple_fn(IxDyn(&shape), || rng.sample(StandardNormal));

        if normalization == IrrepNormalization::Norm {
            let scales: Vec<f64> = self
                .iter()
                .flat_map(|b| {
                    let s = 1.0 / (b.ir.dim() as f64).sqrt();
                    std::iter::repeat(s).take(b.dim())
                })
                .collect();
            let last = Axis(shape.len() - 1);
            for mut lane in x.lanes_mut(last) {
                lane.iter_mut().zip(&scales).for_each(|(v, s)| *v *= s);
            }
        }
        x
    }
}
