//! # Equivariant Linear Map
//!
//! `out_i_out = Σ_{i_in : ir_in = ir_out} W_(i_in, i_out) x_i_in`, with one
//! `(mul_in, mul_out)` weight matrix per matching block pair. Expressed as a
//! tensor product with a constant scalar second input (`1x0e` holding `1`):
//! the coupling `(l, 0) -> l` is the identity up to the normalization that
//! [`FunctionalTensorProduct`] already applies, so all three normalization
//! knobs behave exactly as for a tensor product.

use ndarray::{Array1, ArrayD, ArrayView1};
use o3tp_core::{Irrep, Irreps, IrrepsArray, O3Error, ShapeError};

use crate::config::TensorProductConfig;
use crate::instruction::{ConnectionMode, InstructionSpec};
use crate::tensor_product::{Evaluation, FunctionalTensorProduct, Weights};

/// Equivariant linear map between two layouts.
#[derive(Debug)]
pub struct FunctionalLinear {
    engine: FunctionalTensorProduct,
}

impl FunctionalLinear {
    /// Connect every input block to every output block of the same irrep.
    ///
    /// Output blocks with no matching input stay zero.
    pub fn new(irreps_in: Irreps, irreps_out: Irreps, config: &TensorProductConfig) -> Result<Self, O3Error> {
        let mut instructions = Vec::new();
        for (i_in, b_in) in irreps_in.iter().enumerate() {
            for (i_out, b_out) in irreps_out.iter().enumerate() {
                if b_in.ir == b_out.ir {
                    instructions.push(InstructionSpec::new(i_in, 0, i_out, ConnectionMode::Uvw, true));
                }
            }
        }
        let config = TensorProductConfig {
            in2_var: None,
            ..config.clone()
        };
        let engine = FunctionalTensorProduct::new(
            irreps_in,
            Irreps::from(Irrep::scalar()),
            irreps_out,
            instructions,
            &config,
        )?;
        Ok(Self { engine })
    }

    /// Input layout.
    pub fn irreps_in(&self) -> &Irreps {
        self.engine.irreps_in1()
    }

    /// Output layout.
    pub fn irreps_out(&self) -> &Irreps {
        self.engine.irreps_out()
    }

    /// `(i_in, i_out)` of every weighted block pair, in weight order.
    pub fn paths(&self) -> Vec<(usize, usize)> {
        self.engine
            .instructions()
            .iter()
            .map(|ins| (ins.i_in1, ins.i_out))
            .collect()
    }

    /// `(mul_in, mul_out)` of every weight matrix, in order.
    pub fn weight_shapes(&self) -> Vec<Vec<usize>> {
        self.engine
            .weight_shapes()
            .into_iter()
            .map(|shape| vec![shape[0], shape[2]])
            .collect()
    }

    /// Total number of weights.
    pub fn weight_numel(&self) -> usize {
        self.engine.weight_numel()
    }

    /// Weight init std of every path.
    pub fn weight_stds(&self) -> Vec<f64> {
        self.engine.instructions().iter().map(|ins| ins.weight_std).collect()
    }

    /// Sample weights with each path's init std.
    pub fn init_weights(&self, key: u64) -> Vec<f64> {
        self.engine.init_weights(key)
    }

    /// Apply the map to a flat input.
    ///
    /// [`Weights::PerPath`] arrays have shape `(mul_in, mul_out)`.
    pub fn apply(&self, weights: Weights<'_>, x: ArrayView1<'_, f64>) -> Result<IrrepsArray, O3Error> {
        let one = Array1::from(vec![1.0]);
        match weights {
            Weights::PerPath(arrays) => {
                let flat = self.flatten(arrays)?;
                self.engine
                    .left_right(Weights::Flat(&flat), x, one.view(), Evaluation::Unfused)
            }
            other => self.engine.left_right(other, x, one.view(), Evaluation::Unfused),
        }
    }

    fn flatten(&self, arrays: &[ArrayD<f64>]) -> Result<Vec<f64>, ShapeError> {
        let shapes = self.weight_shapes();
        if arrays.len() != shapes.len() {
            return Err(ShapeError::WeightPaths {
                expected: shapes.len(),
                actual: arrays.len(),
            });
        }
        let mut flat = Vec::with_capacity(self.weight_numel());
        for (index, (w, shape)) in arrays.iter().zip(shapes).enumerate() {
            if w.shape() != shape.as_slice() {
                return Err(ShapeError::PathShape {
                    instruction: index,
                    expected: shape,
                    actual: w.shape().to_vec(),
                });
            }
            flat.extend(w.iter().copied());
        }
        Ok(flat)
    }
}
