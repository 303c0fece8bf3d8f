//! # FunctionalTensorProduct
//!
//! The instruction-driven bilinear map `(weights, x1, x2) -> out`. An engine
//! is built once from three layouts and an instruction list, validated and
//! normalized at construction, and is immutable afterwards. Evaluation is a
//! pure function of its arguments.
//!
//! ## Evaluation strategies
//!
//! - [`Evaluation::Unfused`] walks the instructions and contracts each
//!   path's input blocks against its coupling tensor with the
//!   mode-specific pattern, scatter-adding into the output block.
//! - [`Evaluation::Fused`] contracts a sparse table of every path at once
//!   (see `fused.rs`). The table is built on first use and cached.
//!
//! Both give the same result up to floating-point reassociation.
//!
//! ## Weights
//!
//! Weighted paths read their weights, in instruction order, from either a
//! flat buffer ([`Weights::Flat`]) or one array per weighted path
//! ([`Weights::PerPath`]). Weight-free paths never read weights.

use std::fmt;
use std::sync::OnceLock;

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, Axis};
use o3tp_cg::coupling;
use o3tp_core::{IrrepsArray, Irreps, O3Error, ShapeError};

use crate::config::TensorProductConfig;
use crate::fused::FusedTable;
use crate::instruction::{ConnectionMode, Instruction, InstructionSpec};
use crate::normalization::normalize_paths;

/// Which contraction strategy [`FunctionalTensorProduct::left_right`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Evaluation {
    /// One contraction per instruction.
    #[default]
    Unfused,
    /// One pass over a precomputed sparse table.
    Fused,
}

/// Weights for the weighted paths of an engine.
#[derive(Debug, Clone, Copy, Default)]
pub enum Weights<'a> {
    /// No weights; valid only when no path is weighted.
    #[default]
    None,
    /// Concatenation of every weighted path's weights, row-major per path.
    Flat(&'a [f64]),
    /// One array of shape `path_shape` per weighted path.
    PerPath(&'a [ArrayD<f64>]),
}

/// Validated, normalized tensor-product engine.
#[derive(Debug)]
pub struct FunctionalTensorProduct {
    irreps_in1: Irreps,
    irreps_in2: Irreps,
    irreps_out: Irreps,
    instructions: Vec<Instruction>,
    config: TensorProductConfig,
    fused: OnceLock<FusedTable>,
}

impl FunctionalTensorProduct {
    /// Validate and normalize `instructions` against the three layouts.
    ///
    /// Fails on a bad index, a selection-rule violation, a multiplicity that
    /// does not fit the connection mode, or a bad variance list.
    pub fn new<I>(
        irreps_in1: Irreps,
        irreps_in2: Irreps,
        irreps_out: Irreps,
        instructions: I,
        config: &TensorProductConfig,
    ) -> Result<Self, O3Error>
    where
        I: IntoIterator,
        I::Item: Into<InstructionSpec>,
    {
        let mut validated = instructions
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                Instruction::validate(index, &spec.into(), &irreps_in1, &irreps_in2, &irreps_out)
            })
            .collect::<Result<Vec<_>, _>>()?;
        normalize_paths(&mut validated, &irreps_in1, &irreps_in2, &irreps_out, config)?;

        let engine = Self {
            irreps_in1,
            irreps_in2,
            irreps_out,
            instructions: validated,
            config: config.clone(),
            fused: OnceLock::new(),
        };
        tracing::debug!(
            irreps_in1 = %engine.irreps_in1,
            irreps_in2 = %engine.irreps_in2,
            irreps_out = %engine.irreps_out,
            paths = engine.instructions.len(),
            weight_numel = engine.weight_numel(),
            "built tensor product"
        );
        Ok(engine)
    }

    /// Layout of the first input.
    pub fn irreps_in1(&self) -> &Irreps {
        &self.irreps_in1
    }

    /// Layout of the second input.
    pub fn irreps_in2(&self) -> &Irreps {
        &self.irreps_in2
    }

    /// Layout of the output.
    pub fn irreps_out(&self) -> &Irreps {
        &self.irreps_out
    }

    /// The normalized instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The configuration the engine was normalized with.
    pub fn config(&self) -> &TensorProductConfig {
        &self.config
    }

    /// Total number of weights, the length of a [`Weights::Flat`] buffer.
    pub fn weight_numel(&self) -> usize {
        self.instructions.iter().map(Instruction::weight_numel).sum()
    }

    /// `path_shape` of every weighted path, in order.
    pub fn weight_shapes(&self) -> Vec<Vec<usize>> {
        self.instructions
            .iter()
            .filter(|ins| ins.has_weight)
            .map(|ins| ins.path_shape.clone())
            .collect()
    }

    /// Sample weights with each path's init std, keyed like [`Irreps::randn`].
    pub fn init_weights(&self, key: u64) -> Vec<f64> {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(key);
        self.instructions
            .iter()
            .filter(|ins| ins.has_weight)
            .flat_map(|ins| {
                let std = ins.weight_std;
                (0..ins.weight_numel())
                    .map(|_| std * rng.sample::<f64, _>(rand_distr::StandardNormal))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Evaluate the bilinear map on flat inputs.
    ///
    /// Shape errors are raised before any contraction.
    pub fn left_right(
        &self,
        weights: Weights<'_>,
        x1: ArrayView1<'_, f64>,
        x2: ArrayView1<'_, f64>,
        evaluation: Evaluation,
    ) -> Result<IrrepsArray, O3Error> {
        let flat_weights = self.resolve_weights(weights)?;
        check_dim("x1", &self.irreps_in1, x1.len())?;
        check_dim("x2", &self.irreps_in2, x2.len())?;
        let x1: Vec<f64> = x1.iter().copied().collect();
        let x2: Vec<f64> = x2.iter().copied().collect();

        let out = match evaluation {
            Evaluation::Unfused => self.unfused(&flat_weights, &x1, &x2)?,
            Evaluation::Fused => {
                let mut out = vec![0.0; self.irreps_out.dim()];
                self.fused_table().contract(&flat_weights, &x1, &x2, &mut out);
                out
            }
        };
        Ok(IrrepsArray::new(self.irreps_out.clone(), Array1::from(out))?)
    }

    /// Evaluate on structured inputs whose layouts must match the engine's.
    ///
    /// Layouts that only differ by merging adjacent equal blocks or dropping
    /// empty ones are accepted, since their flat vectors coincide.
    pub fn left_right_arrays(
        &self,
        weights: Weights<'_>,
        x1: &IrrepsArray,
        x2: &IrrepsArray,
        evaluation: Evaluation,
    ) -> Result<IrrepsArray, O3Error> {
        check_irreps("x1", &self.irreps_in1, x1.irreps())?;
        check_irreps("x2", &self.irreps_in2, x2.irreps())?;
        self.left_right(weights, x1.array().view(), x2.array().view(), evaluation)
    }

    /// Map [`left_right`](Self::left_right) over the rows of two batches.
    ///
    /// Every row shares the same weights. Returns `(batch, irreps_out.dim)`.
    pub fn left_right_batch(
        &self,
        weights: Weights<'_>,
        x1: ArrayView2<'_, f64>,
        x2: ArrayView2<'_, f64>,
        evaluation: Evaluation,
    ) -> Result<Array2<f64>, O3Error> {
        if x1.nrows() != x2.nrows() {
            return Err(ShapeError::BatchMismatch {
                left: x1.nrows(),
                right: x2.nrows(),
            }
            .into());
        }
        let mut out = Array2::zeros((x1.nrows(), self.irreps_out.dim()));
        for ((a, b), mut row) in x1
            .axis_iter(Axis(0))
            .zip(x2.axis_iter(Axis(0)))
            .zip(out.axis_iter_mut(Axis(0)))
        {
            let y = self.left_right(weights, a, b, evaluation)?;
            row.assign(y.array());
        }
        Ok(out)
    }

    fn fused_table(&self) -> &FusedTable {
        self.fused.get_or_init(|| {
            FusedTable::build(
                &self.irreps_in1,
                &self.irreps_in2,
                &self.irreps_out,
                &self.instructions,
            )
        })
    }

    /// Check the weights against the weighted paths and flatten them.
    fn resolve_weights(&self, weights: Weights<'_>) -> Result<Vec<f64>, ShapeError> {
        let expected = self.weight_numel();
        match weights {
            Weights::None if expected == 0 => Ok(Vec::new()),
            Weights::None => Err(ShapeError::WeightCount { expected, actual: 0 }),
            Weights::Flat(flat) if flat.len() == expected => Ok(flat.to_vec()),
            Weights::Flat(flat) => Err(ShapeError::WeightCount {
                expected,
                actual: flat.len(),
            }),
            Weights::PerPath(arrays) => {
                let weighted: Vec<(usize, &Instruction)> = self
                    .instructions
                    .iter()
                    .enumerate()
                    .filter(|(_, ins)| ins.has_weight)
                    .collect();
                if arrays.len() != weighted.len() {
                    return Err(ShapeError::WeightPaths {
                        expected: weighted.len(),
                        actual: arrays.len(),
                    });
                }
                let mut flat = Vec::with_capacity(expected);
                for ((index, ins), w) in weighted.into_iter().zip(arrays) {
                    if w.shape() != ins.path_shape.as_slice() {
                        return Err(ShapeError::PathShape {
                            instruction: index,
                            expected: ins.path_shape.clone(),
                            actual: w.shape().to_vec(),
                        });
                    }
                    flat.extend(w.iter().copied());
                }
                Ok(flat)
            }
        }
    }

    /// One contraction per instruction, accumulated into per-block outputs.
    fn unfused(&self, weights: &[f64], x1: &[f64], x2: &[f64]) -> Result<Vec<f64>, ShapeError> {
        let blocks1 = self.irreps_in1.as_list(x1)?;
        let blocks2 = self.irreps_in2.as_list(x2)?;
        let mut out: Vec<Array2<f64>> = self
            .irreps_out
            .iter()
            .map(|b| Array2::zeros((b.mul, b.ir.dim())))
            .collect();

        let mut offset = 0;
        for ins in &self.instructions {
            let (b1, b2, bo) = (
                self.irreps_in1[ins.i_in1],
                self.irreps_in2[ins.i_in2],
                self.irreps_out[ins.i_out],
            );
            let numel = ins.weight_numel();
            let w = ins.has_weight.then(|| &weights[offset..offset + numel]);
            offset += numel;
            if b1.mul == 0 || b2.mul == 0 || bo.mul == 0 {
                continue;
            }

            let cg = coupling(b1.ir, b2.ir, bo.ir);
            let x = &blocks1[ins.i_in1];
            let y = &blocks2[ins.i_in2];
            let weight = |idx: usize| w.map_or(1.0, |w| w[idx]);
            let target = &mut out[ins.i_out];
            let (m2, mo) = (b2.mul, bo.mul);

            match ins.connection_mode {
                ConnectionMode::Uvw => {
                    for u in 0..b1.mul {
                        for v in 0..m2 {
                            let z = couple(&cg, x.row(u), y.row(v));
                            for wo in 0..mo {
                                let s = ins.path_weight * weight((u * m2 + v) * mo + wo);
                                target.row_mut(wo).scaled_add(s, &z);
                            }
                        }
                    }
                }
                ConnectionMode::Uvu | ConnectionMode::Uvv | ConnectionMode::Uvuv => {
                    for u in 0..b1.mul {
                        for v in 0..m2 {
                            let z = couple(&cg, x.row(u), y.row(v));
                            let row = match ins.connection_mode {
                                ConnectionMode::Uvu => u,
                                ConnectionMode::Uvv => v,
                                _ => u * m2 + v,
                            };
                            let s = ins.path_weight * weight(u * m2 + v);
                            target.row_mut(row).scaled_add(s, &z);
                        }
                    }
                }
                ConnectionMode::Uuu => {
                    for u in 0..b1.mul {
                        let z = couple(&cg, x.row(u), y.row(u));
                        target.row_mut(u).scaled_add(ins.path_weight * weight(u), &z);
                    }
                }
            }
        }

        Ok(self.irreps_out.from_list(&out)?.to_vec())
    }
}

/// `z_k = Σ_ij C_ijk a_i b_j`.
fn couple(cg: &ndarray::Array3<f64>, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    let (d1, d2, d_out) = cg.dim();
    let mut z = Array1::zeros(d_out);
    for i in 0..d1 {
        if a[i] == 0.0 {
            continue;
        }
        for j in 0..d2 {
            let ab = a[i] * b[j];
            z.scaled_add(ab, &cg.slice(ndarray::s![i, j, ..]));
        }
    }
    z
}

fn check_dim(operand: &'static str, irreps: &Irreps, actual: usize) -> Result<(), ShapeError> {
    if actual != irreps.dim() {
        return Err(ShapeError::InputDimension {
            operand,
            irreps: irreps.to_string(),
            expected: irreps.dim(),
            actual,
        });
    }
    Ok(())
}

fn check_irreps(operand: &'static str, expected: &Irreps, actual: &Irreps) -> Result<(), ShapeError> {
    if expected != actual && expected.simplify() != actual.simplify() {
        return Err(ShapeError::IrrepsMismatch {
            operand,
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for FunctionalTensorProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FunctionalTensorProduct({} x {} -> {} | {} paths | {} weights)",
            self.irreps_in1.simplify(),
            self.irreps_in2.simplify(),
            self.irreps_out.simplify(),
            self.instructions.len(),
            self.weight_numel(),
        )
    }
}
