//! # Instruction Builders
//!
//! Free functions that derive a standard instruction list from irreps and
//! return a ready [`FunctionalTensorProduct`]:
//!
//! - [`fully_connected`]: every legal `(i1, i2, i_out)` triple, `uvw`.
//! - [`full_tensor_product`]: every product irrep as its own output block,
//!   `uvuv`, weight-free, output sorted.
//! - [`elementwise_tensor_product`]: copy `u` of input 1 with copy `u` of
//!   input 2, `uuu`, weight-free.
//! - [`tensor_square`]: `x ⊗ x` with `uvw` paths for `i1 <= i2`.

use o3tp_core::{ConfigError, Irrep, Irreps, MulIrrep, O3Error};

use crate::config::TensorProductConfig;
use crate::instruction::{ConnectionMode, InstructionSpec};
use crate::tensor_product::FunctionalTensorProduct;

/// Weighted `uvw` paths for every triple allowed by the selection rule.
pub fn fully_connected(
    irreps_in1: Irreps,
    irreps_in2: Irreps,
    irreps_out: Irreps,
    config: &TensorProductConfig,
) -> Result<FunctionalTensorProduct, O3Error> {
    let mut instructions = Vec::new();
    for (i1, b1) in irreps_in1.iter().enumerate() {
        for (i2, b2) in irreps_in2.iter().enumerate() {
            for (i_out, bo) in irreps_out.iter().enumerate() {
                if b1.ir.couples_to(b2.ir, bo.ir) {
                    instructions.push(InstructionSpec::new(i1, i2, i_out, ConnectionMode::Uvw, true));
                }
            }
        }
    }
    FunctionalTensorProduct::new(irreps_in1, irreps_in2, irreps_out, instructions, config)
}

/// Every `ir_out ∈ ir1 ⊗ ir2` as a `mul1·mul2 x ir_out` output block.
///
/// Paths are `uvuv` and weight-free. The output irreps are sorted and the
/// instructions follow their blocks. With `filter_ir_out`, only the listed
/// output irreps are produced.
pub fn full_tensor_product(
    irreps_in1: Irreps,
    irreps_in2: Irreps,
    filter_ir_out: Option<&[Irrep]>,
    config: &TensorProductConfig,
) -> Result<FunctionalTensorProduct, O3Error> {
    let mut out = Vec::new();
    let mut instructions = Vec::new();
    for (i1, b1) in irreps_in1.iter().enumerate() {
        for (i2, b2) in irreps_in2.iter().enumerate() {
            for ir_out in b1.ir * b2.ir {
                if filter_ir_out.is_some_and(|keep| !keep.contains(&ir_out)) {
                    continue;
                }
                instructions.push(InstructionSpec::new(i1, i2, out.len(), ConnectionMode::Uvuv, false));
                out.push(MulIrrep::new(b1.mul * b2.mul, ir_out));
            }
        }
    }

    let sorted = Irreps::new(out).sort();
    for ins in &mut instructions {
        ins.i_out = sorted.p[ins.i_out];
    }
    FunctionalTensorProduct::new(irreps_in1, irreps_in2, sorted.irreps, instructions, config)
}

/// Copy-by-copy product of two inputs with the same number of irreps.
///
/// Both inputs are simplified, then blocks are split until their
/// multiplicities line up one-to-one. The engine's input irreps are the
/// split layouts, which have the same flat vectors as the originals.
pub fn elementwise_tensor_product(
    irreps_in1: Irreps,
    irreps_in2: Irreps,
    filter_ir_out: Option<&[Irrep]>,
    config: &TensorProductConfig,
) -> Result<FunctionalTensorProduct, O3Error> {
    if irreps_in1.num_irreps() != irreps_in2.num_irreps() {
        return Err(ConfigError::ElementwiseCount {
            left: irreps_in1.num_irreps(),
            right: irreps_in2.num_irreps(),
        }
        .into());
    }
    let (in1, in2) = align_multiplicities(&irreps_in1.simplify(), &irreps_in2.simplify());

    let mut out = Vec::new();
    let mut instructions = Vec::new();
    for (i, (b1, b2)) in in1.iter().zip(in2.iter()).enumerate() {
        for ir_out in b1.ir * b2.ir {
            if filter_ir_out.is_some_and(|keep| !keep.contains(&ir_out)) {
                continue;
            }
            instructions.push(InstructionSpec::new(i, i, out.len(), ConnectionMode::Uuu, false));
            out.push(MulIrrep::new(b1.mul, ir_out));
        }
    }
    FunctionalTensorProduct::new(in1, in2, Irreps::new(out), instructions, config)
}

/// Split blocks of two equal-`num_irreps` layouts so multiplicities pair up.
fn align_multiplicities(irreps_in1: &Irreps, irreps_in2: &Irreps) -> (Irreps, Irreps) {
    let mut a: Vec<MulIrrep> = irreps_in1.iter().copied().collect();
    let mut b: Vec<MulIrrep> = irreps_in2.iter().copied().collect();
    let mut i = 0;
    while i < a.len() && i < b.len() {
        let (m1, m2) = (a[i].mul, b[i].mul);
        if m1 < m2 {
            b[i].mul = m1;
            b.insert(i + 1, MulIrrep::new(m2 - m1, b[i].ir));
        } else if m2 < m1 {
            a[i].mul = m2;
            a.insert(i + 1, MulIrrep::new(m1 - m2, a[i].ir));
        }
        i += 1;
    }
    (Irreps::new(a), Irreps::new(b))
}

/// `x ⊗ x` into `irreps_out` with weighted `uvw` paths for `i1 <= i2`.
///
/// On a diagonal path (`i1 == i2`) the pairs `(u, v)` and `(v, u)` are
/// correlated and the pairs `(u, u)` are not products of independent
/// copies. Their variance is compensated with a path weight:
///
/// - `lout = 0`: `m / (m + 1 + dim(l))`
/// - even `lout > 0`: `m / (m + 1)`
/// - odd `lout`: `m / (m - 1)`, and the path is skipped when `m <= 1`
///   because the antisymmetric coupling of a single copy with itself
///   vanishes identically.
pub fn tensor_square(
    irreps_in: Irreps,
    irreps_out: Irreps,
    config: &TensorProductConfig,
) -> Result<FunctionalTensorProduct, O3Error> {
    let mut instructions = Vec::new();
    for (i1, b1) in irreps_in.iter().enumerate() {
        for (i2, b2) in irreps_in.iter().enumerate().skip(i1) {
            for (i_out, bo) in irreps_out.iter().enumerate() {
                if !b1.ir.couples_to(b2.ir, bo.ir) {
                    continue;
                }
                let spec = InstructionSpec::new(i1, i2, i_out, ConnectionMode::Uvw, true);
                if i1 < i2 {
                    instructions.push(spec);
                    continue;
                }
                let m = b1.mul as f64;
                let lout = bo.ir.l();
                let path_weight = if lout == 0 {
                    m / (m + 1.0 + b1.ir.dim() as f64)
                } else if lout % 2 == 0 {
                    m / (m + 1.0)
                } else if b1.mul > 1 {
                    m / (m - 1.0)
                } else {
                    continue;
                };
                instructions.push(spec.with_path_weight(path_weight));
            }
        }
    }
    FunctionalTensorProduct::new(irreps_in.clone(), irreps_in, irreps_out, instructions, config)
}
