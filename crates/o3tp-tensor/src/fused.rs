//! # Fused Evaluation
//!
//! All paths of an engine folded into one sparse coefficient table over the
//! flat spaces:
//!
//! ```text
//! out[k] += w[slot] · value · x1[i] · x2[j]      for every (slot, i, j, k, value)
//! ```
//!
//! `value` is `path_weight · C[a, b, c]` for the path's coupling tensor.
//! Weighted paths index the caller's flat weights; weight-free paths share a
//! constant slot 0 that always holds `1`, present only when such a path
//! exists. The table is assembled once per engine and only read afterwards.

use o3tp_cg::coupling;
use o3tp_core::Irreps;

use crate::instruction::Instruction;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    slot: usize,
    i: usize,
    j: usize,
    k: usize,
    value: f64,
}

/// Sparse `(slot, i, j, k) -> value` table of every path.
#[derive(Debug, Clone)]
pub(crate) struct FusedTable {
    constant_slot: bool,
    entries: Vec<Entry>,
}

impl FusedTable {
    pub(crate) fn build(
        irreps_in1: &Irreps,
        irreps_in2: &Irreps,
        irreps_out: &Irreps,
        instructions: &[Instruction],
    ) -> Self {
        let constant_slot = instructions.iter().any(|ins| !ins.has_weight);
        let mut entries = Vec::new();
        let mut weight_offset = usize::from(constant_slot);

        for ins in instructions {
            let (b1, b2, bo) = (irreps_in1[ins.i_in1], irreps_in2[ins.i_in2], irreps_out[ins.i_out]);
            let (d1, d2, d_out) = (b1.ir.dim(), b2.ir.dim(), bo.ir.dim());
            let (off1, off2, off_out) = (
                irreps_in1.offset(ins.i_in1),
                irreps_in2.offset(ins.i_in2),
                irreps_out.offset(ins.i_out),
            );

            let cg = coupling(b1.ir, b2.ir, bo.ir);
            let nonzero: Vec<((usize, usize, usize), f64)> = cg
                .indexed_iter()
                .filter(|(_, &v)| v != 0.0)
                .map(|(idx, &v)| (idx, v * ins.path_weight))
                .collect();

            let base = weight_offset;
            ins.connection_mode
                .for_each_pair(b1.mul, b2.mul, bo.mul, |u, v, w, widx| {
                    let slot = if ins.has_weight { base + widx } else { 0 };
                    for &((a, b, c), value) in &nonzero {
                        entries.push(Entry {
                            slot,
                            i: off1 + u * d1 + a,
                            j: off2 + v * d2 + b,
                            k: off_out + w * d_out + c,
                            value,
                        });
                    }
                });
            weight_offset += ins.weight_numel();
        }

        tracing::debug!(
            entries = entries.len(),
            paths = instructions.len(),
            "assembled fused tensor-product table"
        );
        Self {
            constant_slot,
            entries,
        }
    }

    /// Number of stored coefficients.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Contract the table against flat, already validated operands.
    pub(crate) fn contract(&self, weights: &[f64], x1: &[f64], x2: &[f64], out: &mut [f64]) {
        let w: Vec<f64> = self
            .constant_slot
            .then_some(1.0)
            .into_iter()
            .chain(weights.iter().copied())
            .collect();
        for e in &self.entries {
            out[e.k] += w[e.slot] * e.value * x1[e.i] * x2[e.j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ConnectionMode, InstructionSpec};

    fn irreps(s: &str) -> Irreps {
        s.parse().unwrap()
    }

    fn instruction(spec: InstructionSpec, in1: &Irreps, in2: &Irreps, out: &Irreps, pw: f64) -> Instruction {
        let mut ins = Instruction::validate(0, &spec, in1, in2, out).unwrap();
        ins.path_weight = pw;
        ins
    }

    #[test]
    fn scalar_product_table() {
        let (in1, in2, out) = (irreps("2x0e"), irreps("2x0e"), irreps("2x0e"));
        let ins = instruction(
            InstructionSpec::new(0, 0, 0, ConnectionMode::Uuu, false),
            &in1,
            &in2,
            &out,
            1.0,
        );
        let table = FusedTable::build(&in1, &in2, &out, &[ins]);
        assert_eq!(table.len(), 2);
        let mut y = vec![0.0; 2];
        table.contract(&[], &[2.0, 3.0], &[5.0, 7.0], &mut y);
        assert_eq!(y, vec![10.0, 21.0]);
    }

    #[test]
    fn weighted_slots_follow_constant_slot() {
        let (in1, in2, out) = (irreps("1x0e"), irreps("1x0e"), irreps("1x0e + 1x0e"));
        let fixed = instruction(
            InstructionSpec::new(0, 0, 0, ConnectionMode::Uuu, false),
            &in1,
            &in2,
            &out,
            1.0,
        );
        let weighted = instruction(
            InstructionSpec::new(0, 0, 1, ConnectionMode::Uvw, true),
            &in1,
            &in2,
            &out,
            0.5,
        );
        let table = FusedTable::build(&in1, &in2, &out, &[fixed, weighted]);
        let mut y = vec![0.0; 2];
        table.contract(&[4.0], &[1.0], &[3.0], &mut y);
        assert_eq!(y, vec![3.0, 6.0]);
    }

    #[test]
    fn zero_multiplicity_adds_nothing() {
        let (in1, in2, out) = (irreps("0x1o"), irreps("1x1o"), irreps("0x0e"));
        let ins = instruction(
            InstructionSpec::new(0, 0, 0, ConnectionMode::Uvw, true),
            &in1,
            &in2,
            &out,
            1.0,
        );
        let table = FusedTable::build(&in1, &in2, &out, &[ins]);
        assert_eq!(table.len(), 0);
    }
}
