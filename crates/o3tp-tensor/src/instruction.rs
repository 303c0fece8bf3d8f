//! # Instructions
//!
//! An instruction couples block `i_in1` of the first input with block
//! `i_in2` of the second into block `i_out` of the output. The
//! [`ConnectionMode`] says how multiplicity copies are paired:
//!
//! | mode   | pairs                 | weight shape          | output copy  |
//! |--------|-----------------------|-----------------------|--------------|
//! | `uvw`  | every `(u, v)`        | `(mul1, mul2, mul_out)` | every `w`  |
//! | `uvu`  | every `(u, v)`        | `(mul1, mul2)`        | `u`          |
//! | `uvv`  | every `(u, v)`        | `(mul1, mul2)`        | `v`          |
//! | `uvuv` | every `(u, v)`        | `(mul1, mul2)`        | `u·mul2 + v` |
//! | `uuu`  | `(u, u)`              | `(mul,)`              | `u`          |
//!
//! [`InstructionSpec`] is what callers write; [`Instruction`] is the
//! validated, normalization-annotated form an engine owns.

use std::fmt;
use std::str::FromStr;

use o3tp_core::{InstructionError, Irreps};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConnectionMode
// ---------------------------------------------------------------------------

/// How the multiplicity copies of a path are paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Fully connected: `out_w = Σ_uv W_uvw (x_u ⊗ y_v)`.
    Uvw,
    /// `out_u = Σ_v W_uv (x_u ⊗ y_v)`.
    Uvu,
    /// `out_v = Σ_u W_uv (x_u ⊗ y_v)`.
    Uvv,
    /// Every pair gets its own output copy.
    Uvuv,
    /// Elementwise: `out_u = W_u (x_u ⊗ y_u)`.
    Uuu,
}

impl ConnectionMode {
    /// Every mode, in declaration order.
    pub const ALL: [ConnectionMode; 5] = [
        ConnectionMode::Uvw,
        ConnectionMode::Uvu,
        ConnectionMode::Uvv,
        ConnectionMode::Uvuv,
        ConnectionMode::Uuu,
    ];

    /// Lowercase mode name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionMode::Uvw => "uvw",
            ConnectionMode::Uvu => "uvu",
            ConnectionMode::Uvv => "uvv",
            ConnectionMode::Uvuv => "uvuv",
            ConnectionMode::Uuu => "uuu",
        }
    }

    /// The multiplicity relation the mode requires, if violated.
    pub fn check_multiplicities(self, mul1: usize, mul2: usize, mul_out: usize) -> Result<(), &'static str> {
        let (ok, requirement) = match self {
            ConnectionMode::Uvw => (true, ""),
            ConnectionMode::Uvu => (mul_out == mul1, "mul_out == mul_in1"),
            ConnectionMode::Uvv => (mul_out == mul2, "mul_out == mul_in2"),
            ConnectionMode::Uvuv => (mul_out == mul1 * mul2, "mul_out == mul_in1 * mul_in2"),
            ConnectionMode::Uuu => (
                mul1 == mul2 && mul2 == mul_out,
                "mul_in1 == mul_in2 == mul_out",
            ),
        };
        if ok {
            Ok(())
        } else {
            Err(requirement)
        }
    }

    /// Shape of the path's weight (or of its implicit all-ones weight).
    pub fn path_shape(self, mul1: usize, mul2: usize, mul_out: usize) -> Vec<usize> {
        match self {
            ConnectionMode::Uvw => vec![mul1, mul2, mul_out],
            ConnectionMode::Uvu | ConnectionMode::Uvv | ConnectionMode::Uvuv => vec![mul1, mul2],
            ConnectionMode::Uuu => vec![mul1],
        }
    }

    /// Number of input pairs summed into each output component.
    pub fn num_elements(self, mul1: usize, mul2: usize) -> usize {
        match self {
            ConnectionMode::Uvw => mul1 * mul2,
            ConnectionMode::Uvu => mul2,
            ConnectionMode::Uvv => mul1,
            ConnectionMode::Uvuv | ConnectionMode::Uuu => 1,
        }
    }

    /// Visit every `(u, v, output copy, weight index)` the mode couples.
    ///
    /// The weight index is the row-major position in [`path_shape`](Self::path_shape).
    pub fn for_each_pair(self, mul1: usize, mul2: usize, mul_out: usize, mut f: impl FnMut(usize, usize, usize, usize)) {
        match self {
            ConnectionMode::Uvw => {
                for u in 0..mul1 {
                    for v in 0..mul2 {
                        for w in 0..mul_out {
                            f(u, v, w, (u * mul2 + v) * mul_out + w);
                        }
                    }
                }
            }
            ConnectionMode::Uvu | ConnectionMode::Uvv | ConnectionMode::Uvuv => {
                for u in 0..mul1 {
                    for v in 0..mul2 {
                        let out = match self {
                            ConnectionMode::Uvu => u,
                            ConnectionMode::Uvv => v,
                            _ => u * mul2 + v,
                        };
                        f(u, v, out, u * mul2 + v);
                    }
                }
            }
            ConnectionMode::Uuu => {
                for u in 0..mul1 {
                    f(u, u, u, u);
                }
            }
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = InstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| InstructionError::UnknownConnectionMode(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// InstructionSpec
// ---------------------------------------------------------------------------

/// A caller-written coupling path, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstructionSpec {
    /// Block index into the first input irreps.
    pub i_in1: usize,
    /// Block index into the second input irreps.
    pub i_in2: usize,
    /// Block index into the output irreps.
    pub i_out: usize,
    /// Multiplicity pairing.
    pub connection_mode: ConnectionMode,
    /// Whether the path carries a trainable weight.
    pub has_weight: bool,
    /// Variance multiplier folded into normalization (default 1).
    #[serde(default = "unit_path_weight")]
    pub path_weight: f64,
}

fn unit_path_weight() -> f64 {
    1.0
}

impl InstructionSpec {
    /// A path with unit path weight.
    pub fn new(i_in1: usize, i_in2: usize, i_out: usize, connection_mode: ConnectionMode, has_weight: bool) -> Self {
        Self {
            i_in1,
            i_in2,
            i_out,
            connection_mode,
            has_weight,
            path_weight: 1.0,
        }
    }

    /// Set the path weight.
    pub fn with_path_weight(mut self, path_weight: f64) -> Self {
        self.path_weight = path_weight;
        self
    }
}

impl From<(usize, usize, usize, ConnectionMode, bool)> for InstructionSpec {
    fn from((i_in1, i_in2, i_out, mode, has_weight): (usize, usize, usize, ConnectionMode, bool)) -> Self {
        InstructionSpec::new(i_in1, i_in2, i_out, mode, has_weight)
    }
}

impl From<(usize, usize, usize, ConnectionMode, bool, f64)> for InstructionSpec {
    fn from(
        (i_in1, i_in2, i_out, mode, has_weight, path_weight): (usize, usize, usize, ConnectionMode, bool, f64),
    ) -> Self {
        InstructionSpec::new(i_in1, i_in2, i_out, mode, has_weight).with_path_weight(path_weight)
    }
}

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// A validated path with its normalization applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Block index into the first input irreps.
    pub i_in1: usize,
    /// Block index into the second input irreps.
    pub i_in2: usize,
    /// Block index into the output irreps.
    pub i_out: usize,
    /// Multiplicity pairing.
    pub connection_mode: ConnectionMode,
    /// Whether the path reads from the weight vector.
    pub has_weight: bool,
    /// Forward scale applied to the coupling tensor.
    pub path_weight: f64,
    /// Init std of the weight; NaN for weight-free paths.
    pub weight_std: f64,
    /// Shape of the weight, see [`ConnectionMode::path_shape`].
    pub path_shape: Vec<usize>,
}

impl Instruction {
    /// Check `spec` (the `index`-th instruction) against the three layouts.
    ///
    /// The returned instruction carries the caller's path weight; it is
    /// turned into the final scale by normalization.
    pub fn validate(
        index: usize,
        spec: &InstructionSpec,
        irreps_in1: &Irreps,
        irreps_in2: &Irreps,
        irreps_out: &Irreps,
    ) -> Result<Self, InstructionError> {
        let lookup = |operand: &'static str, irreps: &Irreps, i: usize| {
            irreps.get(i).copied().ok_or_else(|| InstructionError::IndexOutOfRange {
                instruction: index,
                operand,
                index: i,
                irreps: irreps.to_string(),
            })
        };
        let b1 = lookup("in1", irreps_in1, spec.i_in1)?;
        let b2 = lookup("in2", irreps_in2, spec.i_in2)?;
        let bo = lookup("out", irreps_out, spec.i_out)?;

        if !b1.ir.couples_to(b2.ir, bo.ir) {
            return Err(InstructionError::SelectionRule {
                instruction: index,
                i_in1: spec.i_in1,
                i_in2: spec.i_in2,
                i_out: spec.i_out,
                ir_in1: b1.ir.to_string(),
                ir_in2: b2.ir.to_string(),
                ir_out: bo.ir.to_string(),
            });
        }

        let mode = spec.connection_mode;
        if mode == ConnectionMode::Uvw && !spec.has_weight {
            return Err(InstructionError::WeightRequired {
                instruction: index,
                mode: mode.to_string(),
            });
        }
        mode.check_multiplicities(b1.mul, b2.mul, bo.mul)
            .map_err(|requirement| InstructionError::MultiplicityMismatch {
                instruction: index,
                mode: mode.to_string(),
                requirement,
                mul_in1: b1.mul,
                mul_in2: b2.mul,
                mul_out: bo.mul,
            })?;

        Ok(Self {
            i_in1: spec.i_in1,
            i_in2: spec.i_in2,
            i_out: spec.i_out,
            connection_mode: mode,
            has_weight: spec.has_weight,
            path_weight: spec.path_weight,
            weight_std: f64::NAN,
            path_shape: mode.path_shape(b1.mul, b2.mul, bo.mul),
        })
    }

    /// Number of weights the path consumes (0 when weight-free).
    pub fn weight_numel(&self) -> usize {
        if self.has_weight {
            self.path_shape.iter().product()
        } else {
            0
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape: Vec<String> = self.path_shape.iter().map(ToString::to_string).collect();
        write!(
            f,
            "({}, {}, {}) {} {} shape=({}) path_weight={:.6}",
            self.i_in1,
            self.i_in2,
            self.i_out,
            self.connection_mode,
            if self.has_weight { "weighted" } else { "fixed" },
            shape.join(", "),
            self.path_weight,
        )
    }
}
