//! # Error Hierarchy
//!
//! Structured error types for the whole workspace, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Errors fall in two classes:
//!
//! - **Construction errors** ([`IrrepsParseError`], [`InstructionError`],
//!   [`ConfigError`]) are raised while an engine or layout is being built.
//!   They never surface from evaluation.
//! - **Shape errors** ([`ShapeError`]) are raised at the start of an
//!   evaluation, before any contraction runs.
//!
//! Every variant carries the offending irreps, indices or sizes so a caller
//! can fix the engine description without re-deriving the layout by hand.

use thiserror::Error;

/// Top-level error type for o3tp.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum O3Error {
    /// Malformed irrep or irreps text.
    #[error("irreps parse error: {0}")]
    Parse(#[from] IrrepsParseError),

    /// Instruction rejected at engine construction.
    #[error("instruction error: {0}")]
    Instruction(#[from] InstructionError),

    /// Array sizes disagree with the declared layout.
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Invalid normalization or layer configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors while parsing irrep / irreps text such as `"16x0o + 32x1e"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrrepsParseError {
    /// The irrep token is not `<degree><e|o|y>`.
    #[error("invalid irrep \"{0}\" (expected <degree><e|o|y>, e.g. \"1o\")")]
    InvalidIrrep(String),

    /// The multiplicity prefix is not a non-negative integer.
    #[error("invalid multiplicity \"{multiplicity}\" in term \"{term}\"")]
    InvalidMultiplicity {
        /// The unparsable multiplicity text.
        multiplicity: String,
        /// The full `+`-separated term it came from.
        term: String,
    },

    /// A `+`-separated term is empty (e.g. `"1e + + 2o"`).
    #[error("empty term in irreps \"{0}\"")]
    EmptyTerm(String),

    /// Parity given as a sign must be `1` or `-1`.
    #[error("invalid parity {0} (expected 1 or -1)")]
    InvalidParity(i32),
}

/// Errors while validating tensor-product instructions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    /// An instruction index points past the end of its irreps.
    #[error("instruction {instruction}: {operand} index {index} out of range for irreps \"{irreps}\"")]
    IndexOutOfRange {
        /// Position of the instruction in the list.
        instruction: usize,
        /// Which operand (`in1`, `in2`, `out`).
        operand: &'static str,
        /// The offending index.
        index: usize,
        /// The irreps it was checked against.
        irreps: String,
    },

    /// The output irrep is not in the product of the two input irreps.
    #[error("instruction {instruction} ({i_in1}, {i_in2}, {i_out}): {ir_out} is not in {ir_in1} x {ir_in2}")]
    SelectionRule {
        /// Position of the instruction in the list.
        instruction: usize,
        /// Index into the first input irreps.
        i_in1: usize,
        /// Index into the second input irreps.
        i_in2: usize,
        /// Index into the output irreps.
        i_out: usize,
        /// First input irrep.
        ir_in1: String,
        /// Second input irrep.
        ir_in2: String,
        /// Requested output irrep.
        ir_out: String,
    },

    /// Multiplicities are incompatible with the connection mode.
    #[error("instruction {instruction}: connection mode {mode} requires {requirement}, got multiplicities ({mul_in1}, {mul_in2}, {mul_out})")]
    MultiplicityMismatch {
        /// Position of the instruction in the list.
        instruction: usize,
        /// The connection mode name.
        mode: String,
        /// The multiplicity relation the mode requires.
        requirement: &'static str,
        /// First input multiplicity.
        mul_in1: usize,
        /// Second input multiplicity.
        mul_in2: usize,
        /// Output multiplicity.
        mul_out: usize,
    },

    /// The connection mode needs a trainable weight.
    #[error("instruction {instruction}: connection mode {mode} requires has_weight = true")]
    WeightRequired {
        /// Position of the instruction in the list.
        instruction: usize,
        /// The connection mode name.
        mode: String,
    },

    /// Unknown connection mode text.
    #[error("unknown connection mode \"{0}\" (expected uvw, uvu, uvv, uvuv or uuu)")]
    UnknownConnectionMode(String),
}

/// Errors when array sizes disagree with a declared layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// A flat input does not have the irreps dimension.
    #[error("{operand} has {actual} components but irreps \"{irreps}\" has dimension {expected}")]
    InputDimension {
        /// Which operand (`x1`, `x2`, `input`).
        operand: &'static str,
        /// The irreps the operand was declared with.
        irreps: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The flat weight buffer has the wrong number of entries.
    #[error("expected {expected} weights (sum of weighted path shapes), got {actual}")]
    WeightCount {
        /// Expected number of weights.
        expected: usize,
        /// Provided number of weights.
        actual: usize,
    },

    /// The per-path weight list has the wrong number of entries.
    #[error("expected {expected} per-path weight arrays (one per weighted instruction), got {actual}")]
    WeightPaths {
        /// Expected number of weight arrays.
        expected: usize,
        /// Provided number of weight arrays.
        actual: usize,
    },

    /// A per-path weight array does not have its path shape.
    #[error("weight for instruction {instruction} has shape {actual:?}, expected {expected:?}")]
    PathShape {
        /// Position of the instruction in the list.
        instruction: usize,
        /// Expected path shape.
        expected: Vec<usize>,
        /// Provided shape.
        actual: Vec<usize>,
    },

    /// A block list does not match the irreps it claims.
    #[error("block {index} has shape {actual:?}, expected {expected:?} for irreps \"{irreps}\"")]
    Block {
        /// Block position.
        index: usize,
        /// The irreps of the layout.
        irreps: String,
        /// Expected `(mul, dim)`.
        expected: Vec<usize>,
        /// Provided shape.
        actual: Vec<usize>,
    },

    /// A structured operand carries a different layout than declared.
    #[error("{operand} has irreps \"{actual}\" but \"{expected}\" was declared")]
    IrrepsMismatch {
        /// Which operand (`x1`, `x2`, `input`).
        operand: &'static str,
        /// The declared irreps.
        expected: String,
        /// The operand's irreps.
        actual: String,
    },

    /// Batched operands have a different number of rows.
    #[error("batch sizes differ: x1 has {left} rows, x2 has {right}")]
    BatchMismatch {
        /// Rows of the first operand.
        left: usize,
        /// Rows of the second operand.
        right: usize,
    },

    /// A block list has the wrong number of blocks.
    #[error("expected {expected} blocks for irreps \"{irreps}\", got {actual}")]
    BlockCount {
        /// The irreps of the layout.
        irreps: String,
        /// Expected number of blocks.
        expected: usize,
        /// Provided number of blocks.
        actual: usize,
    },
}

/// Errors in normalization or layer configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Normalization text is not a known convention.
    #[error("unknown {kind} normalization \"{value}\"")]
    UnknownNormalization {
        /// Which knob (`irrep`, `path`, `gradient`).
        kind: &'static str,
        /// The rejected text.
        value: String,
    },

    /// Numeric blend outside `[0, 1]`.
    #[error("{kind} normalization blend {value} is outside [0, 1]")]
    BlendOutOfRange {
        /// Which knob (`path`, `gradient`).
        kind: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Per-block variance list length disagrees with its irreps.
    #[error("{operand} variance list has {actual} entries but irreps has {expected} blocks")]
    VarianceLength {
        /// Which operand (`in1`, `in2`, `out`).
        operand: &'static str,
        /// Expected length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },

    /// An activation was supplied for non-scalar irreps, or scalars were expected.
    #[error("{what} must be scalars (l = 0), got \"{irreps}\"")]
    NotScalar {
        /// What was expected to be scalar.
        what: &'static str,
        /// The offending irreps.
        irreps: String,
    },

    /// Activation list length disagrees with the scalar irreps.
    #[error("{expected} activations required for irreps \"{irreps}\", got {actual}")]
    ActivationCount {
        /// The scalar irreps.
        irreps: String,
        /// Expected number of activations.
        expected: usize,
        /// Provided number of activations.
        actual: usize,
    },

    /// An activation on odd scalars is neither even nor odd.
    #[error("activation on odd scalars must be even or odd; \"{0}\" is neither")]
    ParityViolation(String),

    /// Gate scalars do not match the number of gated irreps.
    #[error("irreps_gated has {gated} irreps but irreps_gates has {gates} gate scalars")]
    GateCount {
        /// `num_irreps` of the gated irreps.
        gated: usize,
        /// `num_irreps` of the gate irreps.
        gates: usize,
    },

    /// The two elementwise inputs carry a different number of irreps.
    #[error("elementwise product needs equal num_irreps, got {left} and {right}")]
    ElementwiseCount {
        /// `num_irreps` of the first input.
        left: usize,
        /// `num_irreps` of the second input.
        right: usize,
    },

    /// An environment override could not be parsed.
    #[error("environment variable {name}: {reason}")]
    Environment {
        /// Variable name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_token() {
        let err = O3Error::from(IrrepsParseError::InvalidIrrep("1q".to_string()));
        let msg = format!("{err}");
        assert!(msg.contains("irreps parse error"));
        assert!(msg.contains("1q"));
    }

    #[test]
    fn selection_rule_names_indices_and_irreps() {
        let err = InstructionError::SelectionRule {
            instruction: 2,
            i_in1: 0,
            i_in2: 1,
            i_out: 3,
            ir_in1: "1o".to_string(),
            ir_in2: "1o".to_string(),
            ir_out: "3e".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("(0, 1, 3)"));
        assert!(msg.contains("3e is not in 1o x 1o"));
    }

    #[test]
    fn multiplicity_mismatch_display() {
        let err = InstructionError::MultiplicityMismatch {
            instruction: 0,
            mode: "uvu".to_string(),
            requirement: "mul_out == mul_in1",
            mul_in1: 3,
            mul_in2: 2,
            mul_out: 4,
        };
        let msg = format!("{err}");
        assert!(msg.contains("uvu"));
        assert!(msg.contains("(3, 2, 4)"));
    }

    #[test]
    fn shape_error_weight_count_display() {
        let err = O3Error::from(ShapeError::WeightCount {
            expected: 125,
            actual: 124,
        });
        let msg = format!("{err}");
        assert!(msg.contains("shape error"));
        assert!(msg.contains("125"));
        assert!(msg.contains("124"));
    }

    #[test]
    fn config_error_blend_display() {
        let err = ConfigError::BlendOutOfRange {
            kind: "path",
            value: 1.5,
        };
        assert!(format!("{err}").contains("1.5"));
    }

    #[test]
    fn all_error_types_are_debug() {
        let e1 = O3Error::Parse(IrrepsParseError::EmptyTerm("1e++".to_string()));
        let e2 = InstructionError::UnknownConnectionMode("uvx".to_string());
        let e3 = ShapeError::WeightPaths {
            expected: 1,
            actual: 0,
        };
        let e4 = ConfigError::GateCount { gated: 3, gates: 2 };
        assert!(!format!("{e1:?}").is_empty());
        assert!(!format!("{e2:?}").is_empty());
        assert!(!format!("{e3:?}").is_empty());
        assert!(!format!("{e4:?}").is_empty());
    }
}
