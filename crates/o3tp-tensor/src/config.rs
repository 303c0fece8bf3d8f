//! Tensor-product normalization configuration.
//!
//! The three normalization knobs and the optional per-block input/output
//! variances. Defaults are `component` / `element` / `element` with unit
//! variances. Override via environment variables or explicit construction.

use std::str::FromStr;

use o3tp_core::{ConfigError, IrrepNormalization, NormalizationBlend};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`TensorProductConfig::irrep_normalization`].
pub const ENV_IRREP_NORMALIZATION: &str = "O3TP_IRREP_NORMALIZATION";
/// Environment variable overriding [`TensorProductConfig::path_normalization`].
pub const ENV_PATH_NORMALIZATION: &str = "O3TP_PATH_NORMALIZATION";
/// Environment variable overriding [`TensorProductConfig::gradient_normalization`].
pub const ENV_GRADIENT_NORMALIZATION: &str = "O3TP_GRADIENT_NORMALIZATION";

/// How a tensor product scales its paths and initializes its weights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorProductConfig {
    /// Variance convention of every irrep block.
    pub irrep_normalization: IrrepNormalization,
    /// How output variance is shared among the paths into one output block.
    pub path_normalization: NormalizationBlend,
    /// How scale is split between path weight and weight init std.
    pub gradient_normalization: NormalizationBlend,
    /// Per-block variance of the first input; `None` means all ones.
    pub in1_var: Option<Vec<f64>>,
    /// Per-block variance of the second input; `None` means all ones.
    pub in2_var: Option<Vec<f64>>,
    /// Per-block target variance of the output; `None` means all ones.
    pub out_var: Option<Vec<f64>>,
}

impl TensorProductConfig {
    /// Load the normalization knobs from environment variables.
    ///
    /// Variables:
    /// - `O3TP_IRREP_NORMALIZATION` (`component` | `norm` | `none`, default `component`)
    /// - `O3TP_PATH_NORMALIZATION` (`element` | `path` | number in `[0, 1]`, default `element`)
    /// - `O3TP_GRADIENT_NORMALIZATION` (same values, default `element`)
    ///
    /// Variances are not configurable from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-provided variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            irrep_normalization: env_value(&lookup, ENV_IRREP_NORMALIZATION)?.unwrap_or_default(),
            path_normalization: env_value(&lookup, ENV_PATH_NORMALIZATION)?.unwrap_or_default(),
            gradient_normalization: env_value(&lookup, ENV_GRADIENT_NORMALIZATION)?
                .unwrap_or_default(),
            ..Self::default()
        })
    }

    /// Set the irrep normalization.
    pub fn with_irrep_normalization(mut self, normalization: IrrepNormalization) -> Self {
        self.irrep_normalization = normalization;
        self
    }

    /// Set the path normalization.
    pub fn with_path_normalization(mut self, normalization: NormalizationBlend) -> Self {
        self.path_normalization = normalization;
        self
    }

    /// Set the gradient normalization.
    pub fn with_gradient_normalization(mut self, normalization: NormalizationBlend) -> Self {
        self.gradient_normalization = normalization;
        self
    }

    /// Set per-block variances of both inputs and the output.
    pub fn with_variances(
        mut self,
        in1_var: Option<Vec<f64>>,
        in2_var: Option<Vec<f64>>,
        out_var: Option<Vec<f64>>,
    ) -> Self {
        self.in1_var = in1_var;
        self.in2_var = in2_var;
        self.out_var = out_var;
        self
    }

    /// Resolve one variance list against a block count, defaulting to ones.
    pub(crate) fn resolve_var(
        given: Option<&[f64]>,
        operand: &'static str,
        blocks: usize,
    ) -> Result<Vec<f64>, ConfigError> {
        match given {
            None => Ok(vec![1.0; blocks]),
            Some(var) if var.len() == blocks => Ok(var.to_vec()),
            Some(var) => Err(ConfigError::VarianceLength {
                operand,
                expected: blocks,
                actual: var.len(),
            }),
        }
    }
}

fn env_value<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = ConfigError>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Environment {
                name,
                reason: e.to_string(),
            }),
    }
}
