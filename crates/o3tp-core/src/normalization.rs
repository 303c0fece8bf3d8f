//! # Normalization Conventions
//!
//! Two families of knobs control how a tensor product scales its paths:
//!
//! - [`IrrepNormalization`] fixes the variance convention of a single irrep
//!   block: unit variance per component, or unit expected squared norm per
//!   block. The same convention drives [`Irreps::randn`](crate::Irreps::randn).
//! - [`NormalizationBlend`] is used twice, for path normalization (how the
//!   output variance is shared among the paths feeding one output block) and
//!   for gradient normalization (how the scale is split between the forward
//!   path weight and the initialization std of the trainable weight). The
//!   named endpoints map to exponents `0` (`element`) and `1` (`path`); a
//!   numeric value in `[0, 1]` blends them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Variance convention of an irrep block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrrepNormalization {
    /// Every component has unit variance.
    #[default]
    Component,
    /// Every block has unit expected squared norm.
    Norm,
    /// No irrep-dependent scaling.
    None,
}

impl fmt::Display for IrrepNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IrrepNormalization::Component => "component",
            IrrepNormalization::Norm => "norm",
            IrrepNormalization::None => "none",
        })
    }
}

impl FromStr for IrrepNormalization {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "component" => Ok(IrrepNormalization::Component),
            "norm" => Ok(IrrepNormalization::Norm),
            "none" => Ok(IrrepNormalization::None),
            other => Err(ConfigError::UnknownNormalization {
                kind: "irrep",
                value: other.to_string(),
            }),
        }
    }
}

/// Interpolation between `element` (exponent 0) and `path` (exponent 1).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BlendRepr", into = "BlendRepr")]
pub enum NormalizationBlend {
    /// Scale by the total number of elements feeding the output.
    #[default]
    Element,
    /// Give every path the same share.
    Path,
    /// Exponent strictly between the endpoints (validated in `[0, 1]`).
    Blend(f64),
}

impl NormalizationBlend {
    /// A numeric blend, rejected outside `[0, 1]`.
    pub fn blend(value: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::BlendOutOfRange {
                kind: "blend",
                value,
            });
        }
        Ok(NormalizationBlend::Blend(value))
    }

    /// The exponent in `[0, 1]`.
    pub fn exponent(self) -> f64 {
        match self {
            NormalizationBlend::Element => 0.0,
            NormalizationBlend::Path => 1.0,
            NormalizationBlend::Blend(a) => a,
        }
    }
}

impl fmt::Display for NormalizationBlend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationBlend::Element => f.write_str("element"),
            NormalizationBlend::Path => f.write_str("path"),
            NormalizationBlend::Blend(a) => write!(f, "{a}"),
        }
    }
}

impl FromStr for NormalizationBlend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "element" => Ok(NormalizationBlend::Element),
            "path" => Ok(NormalizationBlend::Path),
            other => match other.parse::<f64>() {
                Ok(value) => NormalizationBlend::blend(value),
                Err(_) => Err(ConfigError::UnknownNormalization {
                    kind: "blend",
                    value: other.to_string(),
                }),
            },
        }
    }
}

/// Serialized form: a name or a number.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BlendRepr {
    Named(String),
    Value(f64),
}

impl TryFrom<BlendRepr> for NormalizationBlend {
    type Error = ConfigError;

    fn try_from(repr: BlendRepr) -> Result<Self, Self::Error> {
        match repr {
            BlendRepr::Named(name) => name.parse(),
            BlendRepr::Value(value) => NormalizationBlend::blend(value),
        }
    }
}

impl From<NormalizationBlend> for BlendRepr {
    fn from(blend: NormalizationBlend) -> Self {
        match blend {
            NormalizationBlend::Blend(a) => BlendRepr::Value(a),
            named => BlendRepr::Named(named.to_string()),
        }
    }
}
