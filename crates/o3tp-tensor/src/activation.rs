//! # Scalar Activations
//!
//! Pointwise nonlinearities on scalar (`l = 0`) blocks. Non-scalar blocks
//! pass through unchanged and must not be given an activation.
//!
//! Two rules keep the result equivariant and well scaled:
//!
//! - **Parity.** An odd scalar (`0o`) flips sign under inversion, so its
//!   activation must be even (output `0e`) or odd (output `0o`). Anything
//!   else is rejected.
//! - **Second moment.** With normalization on, `f` is replaced by
//!   `f / sqrt(E[f(z)^2])`, `z ~ N(0, 1)`, so unit-variance inputs give
//!   unit-second-moment outputs. The moment is computed by a fixed
//!   quadrature, so it is deterministic.

use std::fmt;
use std::sync::Arc;

use ndarray::ArrayView1;
use o3tp_core::{ConfigError, Irrep, Irreps, IrrepsArray, MulIrrep, O3Error, Parity, ShapeError};

/// Half-width of the quadrature window, in standard deviations.
const QUADRATURE_HALF_WIDTH: f64 = 10.0;
/// Number of quadrature intervals.
const QUADRATURE_STEPS: usize = 20_000;
/// Tolerance of the parity probe.
const PARITY_TOLERANCE: f64 = 1e-5;

/// A named scalar function `f64 -> f64`.
#[derive(Clone)]
pub struct Activation {
    name: String,
    f: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl Activation {
    /// Wrap a function under a name used in error messages.
    pub fn new(name: impl Into<String>, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// `tanh`, odd.
    pub fn tanh() -> Self {
        Self::new("tanh", f64::tanh)
    }

    /// Logistic sigmoid, neither even nor odd.
    pub fn sigmoid() -> Self {
        Self::new("sigmoid", |x: f64| 1.0 / (1.0 + (-x).exp()))
    }

    /// `x · sigmoid(x)`.
    pub fn silu() -> Self {
        Self::new("silu", |x: f64| x / (1.0 + (-x).exp()))
    }

    /// `max(x, 0)`.
    pub fn relu() -> Self {
        Self::new("relu", |x: f64| x.max(0.0))
    }

    /// `|x|`, even.
    pub fn abs() -> Self {
        Self::new("abs", f64::abs)
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate at `x`.
    pub fn call(&self, x: f64) -> f64 {
        (self.f)(x)
    }

    /// `E[f(z)^2]` for `z ~ N(0, 1)` by the trapezoid rule.
    pub fn second_moment(&self) -> f64 {
        let h = 2.0 * QUADRATURE_HALF_WIDTH / QUADRATURE_STEPS as f64;
        let norm = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
        (0..=QUADRATURE_STEPS)
            .map(|n| {
                let z = -QUADRATURE_HALF_WIDTH + n as f64 * h;
                let end = if n == 0 || n == QUADRATURE_STEPS { 0.5 } else { 1.0 };
                let fz = self.call(z);
                end * fz * fz * norm * (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            * h
    }

    /// `Some(Even)` if `f(-x) = f(x)`, `Some(Odd)` if `f(-x) = -f(x)`, else `None`.
    pub fn parity(&self) -> Option<Parity> {
        let probe = (0..256).map(|n| QUADRATURE_HALF_WIDTH * n as f64 / 255.0);
        let (mut even, mut odd) = (0.0f64, 0.0f64);
        for x in probe {
            let (a, b) = (self.call(x), self.call(-x));
            even = even.max((a - b).abs());
            odd = odd.max((a + b).abs());
        }
        if even < PARITY_TOLERANCE {
            Some(Parity::Even)
        } else if odd < PARITY_TOLERANCE {
            Some(Parity::Odd)
        } else {
            None
        }
    }

    /// Rescale to unit second moment, or keep as is when that is impossible.
    pub fn normalized(&self) -> Activation {
        let moment = self.second_moment();
        if !(moment.is_finite() && moment > 0.0) {
            tracing::warn!(
                activation = %self.name,
                moment,
                "activation has no finite positive second moment; left unnormalized"
            );
            return self.clone();
        }
        let scale = 1.0 / moment.sqrt();
        let f = Arc::clone(&self.f);
        Activation {
            name: self.name.clone(),
            f: Arc::new(move |x| scale * f(x)),
        }
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Activation").field(&self.name).finish()
    }
}

/// Per-block scalar activations with parity inference.
#[derive(Debug, Clone)]
pub struct ScalarActivation {
    irreps_in: Irreps,
    irreps_out: Irreps,
    acts: Vec<Option<Activation>>,
}

impl ScalarActivation {
    /// One optional activation per block of `irreps_in`.
    ///
    /// Fails if the counts differ, if a non-scalar block is given an
    /// activation, or if an odd scalar's activation is neither even nor odd.
    pub fn new(irreps_in: Irreps, acts: Vec<Option<Activation>>, normalize: bool) -> Result<Self, ConfigError> {
        if acts.len() != irreps_in.len() {
            return Err(ConfigError::ActivationCount {
                irreps: irreps_in.to_string(),
                expected: irreps_in.len(),
                actual: acts.len(),
            });
        }

        let mut out = Vec::with_capacity(irreps_in.len());
        let mut resolved = Vec::with_capacity(acts.len());
        for (block, act) in irreps_in.iter().zip(acts) {
            let Some(act) = act else {
                out.push(*block);
                resolved.push(None);
                continue;
            };
            if block.ir.l() != 0 {
                return Err(ConfigError::NotScalar {
                    what: "activated irreps",
                    irreps: block.to_string(),
                });
            }
            let p = match block.ir.p() {
                Parity::Even => Parity::Even,
                Parity::Odd => act
                    .parity()
                    .ok_or_else(|| ConfigError::ParityViolation(act.name().to_string()))?,
            };
            out.push(MulIrrep::new(block.mul, Irrep::new(0, p)));
            resolved.push(Some(if normalize { act.normalized() } else { act }));
        }

        Ok(Self {
            irreps_in,
            irreps_out: Irreps::new(out),
            acts: resolved,
        })
    }

    /// The same activation for every scalar block, none for the others.
    pub fn uniform(irreps_in: Irreps, act: Activation, normalize: bool) -> Result<Self, ConfigError> {
        let acts = irreps_in
            .iter()
            .map(|b| (b.ir.l() == 0).then(|| act.clone()))
            .collect();
        Self::new(irreps_in, acts, normalize)
    }

    /// Input layout.
    pub fn irreps_in(&self) -> &Irreps {
        &self.irreps_in
    }

    /// Output layout (odd scalars become even under an even activation).
    pub fn irreps_out(&self) -> &Irreps {
        &self.irreps_out
    }

    /// Apply to a flat input.
    pub fn apply(&self, x: ArrayView1<'_, f64>) -> Result<IrrepsArray, O3Error> {
        if x.len() != self.irreps_in.dim() {
            return Err(ShapeError::InputDimension {
                operand: "input",
                irreps: self.irreps_in.to_string(),
                expected: self.irreps_in.dim(),
                actual: x.len(),
            }
            .into());
        }
        let mut y = x.to_owned();
        for (range, act) in self.irreps_in.slices().into_iter().zip(&self.acts) {
            if let Some(act) = act {
                y.slice_mut(ndarray::s![range]).mapv_inplace(|v| act.call(v));
            }
        }
        Ok(IrrepsArray::new(self.irreps_out.clone(), y)?)
    }
}
