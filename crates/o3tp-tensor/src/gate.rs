//! # Gate
//!
//! The equivariant gated nonlinearity. A flat input is read as three
//! consecutive regions:
//!
//! ```text
//! [ scalars | gates | gated ]
//! ```
//!
//! Scalars go through their activations. Gates go through theirs and then
//! scale the gated irreps copy by copy through an elementwise tensor product,
//! one gate scalar per gated copy. The output is `[ scalars' | gated' ]`.
//!
//! Activations are normalized to unit second moment.

use ndarray::{s, Array1, ArrayView1};
use o3tp_core::{ConfigError, Irreps, IrrepsArray, O3Error, ShapeError};

use crate::activation::{Activation, ScalarActivation};
use crate::builders::elementwise_tensor_product;
use crate::config::TensorProductConfig;
use crate::tensor_product::{Evaluation, FunctionalTensorProduct, Weights};

/// Gated nonlinearity over `scalars + gates + gated`.
#[derive(Debug)]
pub struct Gate {
    irreps_in: Irreps,
    irreps_out: Irreps,
    scalars: ScalarActivation,
    gates: ScalarActivation,
    product: FunctionalTensorProduct,
}

impl Gate {
    /// Build a gate from the three regions and one activation per block of
    /// the scalar and gate irreps.
    ///
    /// Scalars and gates must be `l = 0`, and there must be exactly one gate
    /// scalar per gated irrep copy.
    pub fn new(
        irreps_scalars: Irreps,
        act_scalars: Vec<Option<Activation>>,
        irreps_gates: Irreps,
        act_gates: Vec<Option<Activation>>,
        irreps_gated: Irreps,
    ) -> Result<Self, O3Error> {
        if !irreps_scalars.is_scalar() {
            return Err(ConfigError::NotScalar {
                what: "irreps_scalars",
                irreps: irreps_scalars.to_string(),
            }
            .into());
        }
        if !irreps_gates.is_scalar() {
            return Err(ConfigError::NotScalar {
                what: "irreps_gates",
                irreps: irreps_gates.to_string(),
            }
            .into());
        }
        if irreps_gates.num_irreps() != irreps_gated.num_irreps() {
            return Err(ConfigError::GateCount {
                gated: irreps_gated.num_irreps(),
                gates: irreps_gates.num_irreps(),
            }
            .into());
        }

        let scalars = ScalarActivation::new(irreps_scalars.clone(), act_scalars, true)?;
        let gates = ScalarActivation::new(irreps_gates.clone(), act_gates, true)?;
        let product = elementwise_tensor_product(
            irreps_gated.clone(),
            gates.irreps_out().clone(),
            None,
            &TensorProductConfig::default(),
        )?;

        let irreps_in = &(&irreps_scalars + &irreps_gates) + &irreps_gated;
        let irreps_out = scalars.irreps_out() + product.irreps_out();
        tracing::debug!(%irreps_in, %irreps_out, "built gate");
        Ok(Self {
            irreps_in,
            irreps_out,
            scalars,
            gates,
            product,
        })
    }

    /// Input layout, `scalars + gates + gated`.
    pub fn irreps_in(&self) -> &Irreps {
        &self.irreps_in
    }

    /// Output layout, activated scalars followed by the gated irreps.
    pub fn irreps_out(&self) -> &Irreps {
        &self.irreps_out
    }

    /// Apply the gate to a flat input.
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
        let n_scalars = self.scalars.irreps_in().dim();
        let n_gates = self.gates.irreps_in().dim();

        let scalars = self.scalars.apply(x.slice(s![..n_scalars]))?;
        let gates = self.gates.apply(x.slice(s![n_scalars..n_scalars + n_gates]))?;
        let gated = self.product.left_right(
            Weights::None,
            x.slice(s![n_scalars + n_gates..]),
            gates.array().view(),
            Evaluation::Unfused,
        )?;

        let out: Array1<f64> = scalars.array().iter().chain(gated.array().iter()).copied().collect();
        Ok(IrrepsArray::new(self.irreps_out.clone(), out)?)
    }
}
