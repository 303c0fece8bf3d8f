//! # Path Normalization
//!
//! Turns validated instructions into scaled paths so that, with unit-variance
//! inputs and unit-variance weights, every output block has the target
//! variance. For instruction `ins` feeding output block `o`:
//!
//! ```text
//! alpha   = dim(out) | dim(in1)·dim(in2) | 1        (component | norm | none)
//! var(i)  = in1_var[i.i_in1] · in2_var[i.i_in2] · num_elements(i)
//! x       = var(ins)^a · Σ_{i : i.i_out = o} var(i)^(1 - a)
//! alpha  /= x                                      (when x > 0)
//! alpha  *= out_var[o] · path_weight
//! ```
//!
//! `a` is the path-normalization exponent (0 = `element`, 1 = `path`). The
//! scale `sqrt(alpha)` is then split between the forward path weight and the
//! weight init std by the gradient-normalization exponent `g`:
//! `path_weight = sqrt(alpha)^(1 - g)`, `weight_std = sqrt(alpha)^g`.
//! Weight-free paths take the whole scale as path weight.

use o3tp_core::{ConfigError, IrrepNormalization, Irreps};

use crate::config::TensorProductConfig;
use crate::instruction::Instruction;

/// Apply normalization in place to validated instructions.
pub(crate) fn normalize_paths(
    instructions: &mut [Instruction],
    irreps_in1: &Irreps,
    irreps_in2: &Irreps,
    irreps_out: &Irreps,
    config: &TensorProductConfig,
) -> Result<(), ConfigError> {
    let in1_var = TensorProductConfig::resolve_var(config.in1_var.as_deref(), "in1", irreps_in1.len())?;
    let in2_var = TensorProductConfig::resolve_var(config.in2_var.as_deref(), "in2", irreps_in2.len())?;
    let out_var = TensorProductConfig::resolve_var(config.out_var.as_deref(), "out", irreps_out.len())?;

    let a = config.path_normalization.exponent();
    let g = config.gradient_normalization.exponent();

    let variances: Vec<f64> = instructions
        .iter()
        .map(|ins| {
            let n = ins
                .connection_mode
                .num_elements(irreps_in1[ins.i_in1].mul, irreps_in2[ins.i_in2].mul);
            in1_var[ins.i_in1] * in2_var[ins.i_in2] * n as f64
        })
        .collect();

    let scales: Vec<f64> = instructions
        .iter()
        .zip(&variances)
        .map(|(ins, &var)| {
            let (ir1, ir2, ir_out) = (
                irreps_in1[ins.i_in1].ir,
                irreps_in2[ins.i_in2].ir,
                irreps_out[ins.i_out].ir,
            );
            let mut alpha = match config.irrep_normalization {
                IrrepNormalization::Component => ir_out.dim() as f64,
                IrrepNormalization::Norm => (ir1.dim() * ir2.dim()) as f64,
                IrrepNormalization::None => 1.0,
            };

            let shared: f64 = instructions
                .iter()
                .zip(&variances)
                .filter(|(other, _)| other.i_out == ins.i_out)
                .map(|(_, &v)| v.powf(1.0 - a))
                .sum();
            let x = var.powf(a) * shared;
            if x > 0.0 {
                alpha /= x;
            }
            alpha * out_var[ins.i_out] * ins.path_weight
        })
        .collect();

    for (ins, alpha) in instructions.iter_mut().zip(scales) {
        let scale = alpha.sqrt();
        if ins.has_weight {
            ins.path_weight = scale.powf(1.0 - g);
            ins.weight_std = scale.powf(g);
        } else {
            ins.path_weight = scale;
            ins.weight_std = f64::NAN;
        }
        tracing::trace!(
            instruction = %ins,
            weight_std = ins.weight_std,
            "normalized tensor-product path"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ConnectionMode, InstructionSpec};
    use o3tp_core::NormalizationBlend;

    fn irreps(s: &str) -> Irreps {
        s.parse().unwrap()
    }

    fn build(
        in1: &str,
        in2: &str,
        out: &str,
        specs: &[InstructionSpec],
        config: &TensorProductConfig,
    ) -> Vec<Instruction> {
        let (in1, in2, out) = (irreps(in1), irreps(in2), irreps(out));
        let mut ins: Vec<Instruction> = specs
            .iter()
            .enumerate()
            .map(|(i, s)| Instruction::validate(i, s, &in1, &in2, &out).unwrap())
            .collect();
        normalize_paths(&mut ins, &in1, &in2, &out, config).unwrap();
        ins
    }

    #[test]
    fn single_uvw_path_component_element() {
        let ins = build(
            "4x1o",
            "2x1o",
            "3x2e",
            &[InstructionSpec::new(0, 0, 0, ConnectionMode::Uvw, true)],
            &TensorProductConfig::default(),
        );
        // alpha = 5 / (4 * 2)
        assert!((ins[0].path_weight - (5.0f64 / 8.0).sqrt()).abs() < 1e-12);
        assert!((ins[0].weight_std - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_path_moves_scale_into_weight_std() {
        let cfg = TensorProductConfig::default().with_gradient_normalization(NormalizationBlend::Path);
        let ins = build(
            "4x1o",
            "2x1o",
            "3x2e",
            &[InstructionSpec::new(0, 0, 0, ConnectionMode::Uvw, true)],
            &cfg,
        );
        assert!((ins[0].path_weight - 1.0).abs() < 1e-12);
        assert!((ins[0].weight_std - (5.0f64 / 8.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn element_vs_path_sharing() {
        let specs = [
            InstructionSpec::new(0, 0, 0, ConnectionMode::Uvw, true),
            InstructionSpec::new(1, 0, 0, ConnectionMode::Uvw, true),
        ];
        // var = 1*1*(1*1) and 3*1
        let element = build("1x0e + 3x0e", "1x0e", "1x0e", &specs, &TensorProductConfig::default());
        assert!((element[0].path_weight - (1.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((element[1].path_weight - (1.0f64 / 4.0).sqrt()).abs() < 1e-12);

        let cfg = TensorProductConfig::default().with_path_normalization(NormalizationBlend::Path);
        let path = build("1x0e + 3x0e", "1x0e", "1x0e", &specs, &cfg);
        // x = var(ins) * number of paths
        assert!((path[0].path_weight - (1.0f64 / 2.0).sqrt()).abs() < 1e-12);
        assert!((path[1].path_weight - (1.0f64 / 6.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn weight_free_path_takes_full_scale() {
        let cfg = TensorProductConfig::default().with_gradient_normalization(NormalizationBlend::Path);
        let ins = build(
            "2x1o",
            "3x1o",
            "6x1e",
            &[InstructionSpec::new(0, 0, 0, ConnectionMode::Uvuv, false)],
            &cfg,
        );
        assert!((ins[0].path_weight - 3f64.sqrt()).abs() < 1e-12);
        assert!(ins[0].weight_std.is_nan());
    }

    #[test]
    fn norm_and_none_irrep_normalization() {
        let spec = [InstructionSpec::new(0, 0, 0, ConnectionMode::Uuu, false)];
        let norm = TensorProductConfig::default().with_irrep_normalization(IrrepNormalization::Norm);
        let ins = build("1x1o", "1x2e", "1x3o", &spec, &norm);
        assert!((ins[0].path_weight - 15f64.sqrt()).abs() < 1e-12);

        let none = TensorProductConfig::default().with_irrep_normalization(IrrepNormalization::None);
        let ins = build("1x1o", "1x2e", "1x3o", &spec, &none);
        assert!((ins[0].path_weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn user_path_weight_and_out_var_scale_alpha() {
        let cfg = TensorProductConfig::default().with_variances(None, None, Some(vec![4.0]));
        let ins = build(
            "1x0e",
            "1x0e",
            "1x0e",
            &[InstructionSpec::new(0, 0, 0, ConnectionMode::Uuu, false).with_path_weight(2.0)],
            &cfg,
        );
        assert!((ins[0].path_weight - 8f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn zero_multiplicity_path_does_not_divide_by_zero() {
        let ins = build(
            "0x0e",
            "1x0e",
            "1x0e",
            &[InstructionSpec::new(0, 0, 0, ConnectionMode::Uvw, true)],
            &TensorProductConfig::default(),
        );
        assert!(ins[0].path_weight.is_finite());
    }

    #[test]
    fn wrong_variance_length_is_rejected() {
        let (in1, in2, out) = (irreps("1x0e"), irreps("1x0e"), irreps("1x0e"));
        let mut ins = vec![Instruction::validate(
            0,
            &InstructionSpec::new(0, 0, 0, ConnectionMode::Uuu, false),
            &in1,
            &in2,
            &out,
        )
        .unwrap()];
        let cfg = TensorProductConfig::default().with_variances(Some(vec![1.0, 2.0]), None, None);
        let err = normalize_paths(&mut ins, &in1, &in2, &out, &cfg).unwrap_err();
        assert!(matches!(err, ConfigError::VarianceLength { operand: "in1", .. }));
    }
}
