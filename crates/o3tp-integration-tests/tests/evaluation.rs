//! Fused and unfused evaluation, weights, shapes and degenerate layouts.

mod common;

use common::{assert_close, irreps, sample};
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use o3tp_core::{InstructionError, IrrepNormalization, O3Error, ShapeError};
use o3tp_tensor::{
    fully_connected, ConnectionMode, Evaluation, FunctionalTensorProduct, InstructionSpec, TensorProductConfig,
    Weights,
};
use proptest::prelude::*;

fn both(tp: &FunctionalTensorProduct, w: &[f64], x1: &Array1<f64>, x2: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
    let run = |evaluation| {
        tp.left_right(Weights::Flat(w), x1.view(), x2.view(), evaluation)
            .unwrap()
            .into_array()
    };
    (run(Evaluation::Unfused), run(Evaluation::Fused))
}

#[test]
fn modes_agree_between_strategies() {
    let (in1, in2, out) = (irreps("3x0e + 2x1o"), irreps("2x0e + 2x1o"), irreps("2x0e + 3x1o + 4x1e + 4x2e"));
    let cases = [
        vec![(0, 0, 0, ConnectionMode::Uvw, true)],
        vec![(1, 0, 1, ConnectionMode::Uvw, true), (0, 1, 1, ConnectionMode::Uvw, true)],
        vec![(0, 0, 2, ConnectionMode::Uvv, true)],
        vec![(1, 1, 2, ConnectionMode::Uvuv, false), (1, 1, 3, ConnectionMode::Uvuv, true)],
        vec![(1, 1, 0, ConnectionMode::Uuu, true), (1, 1, 0, ConnectionMode::Uuu, false)],
    ];
    for (n, instructions) in cases.into_iter().enumerate() {
        let mut out = out.clone();
        if n == 2 {
            // uvv into 2x0e needs mul_out == 2, and 0e x 0e only reaches scalars.
            out = irreps("2x0e + 3x1o + 2x0e + 4x2e");
        }
        let tp = FunctionalTensorProduct::new(
            in1.clone(),
            in2.clone(),
            out,
            instructions,
            &TensorProductConfig::default(),
        )
        .unwrap();
        let w = tp.init_weights(n as u64);
        let x1 = sample(tp.irreps_in1(), 100 + n as u64, IrrepNormalization::Component);
        let x2 = sample(tp.irreps_in2(), 200 + n as u64, IrrepNormalization::Component);
        let (a, b) = both(&tp, &w, &x1, &x2);
        assert_close(&a, &b, 1e-10);
    }
}

#[test]
fn mixed_weighted_and_fixed_paths_sum() {
    // A weight-free and a weighted path into the same output block.
    let (in1, in2, out) = (irreps("2x1o"), irreps("2x1o"), irreps("2x1e"));
    let cfg = TensorProductConfig::default();
    let fixed = (0, 0, 0, ConnectionMode::Uuu, false);
    let weighted = (0, 0, 0, ConnectionMode::Uvw, true);
    let mixed = FunctionalTensorProduct::new(in1.clone(), in2.clone(), out.clone(), vec![fixed, weighted], &cfg).unwrap();
    let only_fixed = FunctionalTensorProduct::new(in1.clone(), in2.clone(), out.clone(), vec![fixed], &cfg).unwrap();
    let only_weighted = FunctionalTensorProduct::new(in1, in2, out, vec![weighted], &cfg).unwrap();

    let w = mixed.init_weights(5);
    let x1 = sample(mixed.irreps_in1(), 6, IrrepNormalization::Component);
    let x2 = sample(mixed.irreps_in2(), 7, IrrepNormalization::Component);
    let (unfused, fused) = both(&mixed, &w, &x1, &x2);
    assert_close(&unfused, &fused, 1e-10);

    // The mixed engine shares the output variance between both paths, so each
    // single-path engine is rescaled by its path weight ratio.
    let scale = |single: &FunctionalTensorProduct, i: usize| {
        mixed.instructions()[i].path_weight / single.instructions()[0].path_weight
    };
    let a = only_fixed
        .left_right(Weights::None, x1.view(), x2.view(), Evaluation::Unfused)
        .unwrap()
        .into_array();
    let b = only_weighted
        .left_right(Weights::Flat(&w), x1.view(), x2.view(), Evaluation::Unfused)
        .unwrap()
        .into_array();
    let expected = &a * scale(&only_fixed, 0) + &b * scale(&only_weighted, 1);
    assert_close(&fused, &expected, 1e-10);
}

#[test]
fn flat_and_per_path_weights_agree() {
    let tp = fully_connected(
        irreps("2x0e + 1x1o"),
        irreps("1x0e + 2x1o"),
        irreps("3x0e + 2x1o"),
        &TensorProductConfig::default(),
    )
    .unwrap();
    let flat = tp.init_weights(3);
    let mut per_path = Vec::new();
    let mut offset = 0;
    for shape in tp.weight_shapes() {
        let n: usize = shape.iter().product();
        per_path.push(ArrayD::from_shape_vec(IxDyn(&shape), flat[offset..offset + n].to_vec()).unwrap());
        offset += n;
    }
    let x1 = sample(tp.irreps_in1(), 1, IrrepNormalization::Component);
    let x2 = sample(tp.irreps_in2(), 2, IrrepNormalization::Component);
    for evaluation in [Evaluation::Unfused, Evaluation::Fused] {
        let a = tp.left_right(Weights::Flat(&flat), x1.view(), x2.view(), evaluation).unwrap();
        let b = tp.left_right(Weights::PerPath(&per_path), x1.view(), x2.view(), evaluation).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn shape_errors_are_raised_before_contraction() {
    let tp = fully_connected(irreps("1x0e"), irreps("1x1o"), irreps("1x1o"), &TensorProductConfig::default()).unwrap();
    let x1 = Array1::from(vec![1.0]);
    let x2 = Array1::from(vec![1.0, 2.0, 3.0]);

    let err = tp
        .left_right(Weights::Flat(&[1.0, 2.0]), x1.view(), x2.view(), Evaluation::Fused)
        .unwrap_err();
    assert!(matches!(err, O3Error::Shape(ShapeError::WeightCount { expected: 1, actual: 2 })));

    let err = tp
        .left_right(Weights::None, x1.view(), x2.view(), Evaluation::Unfused)
        .unwrap_err();
    assert!(matches!(err, O3Error::Shape(ShapeError::WeightCount { expected: 1, actual: 0 })));

    let short = Array1::from(vec![1.0, 2.0]);
    let err = tp
        .left_right(Weights::Flat(&[1.0]), x1.view(), short.view(), Evaluation::Fused)
        .unwrap_err();
    assert!(matches!(err, O3Error::Shape(ShapeError::InputDimension { operand: "x2", expected: 3, actual: 2, .. })));

    let bad = [ArrayD::zeros(IxDyn(&[1, 1, 2]))];
    let err = tp
        .left_right(Weights::PerPath(&bad), x1.view(), x2.view(), Evaluation::Unfused)
        .unwrap_err();
    assert!(matches!(err, O3Error::Shape(ShapeError::PathShape { instruction: 0, .. })));
}

#[test]
fn selection_rule_is_enforced_at_construction() {
    let cfg = TensorProductConfig::default();
    // Degree out of range.
    let err = FunctionalTensorProduct::new(
        irreps("1x1o"),
        irreps("1x1o"),
        irreps("1x3e"),
        vec![(0, 0, 0, ConnectionMode::Uvw, true)],
        &cfg,
    )
    .unwrap_err();
    assert!(matches!(err, O3Error::Instruction(InstructionError::SelectionRule { instruction: 0, .. })));
    assert!(err.to_string().contains("3e"));

    // Wrong parity.
    let err = FunctionalTensorProduct::new(
        irreps("1x1o"),
        irreps("1x0e"),
        irreps("1x1e"),
        vec![(0, 0, 0, ConnectionMode::Uvw, true)],
        &cfg,
    )
    .unwrap_err();
    assert!(matches!(err, O3Error::Instruction(InstructionError::SelectionRule { .. })));

    // Bad index and bad multiplicities.
    let err = FunctionalTensorProduct::new(
        irreps("1x0e"),
        irreps("1x0e"),
        irreps("1x0e"),
        vec![(0, 1, 0, ConnectionMode::Uvw, true)],
        &cfg,
    )
    .unwrap_err();
    assert!(matches!(err, O3Error::Instruction(InstructionError::IndexOutOfRange { operand: "in2", index: 1, .. })));

    let err = FunctionalTensorProduct::new(
        irreps("2x0e"),
        irreps("3x0e"),
        irreps("2x0e"),
        vec![(0, 0, 0, ConnectionMode::Uuu, false)],
        &cfg,
    )
    .unwrap_err();
    assert!(matches!(err, O3Error::Instruction(InstructionError::MultiplicityMismatch { .. })));
}

#[test]
fn elementwise_scalar_scenario() {
    let tp = FunctionalTensorProduct::new(
        irreps("10x0e"),
        irreps("10x0e"),
        irreps("10x0e"),
        vec![(0, 0, 0, ConnectionMode::Uuu, false)],
        &TensorProductConfig::default(),
    )
    .unwrap();
    let x1 = sample(tp.irreps_in1(), 1, IrrepNormalization::Component);
    let x2 = sample(tp.irreps_in2(), 2, IrrepNormalization::Component);
    let expected = &x1 * &x2;
    for evaluation in [Evaluation::Unfused, Evaluation::Fused] {
        let y = tp
            .left_right(Weights::None, x1.view(), x2.view(), evaluation)
            .unwrap()
            .into_array();
        assert_close(&y, &expected, 1e-12);
    }
}

#[test]
fn zero_multiplicity_scenario() {
    let tp = fully_connected(
        irreps("0x0e + 1e"),
        irreps("0e + 0x1e"),
        irreps("0x0e + 1e"),
        &TensorProductConfig::default(),
    )
    .unwrap();
    assert_eq!(tp.irreps_in1().dim(), 3);
    assert_eq!(tp.irreps_in2().dim(), 1);
    let w = tp.init_weights(0);
    let x1 = Array1::from(vec![1.0, 2.0, 3.0]);
    let x2 = Array1::from(vec![2.0]);
    let (a, b) = both(&tp, &w, &x1, &x2);
    assert_close(&a, &b, 1e-12);
    assert_eq!(a.len(), 3);

    let y = tp
        .left_right(Weights::Flat(&w), x1.view(), x2.view(), Evaluation::Unfused)
        .unwrap();
    let blocks = y.list();
    assert_eq!(blocks[0].shape(), &[0, 1]);
    assert_eq!(blocks[1].shape(), &[1, 3]);
}

#[test]
fn empty_instruction_list_gives_zeros() {
    let tp = FunctionalTensorProduct::new(
        irreps("1x1o"),
        irreps("1x1o"),
        irreps("2x0e"),
        Vec::<InstructionSpec>::new(),
        &TensorProductConfig::default(),
    )
    .unwrap();
    assert_eq!(tp.weight_numel(), 0);
    let x = Array1::from(vec![1.0, 2.0, 3.0]);
    for evaluation in [Evaluation::Unfused, Evaluation::Fused] {
        let y = tp.left_right(Weights::None, x.view(), x.view(), evaluation).unwrap();
        assert_eq!(y.array().to_vec(), vec![0.0, 0.0]);
    }
}

#[test]
fn batch_maps_rows() {
    let tp = fully_connected(irreps("1x0e + 1x1o"), irreps("1x1o"), irreps("2x1o + 1x0e"), &TensorProductConfig::default())
        .unwrap();
    let w = tp.init_weights(1);
    let x1 = Array2::from_shape_fn((4, 4), |(i, j)| (i * 4 + j) as f64 * 0.1 - 0.7);
    let x2 = Array2::from_shape_fn((4, 3), |(i, j)| (i + 2 * j) as f64 * 0.3 - 1.0);
    let batch = tp
        .left_right_batch(Weights::Flat(&w), x1.view(), x2.view(), Evaluation::Fused)
        .unwrap();
    assert_eq!(batch.dim(), (4, tp.irreps_out().dim()));
    for i in 0..4 {
        let y = tp
            .left_right(Weights::Flat(&w), x1.row(i), x2.row(i), Evaluation::Unfused)
            .unwrap()
            .into_array();
        assert_close(&batch.row(i).to_owned(), &y, 1e-10);
    }

    let err = tp
        .left_right_batch(Weights::Flat(&w), x1.view(), x2.slice(ndarray::s![..3, ..]), Evaluation::Fused)
        .unwrap_err();
    assert!(matches!(err, O3Error::Shape(ShapeError::BatchMismatch { left: 4, right: 3 })));
}

#[test]
fn engines_are_shared_across_threads() {
    let tp = fully_connected(
        irreps("2x0e + 2x1o + 1x2e"),
        irreps("1x1o + 1x2e"),
        irreps("2x0e + 2x1o + 2x2e"),
        &TensorProductConfig::default(),
    )
    .unwrap();
    let w = tp.init_weights(0);
    let x1 = sample(tp.irreps_in1(), 1, IrrepNormalization::Component);
    let x2 = sample(tp.irreps_in2(), 2, IrrepNormalization::Component);
    let reference = tp
        .left_right(Weights::Flat(&w), x1.view(), x2.view(), Evaluation::Unfused)
        .unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let y = tp
                    .left_right(Weights::Flat(&w), x1.view(), x2.view(), Evaluation::Fused)
                    .unwrap();
                assert!(y.max_abs_diff(&reference).unwrap() < 1e-10);
            });
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Fully connected engines over random small layouts agree across strategies.
    #[test]
    fn random_layouts_agree(
        m1 in 0usize..3, m2 in 0usize..3, m3 in 0usize..3, l1 in 0u32..3, l2 in 0u32..3, key in 0u64..500,
    ) {
        let in1 = irreps(&format!("{m1}x0e + 2x{l1}o"));
        let in2 = irreps(&format!("1x{l2}e + {m2}x1o"));
        let out = irreps(&format!("{m3}x0e + 1x1o + 2x1e + 1x2e + 1x2o"));
        let tp = fully_connected(in1, in2, out, &TensorProductConfig::default()).unwrap();
        let w = tp.init_weights(key);
        let x1 = sample(tp.irreps_in1(), key + 1, IrrepNormalization::Norm);
        let x2 = sample(tp.irreps_in2(), key + 2, IrrepNormalization::Norm);
        let (a, b) = both(&tp, &w, &x1, &x2);
        for (u, f) in a.iter().zip(b.iter()) {
            prop_assert!((u - f).abs() <= 1e-6 + 1e-4 * u.abs());
        }
    }
}
