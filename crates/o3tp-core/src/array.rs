//! # IrrepsArray
//!
//! A flat feature vector paired with the irreps describing its layout.
//! Exposes both views the engine produces: the flat [`array`](IrrepsArray::array)
//! and the per-block [`list`](IrrepsArray::list) of `(mul, dim)` matrices.

use std::fmt;

use ndarray::{Array1, Array2};

use crate::error::ShapeError;
use crate::irreps::Irreps;

/// A vector whose layout is described by [`Irreps`].
#[derive(Debug, Clone, PartialEq)]
pub struct IrrepsArray {
    irreps: Irreps,
    array: Array1<f64>,
}

impl IrrepsArray {
    /// Pair a flat vector with its irreps, checking the dimension.
    pub fn new(irreps: Irreps, array: Array1<f64>) -> Result<Self, ShapeError> {
        if array.len() != irreps.dim() {
            return Err(ShapeError::InputDimension {
                operand: "array",
                irreps: irreps.to_string(),
                expected: irreps.dim(),
                actual: array.len(),
            });
        }
        Ok(Self { irreps, array })
    }

    /// All-zero vector for `irreps`.
    pub fn zeros(irreps: Irreps) -> Self {
        let array = Array1::zeros(irreps.dim());
        Self { irreps, array }
    }

    /// Concatenate per-block `(mul, dim)` matrices.
    pub fn from_list(irreps: Irreps, blocks: &[Array2<f64>]) -> Result<Self, ShapeError> {
        let array = irreps.from_list(blocks)?;
        Ok(Self { irreps, array })
    }

    /// The layout.
    pub fn irreps(&self) -> &Irreps {
        &self.irreps
    }

    /// The flat vector.
    pub fn array(&self) -> &Array1<f64> {
        &self.array
    }

    /// Consume into the flat vector.
    pub fn into_array(self) -> Array1<f64> {
        self.array
    }

    /// The per-block `(mul, dim)` matrices.
    pub fn list(&self) -> Vec<Array2<f64>> {
        let flat = &self.array;
        self.irreps
            .iter()
            .zip(self.irreps.slices())
            .map(|(b, range)| {
                let dim = b.ir.dim();
                Array2::from_shape_fn((b.mul, dim), |(u, i)| flat[range.start + u * dim + i])
            })
            .collect()
    }

    /// Maximum absolute difference to `other`, `None` if layouts differ.
    pub fn max_abs_diff(&self, other: &IrrepsArray) -> Option<f64> {
        if self.irreps != other.irreps {
            return None;
        }
        Some(
            self.array
                .iter()
                .zip(other.array.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max),
        )
    }
}

impl fmt::Display for IrrepsArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.irreps, self.array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn irreps(s: &str) -> Irreps {
        s.parse().unwrap()
    }

    #[test]
    fn new_checks_dimension() {
        assert!(IrrepsArray::new(irreps("1x1o"), array![1.0, 2.0, 3.0]).is_ok());
        assert!(IrrepsArray::new(irreps("1x1o"), array![1.0, 2.0]).is_err());
    }

    #[test]
    fn list_and_from_list_agree() {
        let x = IrrepsArray::new(irreps("2x0e + 1x1o"), array![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let blocks = x.list();
        assert_eq!(blocks[0], array![[1.0], [2.0]]);
        assert_eq!(blocks[1], array![[3.0, 4.0, 5.0]]);
        let back = IrrepsArray::from_list(irreps("2x0e + 1x1o"), &blocks).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn zeros_has_dim() {
        let z = IrrepsArray::zeros(irreps("0x0e + 2x2e"));
        assert_eq!(z.array().len(), 10);
        assert_eq!(z.list()[0].dim(), (0, 1));
        assert!(z.array().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn max_abs_diff_requires_same_layout() {
        let a = IrrepsArray::new(irreps("1x0e"), array![1.0]).unwrap();
        let b = IrrepsArray::new(irreps("1x0e"), array![1.5]).unwrap();
        let c = IrrepsArray::new(irreps("1x0o"), array![1.5]).unwrap();
        assert_eq!(a.max_abs_diff(&b), Some(0.5));
        assert_eq!(a.max_abs_diff(&c), None);
    }
}
