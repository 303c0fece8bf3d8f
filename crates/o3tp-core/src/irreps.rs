//! # Irreps
//!
//! An ordered direct sum of irreps with multiplicities, e.g.
//! `16x0o + 32x1e`. An `Irreps` value is the layout contract of a flat
//! feature vector: block `i` occupies `mul_i * dim_i` contiguous slots, in
//! declaration order, laid out as `mul_i` consecutive copies of the irrep.
//!
//! ## Parsing
//!
//! [`Irreps::from_str`](std::str::FromStr) is the single entry point from
//! text. Terms are separated by `+`, whitespace is ignored, and the
//! multiplicity prefix `<mul>x` is optional:
//!
//! ```text
//! "16x0o + 32x1e"   ->  [(16, 0o), (32, 1e)]
//! "0e + 1o"         ->  [(1, 0e), (1, 1o)]
//! ""                ->  []
//! ```
//!
//! `Display` prints the canonical form (`16x0o+32x1e`) and parsing it back
//! yields an equal value.
//!
//! ## Degenerate Blocks
//!
//! Zero multiplicities are legal and occupy no slots. [`Irreps::simplify`]
//! removes them along with merging adjacent equal irreps; instruction
//! indices, however, refer to the declared (unsimplified) blocks.

use std::fmt;
use std::ops::{Add, Index, Mul, Range};
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{IrrepsParseError, ShapeError};
use crate::irrep::Irrep;

// ---------------------------------------------------------------------------
// MulIrrep
// ---------------------------------------------------------------------------

/// An irrep with a multiplicity: `mul` stacked copies of `ir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MulIrrep {
    /// Number of copies.
    pub mul: usize,
    /// The irrep.
    pub ir: Irrep,
}

impl MulIrrep {
    /// Create a `mul x ir` block.
    pub fn new(mul: usize, ir: Irrep) -> Self {
        Self { mul, ir }
    }

    /// Number of slots the block occupies, `mul * (2l + 1)`.
    pub fn dim(&self) -> usize {
        self.mul * self.ir.dim()
    }
}

impl fmt::Display for MulIrrep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.mul, self.ir)
    }
}

impl FromStr for MulIrrep {
    type Err = IrrepsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let term = s.trim();
        if term.is_empty() {
            return Err(IrrepsParseError::EmptyTerm(s.to_string()));
        }
        match term.split_once('x') {
            Some((mul, ir)) => {
                let mul = mul.trim();
                let mul: usize = mul
                    .parse()
                    .map_err(|_| IrrepsParseError::InvalidMultiplicity {
                        multiplicity: mul.to_string(),
                        term: term.to_string(),
                    })?;
                Ok(MulIrrep::new(mul, ir.parse()?))
            }
            None => Ok(MulIrrep::new(1, term.parse()?)),
        }
    }
}

// ---------------------------------------------------------------------------
// Irreps
// ---------------------------------------------------------------------------

/// An ordered list of `(multiplicity, irrep)` blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Irreps(Vec<MulIrrep>);

/// Result of [`Irreps::sort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedIrreps {
    /// The blocks in canonical irrep order.
    pub irreps: Irreps,
    /// `p[i]` is the new position of original block `i`.
    pub p: Vec<usize>,
    /// `inv[j]` is the original position of sorted block `j`.
    pub inv: Vec<usize>,
}

impl Irreps {
    /// Build irreps from explicit blocks.
    pub fn new(blocks: Vec<MulIrrep>) -> Self {
        Self(blocks)
    }

    /// Irreps with no blocks (dimension 0).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// One block of multiplicity 1 per irrep.
    pub fn from_irreps(irreps: impl IntoIterator<Item = Irrep>) -> Self {
        irreps.into_iter().map(|ir| MulIrrep::new(1, ir)).collect()
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the blocks.
    pub fn iter(&self) -> std::slice::Iter<'_, MulIrrep> {
        self.0.iter()
    }

    /// Block `i`, if present.
    pub fn get(&self, i: usize) -> Option<&MulIrrep> {
        self.0.get(i)
    }

    /// The blocks as a slice.
    pub fn as_slice(&self) -> &[MulIrrep] {
        &self.0
    }

    /// Total dimension of a vector with this layout.
    pub fn dim(&self) -> usize {
        self.0.iter().map(MulIrrep::dim).sum()
    }

    /// Sum of multiplicities.
    pub fn num_irreps(&self) -> usize {
        self.0.iter().map(|b| b.mul).sum()
    }

    /// Degree of every irrep copy, repeated by multiplicity.
    pub fn ls(&self) -> Vec<u32> {
        self.0
            .iter()
            .flat_map(|b| std::iter::repeat(b.ir.l()).take(b.mul))
            .collect()
    }

    /// Largest degree among the blocks, `None` when there are no blocks.
    pub fn lmax(&self) -> Option<u32> {
        self.0.iter().map(|b| b.ir.l()).max()
    }

    /// Total multiplicity of `ir`.
    pub fn count(&self, ir: Irrep) -> usize {
        self.0.iter().filter(|b| b.ir == ir).map(|b| b.mul).sum()
    }

    /// Whether `ir` appears in any block (zero multiplicity included).
    pub fn contains(&self, ir: Irrep) -> bool {
        self.0.iter().any(|b| b.ir == ir)
    }

    /// Whether every block is a degree-0 irrep (either parity).
    pub fn is_scalar(&self) -> bool {
        self.0.iter().all(|b| b.ir.l() == 0)
    }

    /// Offset of block `i` in the flat layout.
    pub fn offset(&self, i: usize) -> usize {
        self.0.iter().take(i).map(MulIrrep::dim).sum()
    }

    /// The slot range of every block in the flat layout.
    pub fn slices(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.0
            .iter()
            .map(|b| {
                let range = start..start + b.dim();
                start = range.end;
                range
            })
            .collect()
    }

    /// Merge adjacent equal irreps and drop zero multiplicities.
    pub fn simplify(&self) -> Irreps {
        let mut out: Vec<MulIrrep> = Vec::with_capacity(self.0.len());
        for block in &self.0 {
            if let Some(last) = out.last_mut() {
                if last.ir == block.ir {
                    last.mul += block.mul;
                    continue;
                }
            }
            if block.mul > 0 {
                out.push(*block);
            }
        }
        Irreps(out)
    }

    /// Drop blocks with zero multiplicity, keeping order.
    pub fn remove_zero_multiplicities(&self) -> Irreps {
        self.0.iter().filter(|b| b.mul > 0).copied().collect()
    }

    /// Stable sort of the blocks by irrep.
    pub fn sort(&self) -> SortedIrreps {
        let mut order: Vec<usize> = (0..self.0.len()).collect();
        order.sort_by_key(|&i| (self.0[i].ir, i));

        let mut p = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            p[old] = new;
        }
        let irreps = order.iter().map(|&i| self.0[i]).collect();
        SortedIrreps {
            irreps,
            p,
            inv: order,
        }
    }

    /// Sort then simplify: one block per distinct irrep.
    pub fn regroup(&self) -> Irreps {
        self.sort().irreps.simplify()
    }

    /// Keep only the blocks whose irrep satisfies `keep`.
    pub fn filter(&self, keep: impl Fn(Irrep) -> bool) -> Irreps {
        self.0.iter().filter(|b| keep(b.ir)).copied().collect()
    }

    /// Split a flat vector into its `(mul, dim)` blocks.
    pub fn as_list(&self, x: &[f64]) -> Result<Vec<Array2<f64>>, ShapeError> {
        if x.len() != self.dim() {
            return Err(ShapeError::InputDimension {
                operand: "input",
                irreps: self.to_string(),
                expected: self.dim(),
                actual: x.len(),
            });
        }
        Ok(self
            .0
            .iter()
            .zip(self.slices())
            .map(|(b, range)| {
                let d = b.ir.dim();
                Array2::from_shape_fn((b.mul, d), |(u, i)| x[range.start + u * d + i])
            })
            .collect())
    }

    /// Concatenate `(mul, dim)` blocks back into a flat vector.
    pub fn from_list(&self, blocks: &[Array2<f64>]) -> Result<Array1<f64>, ShapeError> {
        if blocks.len() != self.0.len() {
            return Err(ShapeError::BlockCount {
                irreps: self.to_string(),
                expected: self.0.len(),
                actual: blocks.len(),
            });
        }
        let mut flat = Vec::with_capacity(self.dim());
        for (index, (b, block)) in self.0.iter().zip(blocks).enumerate() {
            if block.dim() != (b.mul, b.ir.dim()) {
                return Err(ShapeError::Block {
                    index,
                    irreps: self.to_string(),
                    expected: vec![b.mul, b.ir.dim()],
                    actual: block.shape().to_vec(),
                });
            }
            flat.extend(block.iter().copied());
        }
        Ok(Array1::from(flat))
    }
}

impl Index<usize> for Irreps {
    type Output = MulIrrep;

    fn index(&self, i: usize) -> &MulIrrep {
        &self.0[i]
    }
}

impl<'a> IntoIterator for &'a Irreps {
    type Item = &'a MulIrrep;
    type IntoIter = std::slice::Iter<'a, MulIrrep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<MulIrrep> for Irreps {
    fn from_iter<I: IntoIterator<Item = MulIrrep>>(iter: I) -> Self {
        Irreps(iter.into_iter().collect())
    }
}

impl From<Irrep> for Irreps {
    fn from(ir: Irrep) -> Self {
        Irreps(vec![MulIrrep::new(1, ir)])
    }
}

impl From<Vec<MulIrrep>> for Irreps {
    fn from(blocks: Vec<MulIrrep>) -> Self {
        Irreps(blocks)
    }
}

impl Add for &Irreps {
    type Output = Irreps;

    fn add(self, rhs: &Irreps) -> Irreps {
        self.0.iter().chain(rhs.0.iter()).copied().collect()
    }
}

impl Add for Irreps {
    type Output = Irreps;

    fn add(mut self, rhs: Irreps) -> Irreps {
        self.0.extend(rhs.0);
        self
    }
}

impl Mul<usize> for &Irreps {
    type Output = Irreps;

    /// Repeat the whole block list `n` times.
    fn mul(self, n: usize) -> Irreps {
        (0..n).flat_map(|_| self.0.iter().copied()).collect()
    }
}

impl fmt::Display for Irreps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

impl FromStr for Irreps {
    type Err = IrrepsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Irreps::empty());
        }
        s.split('+')
            .map(|term| {
                if term.trim().is_empty() {
                    Err(IrrepsParseError::EmptyTerm(s.to_string()))
                } else {
                    term.parse()
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Irreps)
    }
}

impl From<Irreps> for String {
    fn from(irreps: Irreps) -> String {
        irreps.to_string()
    }
}

impl TryFrom<String> for Irreps {
    type Error = IrrepsParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&str> for Irreps {
    type Error = IrrepsParseError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}
