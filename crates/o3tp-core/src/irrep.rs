//! # Irrep
//!
//! A single irreducible representation of O(3), labelled by its degree `l`
//! and its parity `p`. The representation has dimension `2l + 1`.
//!
//! ## Selection Rule
//!
//! The product of two irreps decomposes as
//!
//! ```text
//! (l1, p1) ⊗ (l2, p2) = ⊕_{l = |l1 - l2|}^{l1 + l2} (l, p1 · p2)
//! ```
//!
//! [`Irrep::product`] enumerates that decomposition and
//! [`Irrep::couples_to`] tests membership; both are used by instruction
//! validation and by every instruction builder.
//!
//! ## Ordering
//!
//! Irreps order by degree first. Within a degree the "natural" parity
//! `(-1)^l` (the parity of spherical harmonics of that degree) comes first,
//! giving `0e < 0o < 1o < 1e < 2e < 2o < ...`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IrrepsParseError;

/// Parity under spatial inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    /// Unchanged under inversion (`+1`, letter `e`).
    Even,
    /// Sign flip under inversion (`-1`, letter `o`).
    Odd,
}

impl Parity {
    /// The parity as a sign, `+1` or `-1`.
    pub fn sign(self) -> i32 {
        match self {
            Parity::Even => 1,
            Parity::Odd => -1,
        }
    }

    /// Parse a sign (`1` or `-1`).
    pub fn from_sign(sign: i32) -> Result<Self, IrrepsParseError> {
        match sign {
            1 => Ok(Parity::Even),
            -1 => Ok(Parity::Odd),
            other => Err(IrrepsParseError::InvalidParity(other)),
        }
    }

    /// The parity of spherical harmonics of degree `l`, i.e. `(-1)^l`.
    pub fn of_degree(l: u32) -> Self {
        if l % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    /// The parity letter used in irreps text.
    pub fn letter(self) -> char {
        match self {
            Parity::Even => 'e',
            Parity::Odd => 'o',
        }
    }
}

impl Mul for Parity {
    type Output = Parity;

    fn mul(self, rhs: Parity) -> Parity {
        if self == rhs {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// An irreducible representation `(l, p)` of O(3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Irrep {
    l: u32,
    p: Parity,
}

impl Irrep {
    /// Create an irrep from its degree and parity.
    pub const fn new(l: u32, p: Parity) -> Self {
        Self { l, p }
    }

    /// The even scalar `0e`.
    pub const fn scalar() -> Self {
        Self::new(0, Parity::Even)
    }

    /// Degree `l`.
    pub fn l(&self) -> u32 {
        self.l
    }

    /// Parity `p`.
    pub fn p(&self) -> Parity {
        self.p
    }

    /// Dimension `2l + 1`.
    pub fn dim(&self) -> usize {
        2 * self.l as usize + 1
    }

    /// True for the even scalar `0e`.
    pub fn is_scalar(&self) -> bool {
        self.l == 0 && self.p == Parity::Even
    }

    /// Every irrep allowed in `self ⊗ other`, in increasing degree.
    pub fn product(self, other: Irrep) -> IrrepProduct {
        IrrepProduct {
            next: self.l.abs_diff(other.l),
            last: self.l + other.l,
            p: self.p * other.p,
        }
    }

    /// Whether `out` appears in `self ⊗ other` (degree triangle and parity).
    pub fn couples_to(self, other: Irrep, out: Irrep) -> bool {
        out.p == self.p * other.p && self.l.abs_diff(other.l) <= out.l && out.l <= self.l + other.l
    }

    /// All irreps up to degree `lmax`, in canonical order.
    pub fn iter_up_to(lmax: u32) -> impl Iterator<Item = Irrep> {
        (0..=lmax).flat_map(|l| {
            let natural = Parity::of_degree(l);
            let other = natural * Parity::Odd;
            [Irrep::new(l, natural), Irrep::new(l, other)]
        })
    }

    fn sort_key(&self) -> (u32, bool) {
        (self.l, self.p != Parity::of_degree(self.l))
    }
}

impl Ord for Irrep {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Irrep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Mul for Irrep {
    type Output = IrrepProduct;

    fn mul(self, rhs: Irrep) -> IrrepProduct {
        self.product(rhs)
    }
}

impl fmt::Display for Irrep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.l, self.p.letter())
    }
}

impl FromStr for Irrep {
    type Err = IrrepsParseError;

    /// Parse `"<l><p>"` with `p` one of `e`, `o`, or `y` (`y` = `(-1)^l`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let invalid = || IrrepsParseError::InvalidIrrep(token.to_string());

        let split = token.char_indices().last().map_or(0, |(i, _)| i);
        let (degree, letter) = token.split_at(split);
        if degree.is_empty() || !degree.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let l: u32 = degree.parse().map_err(|_| invalid())?;
        let p = match letter {
            "e" => Parity::Even,
            "o" => Parity::Odd,
            "y" => Parity::of_degree(l),
            _ => return Err(invalid()),
        };
        Ok(Irrep::new(l, p))
    }
}

impl From<Irrep> for String {
    fn from(ir: Irrep) -> String {
        ir.to_string()
    }
}

impl TryFrom<String> for Irrep {
    type Error = IrrepsParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Iterator over the irreps in a product `ir1 ⊗ ir2`.
#[derive(Debug, Clone)]
pub struct IrrepProduct {
    next: u32,
    last: u32,
    p: Parity,
}

impl Iterator for IrrepProduct {
    type Item = Irrep;

    fn next(&mut self) -> Option<Irrep> {
        if self.next > self.last {
            return None;
        }
        let ir = Irrep::new(self.next, self.p);
        self.next += 1;
        Some(ir)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.last + 1).saturating_sub(self.next) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for IrrepProduct {}
