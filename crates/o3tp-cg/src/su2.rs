//! # SU(2) Clebsch–Gordan Coefficients
//!
//! Coefficients `<j1 m1; j2 m2 | j3 m3>` in the complex (standard Condon–
//! Shortley) basis, for integer angular momenta, from the Racah formula:
//!
//! ```text
//! C = δ(m3, m1 + m2) · sqrt(P) · S
//!
//! P = (2 j3 + 1) (j3 + j1 - j2)! (j3 - j1 + j2)! (j1 + j2 - j3)! (j3 + m3)! (j3 - m3)!
//!     ─────────────────────────────────────────────────────────────────────────────
//!       (j1 + j2 + j3 + 1)! (j1 - m1)! (j1 + m1)! (j2 - m2)! (j2 + m2)!
//!
//! S = Σ_v (-1)^(v + j2 + m2) (j2 + j3 + m1 - v)! (j1 - m1 + v)!
//!         ──────────────────────────────────────────────────────────
//!         v! (j3 - j1 + j2 - v)! (j3 + m3 - v)! (v + j1 - j2 - m3)!
//! ```
//!
//! Two implementations are provided. [`su2_clebsch_gordan_exact`] keeps `P`
//! and `S` as big rationals and returns the coefficient as
//! `sign · sqrt(rational)`. [`su2_clebsch_gordan`] evaluates the same formula
//! in `f64`. They are independent code paths and are cross-checked in tests.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// An exact real number of the form `sign · sqrt(square)` with rational `square >= 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqrtRational {
    negative: bool,
    square: BigRational,
}

impl SqrtRational {
    /// Exact zero.
    pub fn zero() -> Self {
        Self {
            negative: false,
            square: BigRational::zero(),
        }
    }

    /// Whether the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.square.is_zero()
    }

    /// Whether the value is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    /// The exact square of the value.
    pub fn square(&self) -> &BigRational {
        &self.square
    }

    /// Nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        let magnitude = self.square.to_f64().unwrap_or(f64::NAN).sqrt();
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

fn triangle(j1: u32, j2: u32, j3: u32) -> bool {
    j1.abs_diff(j2) <= j3 && j3 <= j1 + j2
}

fn selects(j1: u32, m1: i32, j2: u32, m2: i32, j3: u32, m3: i32) -> bool {
    m3 == m1 + m2
        && m1.unsigned_abs() <= j1
        && m2.unsigned_abs() <= j2
        && m3.unsigned_abs() <= j3
        && triangle(j1, j2, j3)
}

/// Summation bounds of the Racah series, all as signed integers.
struct RacahTerms {
    j1: i64,
    j2: i64,
    j3: i64,
    m1: i64,
    m2: i64,
    m3: i64,
}

impl RacahTerms {
    fn new(j1: u32, m1: i32, j2: u32, m2: i32, j3: u32, m3: i32) -> Self {
        Self {
            j1: i64::from(j1),
            j2: i64::from(j2),
            j3: i64::from(j3),
            m1: i64::from(m1),
            m2: i64::from(m2),
            m3: i64::from(m3),
        }
    }

    fn range(&self) -> std::ops::RangeInclusive<i64> {
        let vmin = (-self.j1 + self.j2 + self.m3).max(-self.j1 + self.m1).max(0);
        let vmax = (self.j2 + self.j3 + self.m1)
            .min(self.j3 - self.j1 + self.j2)
            .min(self.j3 + self.m3);
        vmin..=vmax
    }

    /// Factorial arguments of the prefactor: (numerator, denominator).
    fn prefactor(&self) -> ([i64; 5], [i64; 5]) {
        let (j1, j2, j3, m1, m2, m3) = (self.j1, self.j2, self.j3, self.m1, self.m2, self.m3);
        (
            [j3 + j1 - j2, j3 - j1 + j2, j1 + j2 - j3, j3 + m3, j3 - m3],
            [j1 + j2 + j3 + 1, j1 - m1, j1 + m1, j2 - m2, j2 + m2],
        )
    }

    /// Factorial arguments of term `v`: (numerator, denominator, negative).
    fn term(&self, v: i64) -> ([i64; 2], [i64; 4], bool) {
        let (j1, j2, j3, m1, m2, m3) = (self.j1, self.j2, self.j3, self.m1, self.m2, self.m3);
        (
            [j2 + j3 + m1 - v, j1 - m1 + v],
            [v, j3 - j1 + j2 - v, j3 + m3 - v, v + j1 - j2 - m3],
            (v + j2 + m2).rem_euclid(2) == 1,
        )
    }
}

fn big_factorial(n: i64) -> BigInt {
    (2..=n).fold(BigInt::one(), |acc, k| acc * BigInt::from(k))
}

fn float_factorial(n: i64) -> f64 {
    (2..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Exact `<j1 m1; j2 m2 | j3 m3>` as `sign · sqrt(rational)`.
pub fn su2_clebsch_gordan_exact(j1: u32, m1: i32, j2: u32, m2: i32, j3: u32, m3: i32) -> SqrtRational {
    if !selects(j1, m1, j2, m2, j3, m3) {
        return SqrtRational::zero();
    }
    let terms = RacahTerms::new(j1, m1, j2, m2, j3, m3);

    let (num, den) = terms.prefactor();
    let num = num
        .iter()
        .fold(BigInt::from(2 * i64::from(j3) + 1), |acc, &n| acc * big_factorial(n));
    let den = den.iter().fold(BigInt::one(), |acc, &n| acc * big_factorial(n));
    let prefactor = BigRational::new(num, den);

    let mut sum = BigRational::zero();
    for v in terms.range() {
        let (num, den, negative) = terms.term(v);
        let num = num.iter().fold(BigInt::one(), |acc, &n| acc * big_factorial(n));
        let den = den.iter().fold(BigInt::one(), |acc, &n| acc * big_factorial(n));
        let term = BigRational::new(num, den);
        if negative {
            sum -= term;
        } else {
            sum += term;
        }
    }

    SqrtRational {
        negative: sum.is_negative(),
        square: &sum * &sum * prefactor,
    }
}

/// `<j1 m1; j2 m2 | j3 m3>` evaluated in `f64`.
pub fn su2_clebsch_gordan(j1: u32, m1: i32, j2: u32, m2: i32, j3: u32, m3: i32) -> f64 {
    if !selects(j1, m1, j2, m2, j3, m3) {
        return 0.0;
    }
    let terms = RacahTerms::new(j1, m1, j2, m2, j3, m3);

    let (num, den) = terms.prefactor();
    let prefactor = (2 * j3 + 1) as f64
        * num.iter().map(|&n| float_factorial(n)).product::<f64>()
        / den.iter().map(|&n| float_factorial(n)).product::<f64>();

    let sum: f64 = terms
        .range()
        .map(|v| {
            let (num, den, negative) = terms.term(v);
            let magnitude = num.iter().map(|&n| float_factorial(n)).product::<f64>()
                / den.iter().map(|&n| float_factorial(n)).product::<f64>();
            if negative {
                -magnitude
            } else {
                magnitude
            }
        })
        .sum();

    prefactor.sqrt() * sum
}
