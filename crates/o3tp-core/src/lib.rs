#![deny(missing_docs)]

//! # o3tp-core — Foundational Types for Equivariant Tensor Products
//!
//! This crate defines the representation-algebra data model that every other
//! crate in the workspace builds on. It has no internal crate dependencies,
//! only `serde`, `thiserror`, `ndarray`, `rand`, and `rand_distr` from the
//! external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **One parse entry point.** Irreps text goes through
//!    [`Irreps::from_str`](std::str::FromStr); everything downstream works on
//!    the canonical [`Irreps`] value.
//!
//! 2. **Layouts are load-bearing.** The order of [`Irreps`] blocks defines
//!    where each irrep copy lives in a flat vector. [`Irreps::as_list`] and
//!    [`Irreps::from_list`] are exact inverses.
//!
//! 3. **One variance contract.** [`IrrepNormalization`] is shared by random
//!    sampling ([`Irreps::randn`]) and by tensor-product normalization, so a
//!    sampled input always matches what the engine assumes.
//!
//! 4. **[`O3Error`] hierarchy.** Structured errors with `thiserror`. No
//!    `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod array;
pub mod error;
pub mod irrep;
pub mod irreps;
pub mod normalization;
pub mod random;

// Re-export primary types at crate root for ergonomic imports.
pub use array::IrrepsArray;
pub use error::{ConfigError, InstructionError, IrrepsParseError, O3Error, ShapeError};
pub use irrep::{Irrep, IrrepProduct, Parity};
pub use irreps::{Irreps, MulIrrep, SortedIrreps};
pub use normalization::{IrrepNormalization, NormalizationBlend};
