#![deny(missing_docs)]

//! # o3tp-tensor — Equivariant Tensor Products
//!
//! The instruction-driven engine and the layers built on it. Depends on
//! `o3tp-core` for irreps and errors and on `o3tp-cg` for coupling tensors.
//!
//! ## Pipeline
//!
//! 1. **Instructions** ([`InstructionSpec`]) name an input block of each
//!    operand, an output block and a [`ConnectionMode`]. Construction
//!    validates them against the layouts and the selection rule.
//!
//! 2. **Normalization** turns the [`TensorProductConfig`] knobs into one
//!    path weight and one weight init std per instruction, so unit-variance
//!    inputs and weights give unit-variance outputs.
//!
//! 3. **Evaluation** ([`FunctionalTensorProduct::left_right`]) contracts the
//!    inputs either path by path or through a fused sparse table. Both
//!    strategies agree to floating-point precision.
//!
//! ## Layers
//!
//! - Builders: [`fully_connected`], [`full_tensor_product`],
//!   [`elementwise_tensor_product`], [`tensor_square`].
//! - [`FunctionalLinear`]: the equivariant linear map.
//! - [`ScalarActivation`] and [`Gate`]: pointwise nonlinearities that keep
//!   equivariance.
//!
//! Engines are immutable once built and can be shared across threads.

pub mod activation;
pub mod builders;
pub mod config;
mod fused;
pub mod gate;
pub mod instruction;
pub mod linear;
mod normalization;
pub mod tensor_product;

pub use activation::{Activation, ScalarActivation};
pub use builders::{elementwise_tensor_product, full_tensor_product, fully_connected, tensor_square};
pub use config::TensorProductConfig;
pub use gate::Gate;
pub use instruction::{ConnectionMode, Instruction, InstructionSpec};
pub use linear::FunctionalLinear;
pub use tensor_product::{Evaluation, FunctionalTensorProduct, Weights};
