//! Element variants for neural-field architectures.
//!
//! Every element implements the [`nfield_core::element::Element`] contract;
//! this crate only contributes the per-variant parameters and per-step math.

pub mod field;
pub mod history;
pub mod kernel;
pub mod math;
pub mod noise;
pub mod stimulus;
pub mod transform;
