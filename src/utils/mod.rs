//! Shared utilities for preprocessing and validation

pub mod preprocessing;
pub mod validation;

pub use preprocessing::{working_dimensions, SaliencyPreprocessor};
pub use validation::TensorValidator;
