//! Backend implementations for different inference engines
//!
//! This module provides the saliency backends:
//! - Tract backend (pure Rust, no external dependencies)
//! - ONNX Runtime backend (native runtime, GPU acceleration)
//! - Mock backend (synthetic saliency for tests and dry runs)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::{MockBackend, MockSessionLoader};

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxBackend, OnnxSessionLoader};

#[cfg(feature = "tract")]
pub use self::tract::{TractBackend, TractSessionLoader};
