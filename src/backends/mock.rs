//! Mock saliency backend for testing and dry runs
//!
//! Produces a deterministic saliency map without a model file: either a soft
//! centered ellipse or a caller-supplied tensor.

use crate::error::{BgRemovalError, Result};
use crate::inference::{SaliencyBackend, SessionLoader};
use async_trait::async_trait;
use ndarray::Array4;
use std::sync::Arc;

/// Mock backend returning synthetic saliency
#[derive(Debug, Clone)]
pub struct MockBackend {
    input_size: u32,
    output: Option<Array4<f32>>,
}

impl MockBackend {
    /// Ellipse saliency at the model input resolution
    #[must_use]
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            output: None,
        }
    }

    /// Always return `output` regardless of input
    #[must_use]
    pub fn with_output(input_size: u32, output: Array4<f32>) -> Self {
        Self {
            input_size,
            output: Some(output),
        }
    }

    /// Saliency falls off from 1.0 at the center to 0.0 at the inscribed ellipse edge
    fn ellipse(size: usize) -> Array4<f32> {
        let center = (size as f32 - 1.0) / 2.0;
        let radius = (size as f32 / 2.0).max(1.0);
        Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
            let dx = (x as f32 - center) / radius;
            let dy = (y as f32 - center) / radius;
            (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0) * 2.0
        })
    }
}

#[async_trait]
impl SaliencyBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    async fn infer(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        let (_, channels, height, width) = input.dim();
        if channels != 3 || height != width {
            return Err(BgRemovalError::inference(format!(
                "mock backend expects [1, 3, S, S] input, got {:?}",
                input.shape()
            )));
        }
        Ok(self
            .output
            .clone()
            .unwrap_or_else(|| Self::ellipse(height)))
    }
}

/// Loader handing out a `MockBackend`, or failing with a fixed message
#[derive(Debug, Clone)]
pub struct MockSessionLoader {
    backend: MockBackend,
    failure: Option<String>,
}

impl MockSessionLoader {
    #[must_use]
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend,
            failure: None,
        }
    }

    /// Loader whose every load fails with `ModelLoad(message)`
    #[must_use]
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            backend: MockBackend::new(1),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl SessionLoader for MockSessionLoader {
    async fn load(&self) -> Result<Arc<dyn SaliencyBackend>> {
        if let Some(message) = &self.failure {
            return Err(BgRemovalError::model_load(message.clone()));
        }
        Ok(Arc::new(self.backend.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ellipse_is_salient_at_center_only() {
        let backend = MockBackend::new(32);
        let output = backend.infer(Array4::zeros((1, 3, 32, 32))).await.unwrap();

        assert_eq!(output.shape(), &[1, 1, 32, 32]);
        assert!(output[[0, 0, 16, 16]] >= 0.5);
        assert!(output[[0, 0, 0, 0]] < 0.5);
    }

    #[tokio::test]
    async fn test_fixed_output() {
        let fixed = Array4::from_elem((1, 1, 4, 6), 0.75);
        let backend = MockBackend::with_output(8, fixed.clone());
        let output = backend.infer(Array4::zeros((1, 3, 8, 8))).await.unwrap();
        assert_eq!(output, fixed);
    }

    #[tokio::test]
    async fn test_rejects_non_rgb_input() {
        let backend = MockBackend::new(8);
        assert!(backend.infer(Array4::zeros((1, 1, 8, 8))).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_loader() {
        let err = MockSessionLoader::failing("offline").load().await.err().unwrap();
        assert!(matches!(err, BgRemovalError::ModelLoad(_)));
    }
}
