//! Tensor validation utilities

use crate::error::{BgRemovalError, Result};
use ndarray::Array4;

/// Validator for model input and output tensors
pub struct TensorValidator;

impl TensorValidator {
    /// Validate the NCHW input tensor for a square model input
    ///
    /// # Errors
    /// - Shape differs from `[1, 3, size, size]`
    pub fn validate_input(tensor: &Array4<f32>, size: u32) -> Result<()> {
        let expected = [1, 3, size as usize, size as usize];
        if tensor.shape() != expected {
            return Err(BgRemovalError::invalid_input(format!(
                "input tensor shape mismatch: expected {expected:?}, got {:?}",
                tensor.shape()
            )));
        }
        Ok(())
    }

    /// Validate a saliency output tensor: batch 1, one channel, non-empty plane
    ///
    /// # Errors
    /// - Batch or channel count other than 1
    /// - Zero height or width
    pub fn validate_saliency_output(tensor: &Array4<f32>) -> Result<()> {
        let (batch, channels, height, width) = tensor.dim();
        if batch != 1 || channels != 1 {
            return Err(BgRemovalError::inference(format!(
                "saliency output must be [1, 1, H, W], got {:?}",
                tensor.shape()
            )));
        }
        if height == 0 || width == 0 {
            return Err(BgRemovalError::inference("saliency output plane is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_input() {
        let tensor = Array4::<f32>::zeros((1, 3, 320, 320));
        assert!(TensorValidator::validate_input(&tensor, 320).is_ok());
        assert!(TensorValidator::validate_input(&tensor, 256).is_err());
    }

    #[test]
    fn test_validate_saliency_output() {
        assert!(TensorValidator::validate_saliency_output(&Array4::zeros((1, 1, 320, 320))).is_ok());

        let err = TensorValidator::validate_saliency_output(&Array4::zeros((1, 3, 320, 320)))
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Inference(_)));

        assert!(TensorValidator::validate_saliency_output(&Array4::zeros((1, 1, 0, 320))).is_err());
    }
}
