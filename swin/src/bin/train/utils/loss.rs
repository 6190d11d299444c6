use candle_core::{DType, Result, Tensor, D};

/// Mean cross-entropy of `(batch, classes)` logits against `u32` labels.
pub fn cross_entropy(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    candle_nn::loss::cross_entropy(logits, labels)
}

/// Rows whose highest logit is at the label index.
pub fn correct_predictions(logits: &Tensor, labels: &Tensor) -> Result<usize> {
    let predicted = logits.argmax(D::Minus1)?;
    let correct = predicted
        .eq(labels)?
        .to_dtype(DType::U32)?
        .sum_all()?
        .to_scalar::<u32>()?;
    Ok(correct as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_uniform_logits_loss_is_log_classes() -> Result<()> {
        let logits = Tensor::zeros((4, 3), DType::F32, &Device::Cpu)?;
        let labels = Tensor::new(&[0u32, 1, 2, 1], &Device::Cpu)?;

        let loss = cross_entropy(&logits, &labels)?.to_scalar::<f32>()?;
        assert!((loss - 3f32.ln()).abs() < 1e-5);

        Ok(())
    }

    #[test]
    fn test_confident_correct_logits_have_low_loss() -> Result<()> {
        let logits = Tensor::new(&[[10f32, 0.0], [0.0, 10.0]], &Device::Cpu)?;
        let labels = Tensor::new(&[0u32, 1], &Device::Cpu)?;

        let loss = cross_entropy(&logits, &labels)?.to_scalar::<f32>()?;
        assert!(loss < 1e-3);

        Ok(())
    }

    #[test]
    fn test_correct_predictions_counts_argmax_hits() -> Result<()> {
        let logits = Tensor::new(
            &[[2f32, 1.0, 0.0], [0.0, 3.0, 1.0], [0.5, 0.1, 4.0]],
            &Device::Cpu,
        )?;
        let labels = Tensor::new(&[0u32, 2, 2], &Device::Cpu)?;

        assert_eq!(correct_predictions(&logits, &labels)?, 2);

        Ok(())
    }
}
