use candle_core::{Device, Tensor};
use candle_nn::ModuleT;
use swin::training::EpochStats;
use swin::SwinTransformer;

use super::progress::TrainingProgressBar;
use crate::dataset::{Batch, DataLoader};
use crate::utils::loss::{correct_predictions, cross_entropy};

/// Running loss and accuracy over the batches of one pass.
///
/// The loss is the mean of the per-batch losses, the accuracy is counted
/// per sample.
#[derive(Debug, Default)]
pub struct EpochAccumulator {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    samples: usize,
}

impl EpochAccumulator {
    pub fn add(&mut self, loss: f32, correct: usize, samples: usize) {
        self.loss_sum += loss as f64;
        self.batches += 1;
        self.correct += correct;
        self.samples += samples;
    }

    pub fn stats(&self) -> EpochStats {
        EpochStats {
            loss: (self.loss_sum / self.batches.max(1) as f64) as f32,
            accuracy: self.correct as f32 / self.samples.max(1) as f32,
        }
    }
}

/// Images as `(batch, 3, size, size)` and labels as `(batch,)`.
pub fn batch_tensors(
    batch: Batch,
    img_size: usize,
    device: &Device,
) -> candle_core::Result<(Tensor, Tensor)> {
    let len = batch.len();
    let images = Tensor::from_vec(batch.images, (len, 3, img_size, img_size), device)?;
    let labels = Tensor::from_vec(batch.labels, len, device)?;
    Ok((images, labels))
}

/// Loss and accuracy over a held-out split, without updating the model.
pub fn evaluate(
    model: &SwinTransformer,
    loader: DataLoader,
    img_size: usize,
    device: &Device,
    progress: &TrainingProgressBar,
) -> swin::Result<EpochStats> {
    let mut accumulator = EpochAccumulator::default();

    for batch in loader {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }

        let samples = batch.len();
        let (images, labels) = batch_tensors(batch, img_size, device)?;

        let logits = model.forward_t(&images, false)?.detach();
        let loss = cross_entropy(&logits, &labels)?.to_scalar::<f32>()?;

        accumulator.add(loss, correct_predictions(&logits, &labels)?, samples);
        progress.update(accumulator.stats());
    }

    let stats = accumulator.stats();
    progress.finish(stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator_is_zero() {
        assert_eq!(EpochAccumulator::default().stats(), EpochStats::default());
    }

    #[test]
    fn test_loss_averages_batches_accuracy_counts_samples() {
        let mut accumulator = EpochAccumulator::default();
        accumulator.add(1.0, 4, 4);
        accumulator.add(2.0, 0, 2);

        let stats = accumulator.stats();
        assert!((stats.loss - 1.5).abs() < 1e-6);
        assert!((stats.accuracy - 4.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_tensors_shapes() -> candle_core::Result<()> {
        let batch = Batch {
            images: vec![0.0; 2 * 3 * 4 * 4],
            labels: vec![1, 0],
        };

        let (images, labels) = batch_tensors(batch, 4, &Device::Cpu)?;

        assert_eq!(images.dims(), &[2, 3, 4, 4]);
        assert_eq!(labels.to_vec1::<u32>()?, vec![1, 0]);
        Ok(())
    }
}
