use candle_core::{DType, Device};
use candle_nn::{AdamW, ModuleT, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use std::path::PathBuf;
use swin::training::{EpochStats, Learner};
use swin::weights::{load_pretrained, ParameterPartition};
use swin::{Error, SwinConfig, SwinTransformer};

use super::evaluation::{batch_tensors, evaluate, EpochAccumulator};
use super::progress::TrainingProgressBar;
use crate::checkpoint;
use crate::config::FoldConfig;
use crate::dataset::Dataset;
use crate::utils::device::get_device;
use crate::utils::loss::{correct_predictions, cross_entropy};

/// Model, optimizer and data of a single fold.
pub struct Trainer {
    model: SwinTransformer,
    optimizer: AdamW,
    varmap: VarMap,
    device: Device,
    dataset: Dataset,
    batch_size: usize,
    workers: usize,
    img_size: usize,
    checkpoint_path: PathBuf,
}

impl Trainer {
    pub fn new(config: &FoldConfig, dataset: Dataset) -> swin::Result<Self> {
        let device = get_device(&config.device)?;
        // The CPU backend has no seedable generator
        if !device.is_cpu() {
            device.set_seed(config.seed)?;
        }

        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model_config =
            SwinConfig::tiny(config.num_classes, config.img_size, config.drop_rate);
        let model = SwinTransformer::new(&model_config, &vs)?;

        if let Some(weights) = &config.weights {
            load_pretrained(&varmap, weights, &device)?;
        }

        let partition = ParameterPartition::new(&varmap, config.freeze_layers)?;
        if config.freeze_layers {
            for name in partition.trainable_names() {
                log::info!("training {}", name);
            }
            log::debug!("Frozen {} tensors", partition.frozen_names().len());
        }

        let optimizer = AdamW::new(
            partition.trainable_vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )?;

        let batch_size = config.batch_size.max(1);
        log::debug!(
            "{} train and {} val batches per epoch",
            dataset.num_train().div_ceil(batch_size),
            dataset.num_val().div_ceil(batch_size)
        );

        Ok(Self {
            model,
            optimizer,
            varmap,
            device,
            dataset,
            batch_size: config.batch_size,
            workers: config.workers,
            img_size: config.img_size,
            checkpoint_path: config.checkpoint_path.clone(),
        })
    }

    fn num_batches(&self, num_samples: usize) -> usize {
        num_samples.div_ceil(self.batch_size.max(1))
    }
}

impl Learner for Trainer {
    fn train_epoch(&mut self, epoch: usize) -> swin::Result<EpochStats> {
        let loader = self
            .dataset
            .train_loader(self.batch_size, self.workers, epoch);
        let progress = TrainingProgressBar::new(
            self.num_batches(loader.num_samples()),
            format!("[train epoch {}]", epoch),
        );

        let mut accumulator = EpochAccumulator::default();

        for batch in loader {
            let batch = batch?;
            if batch.is_empty() {
                continue;
            }

            let samples = batch.len();
            let (images, labels) = batch_tensors(batch, self.img_size, &self.device)?;

            let logits = self.model.forward_t(&images, true)?;
            let loss = cross_entropy(&logits, &labels)?;
            let loss_val = loss.to_scalar::<f32>()?;
            if !loss_val.is_finite() {
                log::warn!("non-finite loss, ending training: {}", loss_val);
                return Err(Error::NonFiniteLoss(epoch));
            }

            self.optimizer.backward_step(&loss)?;

            accumulator.add(loss_val, correct_predictions(&logits, &labels)?, samples);
            progress.update(accumulator.stats());
        }

        let stats = accumulator.stats();
        progress.finish(stats);
        Ok(stats)
    }

    fn evaluate(&mut self, epoch: usize) -> swin::Result<EpochStats> {
        let loader = self.dataset.val_loader(self.batch_size, self.workers);
        let progress = TrainingProgressBar::new(
            self.num_batches(loader.num_samples()),
            format!("[valid epoch {}]", epoch),
        );

        evaluate(&self.model, loader, self.img_size, &self.device, &progress)
    }

    fn save_checkpoint(&mut self, epoch: usize) -> swin::Result<()> {
        checkpoint::save(&self.varmap, &self.checkpoint_path)?;
        log::debug!(
            "Saved epoch {} weights to {}",
            epoch,
            self.checkpoint_path.display()
        );
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.optimizer.set_learning_rate(lr);
    }
}
