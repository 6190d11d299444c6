use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::checkpoint;

const FOLD_PLACEHOLDER: &str = "{fold}";

/// Upper bound on data loader threads.
const MAX_WORKERS: usize = 8;

/// Everything one fold needs, fixed before the fold starts.
#[derive(Debug, Clone)]
pub struct FoldConfig {
    /// 1-based fold index.
    pub fold: usize,
    pub num_classes: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub weights: Option<PathBuf>,
    pub freeze_layers: bool,
    pub device: String,
    pub patience: u64,
    pub min_delta: f64,
    pub verbose: bool,
    pub img_size: usize,
    pub drop_rate: f32,
    pub seed: u64,
    pub workers: usize,
    pub train_dir: PathBuf,
    pub val_dir: PathBuf,
    pub log_dir: PathBuf,
    pub checkpoint_path: PathBuf,
}

impl FoldConfig {
    pub fn new(args: &Args, fold: usize) -> Self {
        let data_root = PathBuf::from(args.data_path.replace(FOLD_PLACEHOLDER, &fold.to_string()));

        let weights = if args.weights.is_empty() {
            None
        } else {
            Some(PathBuf::from(&args.weights))
        };

        Self {
            fold,
            num_classes: args.num_classes,
            epochs: args.epochs,
            batch_size: args.batch_size,
            learning_rate: args.lr,
            weight_decay: args.weight_decay,
            weights,
            freeze_layers: args.freeze_layers,
            device: args.device.clone(),
            patience: args.patience,
            min_delta: args.min_delta,
            verbose: !args.quiet,
            img_size: args.img_size,
            drop_rate: args.drop_rate,
            seed: args.seed,
            workers: num_workers(args.batch_size),
            train_dir: data_root.join("train"),
            val_dir: data_root.join("val"),
            log_dir: Path::new(&args.log_dir)
                .join(format!("{}zhe", fold))
                .join(&args.desc),
            checkpoint_path: checkpoint::path(Path::new(&args.checkpoint_dir), &args.desc, fold),
        }
    }

    /// Learning rate schedule length. Longer than the epoch budget so the
    /// rate never reaches zero.
    pub fn schedule_length(&self) -> usize {
        self.epochs + 10
    }
}

/// Loader threads for a batch size: one per core, no more than the batch
/// and never more than [`MAX_WORKERS`], but at least one.
pub fn num_workers(batch_size: usize) -> usize {
    let per_batch = if batch_size > 1 { batch_size } else { 0 };
    num_cpus::get().min(per_batch).min(MAX_WORKERS).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_resolve_fold_paths() {
        let args = Args::parse_from(["train"]);
        let config = FoldConfig::new(&args, 3);

        assert_eq!(config.fold, 3);
        assert_eq!(config.num_classes, 8);
        assert_eq!(config.epochs, 140);
        assert_eq!(config.batch_size, 32);
        assert!((config.learning_rate - 0.00008).abs() < 1e-12);
        assert_eq!(config.patience, 15);
        assert_eq!(config.device, "cuda:1");
        assert!(config.weights.is_none());
        assert!(!config.freeze_layers);
        assert!(config.verbose);
        assert_eq!(config.train_dir, PathBuf::from("data/fold3/train"));
        assert_eq!(config.val_dir, PathBuf::from("data/fold3/val"));
        assert_eq!(config.log_dir, PathBuf::from("logs/modelCompare/3zhe/RESwin"));
        assert_eq!(
            config.checkpoint_path,
            PathBuf::from("weights/RESwin_fold3_best.safetensors")
        );
        assert_eq!(config.schedule_length(), 150);
    }

    #[test]
    fn test_each_fold_gets_its_own_config() {
        let args = Args::parse_from([
            "train",
            "--data-path",
            "/datasets/kfold/{fold}/images",
            "--weights",
            "swin_tiny.safetensors",
            "--freeze-layers",
            "--num_classes",
            "4",
            "--desc",
            "baseline",
        ]);

        let first = FoldConfig::new(&args, 1);
        let second = FoldConfig::new(&args, 2);

        assert_eq!(first.train_dir, PathBuf::from("/datasets/kfold/1/images/train"));
        assert_eq!(second.val_dir, PathBuf::from("/datasets/kfold/2/images/val"));
        assert_eq!(first.weights, Some(PathBuf::from("swin_tiny.safetensors")));
        assert!(first.freeze_layers);
        assert_eq!(second.num_classes, 4);
        assert_ne!(first.checkpoint_path, second.checkpoint_path);
        assert_ne!(first.log_dir, second.log_dir);
    }

    #[test]
    fn test_num_workers_bounds() {
        assert_eq!(num_workers(1), 1);
        assert_eq!(num_workers(0), 1);
        assert!(num_workers(32) <= MAX_WORKERS);
        assert!(num_workers(2) <= 2);
    }
}
