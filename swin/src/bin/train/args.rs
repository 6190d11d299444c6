use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "Swin Trainer")]
#[command(author = "Jørgen Hanssen <jorgen@hanssen.io>")]
#[command(version = "0.1.0")]
pub struct Args {
    /// Number of output classes.
    #[arg(long = "num_classes", default_value_t = 8)]
    pub num_classes: usize,

    /// Maximum number of training epochs per fold.
    #[arg(long, default_value_t = 140)]
    pub epochs: usize,

    /// Number of images per training batch.
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Initial learning rate for optimizer.
    #[arg(long, default_value_t = 0.00008)]
    pub lr: f64,

    /// Dataset root of a fold. `{fold}` is replaced by the 1-based fold index.
    /// Must contain `train/` and `val/` class-per-directory image folders.
    #[arg(long, default_value = "data/fold{fold}")]
    pub data_path: String,

    /// Initial weights path (safetensors). Empty for random initialisation.
    #[arg(long, default_value = "")]
    pub weights: String,

    /// Only train the classification head.
    #[arg(long)]
    pub freeze_layers: bool,

    /// Device id (i.e. 0 or 0,1 or cpu, cuda:1, metal).
    #[arg(long, default_value = "cuda:1")]
    pub device: String,

    /// Number of cross-validation folds.
    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    /// Epochs without validation improvement before early stopping.
    #[arg(long, default_value_t = 15)]
    pub patience: u64,

    /// Minimum validation accuracy gain that counts as an improvement.
    #[arg(long, default_value_t = 0.0)]
    pub min_delta: f64,

    /// Run descriptor used in log directories and checkpoint names.
    #[arg(long, default_value = "RESwin")]
    pub desc: String,

    /// Root directory of the per-fold scalar logs.
    #[arg(long, default_value = "logs/modelCompare")]
    pub log_dir: String,

    /// Directory best checkpoints are written to.
    #[arg(long, default_value = "weights")]
    pub checkpoint_dir: String,

    /// Side length of the square network input.
    #[arg(long, default_value_t = 224)]
    pub img_size: usize,

    /// Dropout before the classification head.
    #[arg(long, default_value_t = 0.15)]
    pub drop_rate: f32,

    /// AdamW weight decay.
    #[arg(long, default_value_t = 0.05)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Do not log early stopping progress.
    #[arg(long)]
    pub quiet: bool,

    /// Log at debug level.
    #[arg(long)]
    pub verbose_log: bool,
}
