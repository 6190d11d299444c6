//! Per-fold training control flow.
//!
//! The model, data and optimizer live behind [`Learner`]; this module only
//! decides when to checkpoint, when to stop and what gets logged.

pub mod driver;
pub mod early_stopping;
pub mod scheduler;

pub use driver::{FoldOutcome, LoopState, Termination, TrainingLoop, SCALAR_TAGS};
pub use early_stopping::{EarlyStopping, MetricHistory, StopDecision};
pub use scheduler::{CosineAnnealing, LrSchedule};

use crate::Result;

/// Mean loss and accuracy of one pass over a data split.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochStats {
    pub loss: f32,
    pub accuracy: f32,
}

pub trait Learner {
    /// One pass over the training split, updating the parameters.
    fn train_epoch(&mut self, epoch: usize) -> Result<EpochStats>;

    /// One pass over the held-out split. Must not update the parameters.
    fn evaluate(&mut self, epoch: usize) -> Result<EpochStats>;

    /// Persists the current parameters as the best model so far.
    fn save_checkpoint(&mut self, epoch: usize) -> Result<()>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

/// Destination of the per-epoch scalar time series.
pub trait MetricSink {
    fn record(&mut self, tag: &str, value: f64, epoch: usize) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}
