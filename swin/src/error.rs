use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A `--weights` path was given but nothing exists there.
    #[error("weights file '{}' does not exist", .0.display())]
    WeightsNotFound(PathBuf),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A thread panicked while holding the model's variable map.
    #[error("variable map lock poisoned")]
    LockPoisoned,

    /// Training diverged.
    #[error("non-finite training loss in epoch {0}")]
    NonFiniteLoss(usize),

    #[error("failed to load image '{}'", .0.display())]
    Image(PathBuf, #[source] image::ImageError),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
