pub mod error;
pub mod network;
pub mod training;
pub mod weights;

pub use error::{Error, Result};
pub use network::{SwinConfig, SwinTransformer};
