pub mod attention;
pub mod block;
pub mod config;
pub mod model;
pub mod window;

pub use config::SwinConfig;
pub use model::SwinTransformer;

/// Side length of the square patches the input image is cut into.
pub const PATCH_SIZE: usize = 4;

/// Channel width after patch embedding. Doubles at every patch merging step.
pub const EMBED_DIM: usize = 96;

/// Number of Swin blocks per stage.
pub const DEPTHS: [usize; 4] = [2, 2, 6, 2];

/// Attention heads per stage.
pub const NUM_HEADS: [usize; 4] = [3, 6, 12, 24];

/// Side length of the local attention windows (in patches).
pub const WINDOW_SIZE: usize = 7;

/// Hidden width of the block MLPs relative to the block width.
pub const MLP_RATIO: usize = 4;

pub const LAYER_NORM_EPS: f64 = 1e-5;

/// Name fragment shared by every parameter of the classification head.
/// Pretrained weights matching it are discarded, and with frozen layers
/// they are the only trainable parameters.
pub const HEAD: &str = "head";

/// Added to attention logits between tokens that must not attend to each
/// other inside a shifted window.
pub const MASK_VALUE: f32 = -100.0;
