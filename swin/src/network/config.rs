use crate::{Error, Result};

use super::{DEPTHS, EMBED_DIM, NUM_HEADS, PATCH_SIZE, WINDOW_SIZE};

#[derive(Debug, Clone, PartialEq)]
pub struct SwinConfig {
    pub img_size: usize,
    pub embed_dim: usize,
    pub depths: Vec<usize>,
    pub num_heads: Vec<usize>,
    pub window_size: usize,
    pub num_classes: usize,
    /// Dropout applied to the pooled features right before the head.
    pub drop_rate: f32,
}

impl SwinConfig {
    /// Swin-T layout.
    pub fn tiny(num_classes: usize, img_size: usize, drop_rate: f32) -> Self {
        Self {
            img_size,
            embed_dim: EMBED_DIM,
            depths: DEPTHS.to_vec(),
            num_heads: NUM_HEADS.to_vec(),
            window_size: WINDOW_SIZE,
            num_classes,
            drop_rate,
        }
    }

    pub fn num_stages(&self) -> usize {
        self.depths.len()
    }

    /// Token grid side length entering the given stage.
    pub fn resolution(&self, stage: usize) -> usize {
        self.img_size / PATCH_SIZE / (1 << stage)
    }

    /// Channel width of the given stage.
    pub fn stage_dim(&self, stage: usize) -> usize {
        self.embed_dim * (1 << stage)
    }

    /// Width of the pooled features fed to the head.
    pub fn num_features(&self) -> usize {
        self.stage_dim(self.num_stages() - 1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.depths.is_empty() || self.depths.len() != self.num_heads.len() {
            return Err(Error::Config(format!(
                "depths ({}) and num_heads ({}) must be non-empty and of equal length",
                self.depths.len(),
                self.num_heads.len()
            )));
        }
        if self.num_classes == 0 {
            return Err(Error::Config("num_classes must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.drop_rate) {
            return Err(Error::Config(format!(
                "drop rate {} is outside [0, 1)",
                self.drop_rate
            )));
        }

        let stride = PATCH_SIZE * (1 << (self.num_stages() - 1));
        if self.img_size == 0 || self.img_size % stride != 0 {
            return Err(Error::Config(format!(
                "image size {} must be a positive multiple of {}",
                self.img_size, stride
            )));
        }

        for stage in 0..self.num_stages() {
            let dim = self.stage_dim(stage);
            let heads = self.num_heads[stage];
            if heads == 0 || dim % heads != 0 {
                return Err(Error::Config(format!(
                    "stage {} width {} is not divisible by {} heads",
                    stage, dim, heads
                )));
            }

            let resolution = self.resolution(stage);
            if resolution > self.window_size && resolution % self.window_size != 0 {
                return Err(Error::Config(format!(
                    "stage {} resolution {} is not divisible by window size {}",
                    stage, resolution, self.window_size
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiny_layout_is_valid_at_224() {
        let config = SwinConfig::tiny(8, 224, 0.15);
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution(0), 56);
        assert_eq!(config.resolution(3), 7);
        assert_eq!(config.num_features(), 768);
    }

    #[test]
    fn test_rejects_image_size_not_divisible_by_stride() {
        let config = SwinConfig::tiny(8, 200, 0.15);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_resolution_not_divisible_by_window() {
        // 256 / 4 = 64 tokens per side, which 7x7 windows cannot tile
        let config = SwinConfig::tiny(8, 256, 0.15);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_classes() {
        let config = SwinConfig::tiny(0, 224, 0.15);
        assert!(config.validate().is_err());
    }
}
