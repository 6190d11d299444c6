use candle_core::{Result as CandleResult, Tensor};
use candle_nn::{
    conv2d, layer_norm, linear, Conv2d, Conv2dConfig, Dropout, LayerNorm, Linear, Module, ModuleT,
    VarBuilder,
};

use crate::Result;

use super::block::Stage;
use super::{SwinConfig, HEAD, LAYER_NORM_EPS, PATCH_SIZE};

// Candle network definition, parameter names follow the reference Swin layout
pub struct SwinTransformer {
    patch_embed: Conv2d,
    patch_norm: LayerNorm,
    stages: Vec<Stage>,
    norm: LayerNorm,
    head_dropout: Dropout,
    head: Linear,
}

impl SwinTransformer {
    pub fn new(config: &SwinConfig, vs: &VarBuilder) -> Result<Self> {
        config.validate()?;

        let embed_config = Conv2dConfig {
            stride: PATCH_SIZE,
            ..Default::default()
        };
        let patch_embed = conv2d(
            3,
            config.embed_dim,
            PATCH_SIZE,
            embed_config,
            vs.pp("patch_embed").pp("proj"),
        )?;
        let patch_norm = layer_norm(
            config.embed_dim,
            LAYER_NORM_EPS,
            vs.pp("patch_embed").pp("norm"),
        )?;

        let last = config.num_stages() - 1;
        let stages = (0..config.num_stages())
            .map(|i| {
                Stage::new(
                    config.stage_dim(i),
                    config.resolution(i),
                    config.depths[i],
                    config.num_heads[i],
                    config.window_size,
                    i < last,
                    vs.pp(format!("layers.{}", i)),
                )
            })
            .collect::<CandleResult<Vec<_>>>()?;

        let num_features = config.num_features();

        Ok(Self {
            patch_embed,
            patch_norm,
            stages,
            norm: layer_norm(num_features, LAYER_NORM_EPS, vs.pp("norm"))?,
            head_dropout: Dropout::new(config.drop_rate),
            head: linear(num_features, config.num_classes, vs.pp(HEAD))?,
        })
    }
}

impl ModuleT for SwinTransformer {
    /// `x` is `(B, 3, H, W)`, returns logits `(B, num_classes)`.
    fn forward_t(&self, x: &Tensor, train: bool) -> CandleResult<Tensor> {
        let x = self.patch_embed.forward(x)?.flatten_from(2)?.transpose(1, 2)?;
        let mut x = self.patch_norm.forward(&x)?;

        for stage in &self.stages {
            x = stage.forward(&x)?;
        }

        let pooled = self.norm.forward(&x)?.mean(1)?;
        let pooled = self.head_dropout.forward(&pooled, train)?;
        self.head.forward(&pooled)
    }
}
